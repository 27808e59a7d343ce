//! Error types for plotweave-core.

use std::fmt;

/// The main error type for plotweave-core operations.
#[derive(Debug)]
pub enum CoreError {
    /// Signal-related error.
    Signal(SignalError),
    /// Refresh scheduling error.
    Refresh(RefreshError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(err) => write!(f, "Signal error: {err}"),
            Self::Refresh(err) => write!(f, "Refresh error: {err}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Signal(err) => Some(err),
            Self::Refresh(err) => Some(err),
        }
    }
}

impl From<SignalError> for CoreError {
    fn from(err: SignalError) -> Self {
        Self::Signal(err)
    }
}

impl From<RefreshError> for CoreError {
    fn from(err: RefreshError) -> Self {
        Self::Refresh(err)
    }
}

/// Signal-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The connection ID is invalid or has already been disconnected.
    InvalidConnection,
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConnection => write!(f, "Invalid or disconnected connection ID"),
        }
    }
}

impl std::error::Error for SignalError {}

/// Errors reported by the event loop and debounced refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The event loop the refresh was scheduled on has been dropped.
    EventLoopDropped,
    /// No refresh is pending, so there is nothing to flush or cancel.
    NothingPending,
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventLoopDropped => write!(f, "The event loop has been dropped"),
            Self::NothingPending => write!(f, "No refresh is pending"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// A specialized Result type for plotweave-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
