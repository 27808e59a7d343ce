//! Error types for plotweave.
//!
//! Queries made while rendering never fail: a missing dataset, an unbound
//! role or a removed attribute degrade to empty results. Errors are reserved
//! for misuse of mutation APIs and for invalid configuration.

use plotweave_core::RefreshError;

/// Result type alias for plotweave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in plotweave.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A case id was not found in the dataset.
    #[error("Unknown case '{0}'")]
    UnknownCase(String),

    /// An attribute id was not found in the dataset.
    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// An attribute with this id already exists.
    #[error("Attribute '{0}' already exists")]
    DuplicateAttribute(String),

    /// A case with this id already exists.
    #[error("Case '{0}' already exists")]
    DuplicateCase(String),

    /// Configuration values are inconsistent.
    #[error("Invalid graph configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed.
    #[error("Failed to parse graph configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Scheduling a deferred refresh failed.
    #[error("Refresh error: {0}")]
    Refresh(#[from] RefreshError),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::UnknownCase("c9".into()).to_string(), "Unknown case 'c9'");
        assert_eq!(
            Error::invalid_config("min > max").to_string(),
            "Invalid graph configuration: min > max"
        );
        let refresh: Error = RefreshError::EventLoopDropped.into();
        assert!(refresh.to_string().contains("event loop"));
    }
}
