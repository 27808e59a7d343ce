//! Logging conventions for plotweave.
//!
//! All crates in the workspace log through [`tracing`] with a fixed set of
//! targets, so a subscriber can filter by subsystem:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("plotweave::filter=trace,plotweave::controller=debug")
//!     .init();
//! ```

/// Target names used with `tracing` macros.
pub mod targets {
    /// Signal emission.
    pub const SIGNAL: &str = "plotweave_core::signal";
    /// Event loop turns and task posting.
    pub const EVENT_LOOP: &str = "plotweave_core::event_loop";
    /// Debounced refresh scheduling.
    pub const REFRESH: &str = "plotweave_core::refresh";
    /// Attribute bindings and data configuration.
    pub const DATA: &str = "plotweave::data";
    /// Filtered case sets.
    pub const FILTER: &str = "plotweave::filter";
    /// Layout negotiation and scales.
    pub const LAYOUT: &str = "plotweave::layout";
    /// Axis models and nice bounds.
    pub const AXIS: &str = "plotweave::axis";
    /// Plot-type and axis lifecycle state machine.
    pub const CONTROLLER: &str = "plotweave::controller";
    /// Faceting and adornments.
    pub const FACET: &str = "plotweave::facet";
    /// Performance spans.
    pub const PERF: &str = "plotweave::perf";
}

/// Span names for long-running operations.
pub mod span_names {
    /// Full rebuild of a filtered case set.
    pub const REBUILD_CASES: &str = "rebuild_cases";
    /// Attribute assignment handled by the graph controller.
    pub const ATTRIBUTE_ASSIGNMENT: &str = "attribute_assignment";
    /// Adornment category update.
    pub const UPDATE_CATEGORIES: &str = "update_categories";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "plotweave::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
