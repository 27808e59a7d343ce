//! Graph settings.
//!
//! Settings can be built in code with [`GraphConfigBuilder`] or read from
//! the graph section of an application settings document:
//!
//! ```
//! use plotweave::GraphConfig;
//!
//! let config = GraphConfig::from_json(&serde_json::json!({
//!     "emptyPlotIsNumeric": true,
//!     "defaultNumericBounds": [0.0, 100.0]
//! }))
//! .unwrap();
//! assert!(config.empty_plot_is_numeric);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use plotweave_core::EventLoop;

use crate::error::{Error, Result};
use crate::graph::{DEFAULT_NUMERIC_AXIS_BOUNDS, GraphPlace, LayoutConfig};

/// Default number of tasks run per event loop turn.
pub const DEFAULT_REFRESH_BATCH_SIZE: usize = 64;

/// Settings of one graph tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    /// Unbound left and bottom axes are numeric instead of empty.
    pub empty_plot_is_numeric: bool,
    /// Domain of a freshly created numeric axis.
    pub default_numeric_bounds: (f64, f64),
    /// Default extents and initial size.
    pub layout: LayoutConfig,
    /// Tasks run per event loop turn.
    pub refresh_batch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            empty_plot_is_numeric: false,
            default_numeric_bounds: DEFAULT_NUMERIC_AXIS_BOUNDS,
            layout: LayoutConfig::default(),
            refresh_batch_size: DEFAULT_REFRESH_BATCH_SIZE,
        }
    }
}

impl GraphConfig {
    /// Start building a configuration.
    pub fn builder() -> GraphConfigBuilder {
        GraphConfigBuilder::new()
    }

    /// Read and validate settings from JSON. Missing fields take defaults.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let config: GraphConfig = serde_json::from_value(value.clone())?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate settings from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: GraphConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<()> {
        let (min, max) = self.default_numeric_bounds;
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::invalid_config("default numeric bounds must be finite"));
        }
        if min > max {
            return Err(Error::invalid_config(format!(
                "default numeric bounds are reversed: {min} > {max}"
            )));
        }
        if self.refresh_batch_size == 0 {
            return Err(Error::invalid_config("refresh batch size must be at least 1"));
        }
        if !(self.layout.width >= 0.0 && self.layout.height >= 0.0) {
            return Err(Error::invalid_config("layout size must be non-negative"));
        }
        if let Some((place, extent)) = self.layout.extents.iter().find(|(_, e)| !(**e >= 0.0 && e.is_finite())) {
            return Err(Error::invalid_config(format!("extent of {place} is invalid: {extent}")));
        }
        Ok(())
    }

    /// An event loop sized for these settings.
    pub fn event_loop(&self) -> Arc<EventLoop> {
        Arc::new(EventLoop::with_batch_size(self.refresh_batch_size))
    }
}

/// Builder for [`GraphConfig`].
#[derive(Debug, Default)]
pub struct GraphConfigBuilder {
    config: GraphConfig,
}

impl GraphConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make unbound left and bottom axes numeric.
    pub fn empty_plot_is_numeric(mut self, numeric: bool) -> Self {
        self.config.empty_plot_is_numeric = numeric;
        self
    }

    /// Domain of a freshly created numeric axis.
    pub fn default_numeric_bounds(mut self, min: f64, max: f64) -> Self {
        self.config.default_numeric_bounds = (min, max);
        self
    }

    /// Replace the layout settings.
    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    /// Default extent of one place.
    pub fn extent(mut self, place: GraphPlace, extent: f64) -> Self {
        self.config.layout.extents.insert(place, extent);
        self
    }

    /// Initial tile size.
    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.config.layout.width = width;
        self.config.layout.height = height;
        self
    }

    /// Tasks run per event loop turn.
    pub fn refresh_batch_size(mut self, size: usize) -> Self {
        self.config.refresh_batch_size = size;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<GraphConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
