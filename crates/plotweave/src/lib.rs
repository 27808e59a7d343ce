//! Plotweave - the data-binding and layout engine of an interactive graph
//! tile.
//!
//! A graph binds dataset attributes to roles (x, y, legend, splits), keeps a
//! filtered set of plottable cases per series, derives the plot type and
//! axis models from the bound attribute types, and divides the tile into
//! plot, axis and legend regions.
//!
//! - [`data`]: attribute bindings, filtered case sets and derived queries
//! - [`graph`]: axis models, nice bounds, layout, plot types and the controller
//! - [`facet`]: split cells and the adornments drawn in them
//! - [`config`]: settings for a graph tile
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use plotweave::data::{CaseMetadata, CaseValues, DataConfiguration, Dataset, MemoryCaseMetadata, MemoryDataset};
//! use plotweave::graph::{GraphController, GraphPlace, PlotType};
//! use plotweave::GraphConfig;
//!
//! let dataset = Arc::new(MemoryDataset::new("trees"));
//! dataset.add_attribute("height", "Height", None)?;
//! dataset.add_cases(vec![
//!     CaseValues::new("t1").with("height", 3.0),
//!     CaseValues::new("t2").with("height", 7.5),
//! ])?;
//! let source: Arc<dyn Dataset> = dataset.clone();
//! let metadata: Arc<dyn CaseMetadata> = Arc::new(MemoryCaseMetadata::for_dataset(&dataset));
//!
//! let data = DataConfiguration::new();
//! data.set_dataset(Some(&source), Some(&metadata));
//!
//! let config = GraphConfig::default();
//! let event_loop = config.event_loop();
//! let controller = GraphController::from_config(data, &event_loop, config);
//! controller.handle_attribute_assignment(GraphPlace::Bottom, Some("height"));
//! assert_eq!(controller.graph().plot_type(), PlotType::DotPlot);
//!
//! event_loop.run_until_idle(8);
//! # Ok::<(), plotweave::Error>(())
//! ```

pub mod config;
pub mod data;
mod error;
pub mod facet;
pub mod graph;

pub use config::{DEFAULT_REFRESH_BATCH_SIZE, GraphConfig, GraphConfigBuilder};
pub use error::{Error, Result};
pub use plotweave_core::{Debouncer, EventLoop, Signal};
