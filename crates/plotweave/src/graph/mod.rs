//! The graph layer: axis places and models, layout, plot type inference
//! and the controller that ties them to a [`DataConfiguration`].
//!
//! [`DataConfiguration`]: crate::data::DataConfiguration

mod axis;
mod controller;
mod layout;
mod model;
mod nice;
mod place;
mod plot_type;
mod scale;

pub use axis::{AxisModel, DEFAULT_NUMERIC_AXIS_BOUNDS, NumericAxis, compute_slope_and_intercept};
pub use controller::GraphController;
pub use layout::{
    AXIS_TICK_LENGTH, AXIS_TICK_PADDING, Bounds, DEFAULT_GRAPH_HEIGHT, DEFAULT_GRAPH_WIDTH, GraphLayout,
    LayoutBounds, LayoutConfig, TOP_AND_RIGHT_DEFAULT_EXTENT, compute_layout,
};
pub use model::{GraphModel, GraphSnapshot};
pub use nice::{compute_nice_numeric_bounds, set_nice_domain};
pub use place::{AxisPlace, GraphPlace};
pub use plot_type::PlotType;
pub use scale::{AxisScale, Orientation, ScaleType};
