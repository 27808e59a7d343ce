//! Faceting: splitting the plot into cells by categorical attributes, and
//! the adornments that keep state per cell.

mod adornment;
mod sub_plot_key;

pub use adornment::{
    Adornment, HandlePosition, LinePart, MOVABLE_LINE_TYPE, MovableLine, MovableLineAdornment, Point,
    UpdateCategoriesOptions, annotation_id,
};
pub use sub_plot_key::{FacetDimension, FacetGrid, SubPlotKey};
