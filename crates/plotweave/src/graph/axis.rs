//! Axis models.

use serde::{Deserialize, Serialize};

use plotweave_core::logging::targets;

use crate::data::AttributeType;

/// Bounds given to a numeric axis that has nothing better.
pub const DEFAULT_NUMERIC_AXIS_BOUNDS: (f64, f64) = (0.0, 10.0);

/// A numeric axis domain.
///
/// `min <= max` and both are finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericAxis {
    min: f64,
    max: f64,
    /// A locked axis keeps its bounds when the data changes.
    #[serde(default)]
    pub locked: bool,
}

impl NumericAxis {
    /// An axis over `[min, max]`, normalized.
    pub fn new(min: f64, max: f64) -> Self {
        let (min, max) = normalize_domain(min, max);
        Self {
            min,
            max,
            locked: false,
        }
    }

    /// Lower bound.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// `(min, max)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Replace the domain. Returns whether it changed.
    pub fn set_domain(&mut self, min: f64, max: f64) -> bool {
        let (min, max) = normalize_domain(min, max);
        let changed = (self.min, self.max) != (min, max);
        self.min = min;
        self.max = max;
        changed
    }
}

impl Default for NumericAxis {
    fn default() -> Self {
        Self::new(DEFAULT_NUMERIC_AXIS_BOUNDS.0, DEFAULT_NUMERIC_AXIS_BOUNDS.1)
    }
}

fn normalize_domain(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        tracing::warn!(target: targets::AXIS, min, max, "non-finite axis domain replaced with defaults");
        return DEFAULT_NUMERIC_AXIS_BOUNDS;
    }
    if min > max { (max, min) } else { (min, max) }
}

/// The model behind one axis place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AxisModel {
    /// Nothing is bound; the axis draws a bare line.
    #[default]
    Empty,
    /// A categorical axis.
    Categorical {
        /// Categories in axis order.
        #[serde(default)]
        categories: Vec<String>,
    },
    /// A numeric axis.
    Numeric(NumericAxis),
}

impl AxisModel {
    /// A categorical axis with no categories yet.
    pub fn categorical() -> Self {
        AxisModel::Categorical {
            categories: Vec::new(),
        }
    }

    /// A numeric axis with default bounds.
    pub fn numeric() -> Self {
        AxisModel::Numeric(NumericAxis::default())
    }

    /// The attribute type this axis displays.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AxisModel::Empty => AttributeType::Empty,
            AxisModel::Categorical { .. } => AttributeType::Categorical,
            AxisModel::Numeric(_) => AttributeType::Numeric,
        }
    }

    /// Whether the axis is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, AxisModel::Numeric(_))
    }

    /// The numeric domain, for numeric axes.
    pub fn as_numeric(&self) -> Option<&NumericAxis> {
        match self {
            AxisModel::Numeric(axis) => Some(axis),
            _ => None,
        }
    }

    /// Mutable numeric domain, for numeric axes.
    pub fn as_numeric_mut(&mut self) -> Option<&mut NumericAxis> {
        match self {
            AxisModel::Numeric(axis) => Some(axis),
            _ => None,
        }
    }

    /// The categories, for categorical axes.
    pub fn categories(&self) -> &[String] {
        match self {
            AxisModel::Categorical { categories } => categories,
            _ => &[],
        }
    }
}

/// Initial slope and intercept of a movable line spanning the visible
/// domain: it rises over the whole y range within the left half of x.
///
/// Non-numeric axes count as `[0, 0]`; a degenerate x span gives a flat line.
pub fn compute_slope_and_intercept(x_axis: Option<&AxisModel>, y_axis: Option<&AxisModel>) -> (f64, f64) {
    let bounds = |axis: Option<&AxisModel>| axis.and_then(AxisModel::as_numeric).map_or((0.0, 0.0), NumericAxis::domain);
    let (x_lower, x_upper) = bounds(x_axis);
    let (y_lower, y_upper) = bounds(y_axis);

    let adjusted_x_upper = x_lower + (x_upper - x_lower) / 2.0;
    let run = adjusted_x_upper - x_lower;
    let slope = if run == 0.0 { 0.0 } else { (y_upper - y_lower) / run };
    let intercept = y_lower - slope * x_lower;
    (slope, intercept)
}
