//! Coordinate scales owned by the layout, one per axis place.
//!
//! A scale maps data to pixels along its axis. Its domain (numbers or
//! categories) is set by the controller; its length is set by the layout
//! whenever the plot rectangle changes. The two are independent.

use serde::{Deserialize, Serialize};

/// How a scale maps its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScaleType {
    /// Discrete values with no geometry; used by empty axes.
    #[default]
    Ordinal,
    /// Categories mapped to equal-width bands.
    Band,
    /// Numbers mapped linearly.
    Linear,
}

/// Direction an axis runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    /// Left to right.
    Horizontal,
    /// Bottom to top; pixel coordinates grow downward.
    Vertical,
}

/// The scale of one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisScale {
    scale_type: ScaleType,
    orientation: Orientation,
    domain: (f64, f64),
    categories: Vec<String>,
    length: f64,
}

impl AxisScale {
    /// An ordinal scale of zero length.
    pub fn new(orientation: Orientation) -> Self {
        Self {
            scale_type: ScaleType::Ordinal,
            orientation,
            domain: (0.0, 1.0),
            categories: Vec::new(),
            length: 0.0,
        }
    }

    /// The scale type.
    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    /// Change the scale type. Returns whether it changed.
    pub fn set_scale_type(&mut self, scale_type: ScaleType) -> bool {
        let changed = self.scale_type != scale_type;
        self.scale_type = scale_type;
        changed
    }

    /// The orientation.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// The numeric domain.
    pub fn numeric_domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Set the numeric domain. Returns whether it changed.
    pub fn set_numeric_domain(&mut self, domain: (f64, f64)) -> bool {
        let changed = self.domain != domain;
        self.domain = domain;
        changed
    }

    /// The categories, in axis order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Set the categories. Returns whether they changed.
    pub fn set_categories(&mut self, categories: Vec<String>) -> bool {
        let changed = self.categories != categories;
        self.categories = categories;
        changed
    }

    /// Pixel length of the range.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Set the pixel length. Returns whether it changed.
    pub fn set_length(&mut self, length: f64) -> bool {
        let length = if length.is_finite() { length.max(0.0) } else { 0.0 };
        let changed = self.length != length;
        self.length = length;
        changed
    }

    /// Pixel offset of a number along the axis. `None` unless the scale is
    /// linear with a non-empty domain.
    pub fn map_numeric(&self, value: f64) -> Option<f64> {
        if self.scale_type != ScaleType::Linear || !value.is_finite() {
            return None;
        }
        let (min, max) = self.domain;
        let span = max - min;
        if span <= 0.0 {
            return None;
        }
        let fraction = (value - min) / span;
        Some(match self.orientation {
            Orientation::Horizontal => fraction * self.length,
            Orientation::Vertical => (1.0 - fraction) * self.length,
        })
    }

    /// Width of one band.
    pub fn band_width(&self) -> f64 {
        if self.categories.is_empty() {
            0.0
        } else {
            self.length / self.categories.len() as f64
        }
    }

    /// Start offset and width of a category's band. Vertical axes stack
    /// bands from the bottom.
    pub fn band_for(&self, category: &str) -> Option<(f64, f64)> {
        if self.scale_type != ScaleType::Band {
            return None;
        }
        let index = self.categories.iter().position(|c| c == category)?;
        let width = self.band_width();
        let start = match self.orientation {
            Orientation::Horizontal => index as f64 * width,
            Orientation::Vertical => self.length - (index + 1) as f64 * width,
        };
        Some((start, width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_mapping() {
        let mut scale = AxisScale::new(Orientation::Horizontal);
        assert_eq!(scale.map_numeric(1.0), None);
        scale.set_scale_type(ScaleType::Linear);
        scale.set_numeric_domain((0.0, 10.0));
        scale.set_length(200.0);
        assert_eq!(scale.map_numeric(5.0), Some(100.0));

        let mut vertical = AxisScale::new(Orientation::Vertical);
        vertical.set_scale_type(ScaleType::Linear);
        vertical.set_numeric_domain((0.0, 10.0));
        vertical.set_length(100.0);
        assert_eq!(vertical.map_numeric(10.0), Some(0.0));
        assert_eq!(vertical.map_numeric(0.0), Some(100.0));
    }

    #[test]
    fn test_bands() {
        let mut scale = AxisScale::new(Orientation::Horizontal);
        scale.set_scale_type(ScaleType::Band);
        scale.set_categories(vec!["a".into(), "b".into()]);
        scale.set_length(100.0);
        assert_eq!(scale.band_for("b"), Some((50.0, 50.0)));
        assert_eq!(scale.band_for("z"), None);

        let mut vertical = AxisScale::new(Orientation::Vertical);
        vertical.set_scale_type(ScaleType::Band);
        vertical.set_categories(vec!["a".into(), "b".into()]);
        vertical.set_length(100.0);
        assert_eq!(vertical.band_for("a"), Some((50.0, 50.0)));
    }

    #[test]
    fn test_setters_report_changes() {
        let mut scale = AxisScale::new(Orientation::Horizontal);
        assert!(scale.set_length(10.0));
        assert!(!scale.set_length(10.0));
        scale.set_length(f64::NAN);
        assert_eq!(scale.length(), 0.0);
        assert!(!scale.set_scale_type(ScaleType::Ordinal));
    }
}
