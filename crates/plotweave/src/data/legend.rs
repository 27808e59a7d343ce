//! Quantile colour scale for numeric legends.

/// Five sequential blues, light to dark.
pub const LEGEND_BLUES: [&str; 5] = ["#eff3ff", "#bdd7e7", "#6baed6", "#3182bd", "#08519c"];

/// Maps numbers to one of [`LEGEND_BLUES`] by quantile of a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileScale {
    thresholds: Vec<f64>,
}

impl QuantileScale {
    /// Build a scale from sample values. Non-finite values are ignored.
    pub fn new(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        let bins = LEGEND_BLUES.len();
        let thresholds = if sorted.is_empty() {
            Vec::new()
        } else {
            (1..bins)
                .map(|i| quantile_sorted(&sorted, i as f64 / bins as f64))
                .collect()
        };
        Self { thresholds }
    }

    /// Upper bounds of all but the last bin.
    pub fn quantiles(&self) -> &[f64] {
        &self.thresholds
    }

    /// Bin index of a value.
    pub fn bin(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        Some(self.thresholds.partition_point(|t| *t <= value))
    }

    /// Colour of a value; `None` for non-finite input.
    pub fn color(&self, value: f64) -> Option<&'static str> {
        self.bin(value).map(|i| LEGEND_BLUES[i.min(LEGEND_BLUES.len() - 1)])
    }

    /// Half-open `[min, max)` value range of a bin, unbounded at the ends.
    pub fn bin_range(&self, bin: usize) -> (f64, f64) {
        let min = if bin == 0 {
            f64::NEG_INFINITY
        } else {
            self.thresholds.get(bin - 1).copied().unwrap_or(f64::INFINITY)
        };
        let max = self.thresholds.get(bin).copied().unwrap_or(f64::INFINITY);
        (min, max)
    }
}

/// Linear interpolation between closest ranks (R-7).
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let i = (n - 1) as f64 * p;
    let i0 = i.floor() as usize;
    let lo = sorted[i0];
    let hi = sorted[(i0 + 1).min(n - 1)];
    lo + (hi - lo) * (i - i0 as f64)
}
