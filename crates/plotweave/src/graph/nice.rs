//! "Nice" axis bounds.
//!
//! Bounds are widened outward to multiples of a 1/2/5 tick gap, with the
//! lower bound snapped to zero when the data sits well away from it. The
//! result is a fixed point: rounding already-nice bounds leaves them alone.

use plotweave_core::logging::targets;

use super::axis::{DEFAULT_NUMERIC_AXIS_BOUNDS, NumericAxis};

const TARGET_TICKS: f64 = 5.0;
const MAX_PASSES: usize = 16;
const EPSILON: f64 = 1e-9;

/// Widen `[min, max]` to nice bounds.
pub fn compute_nice_numeric_bounds(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        tracing::warn!(target: targets::AXIS, min, max, "non-finite values, using default bounds");
        return DEFAULT_NUMERIC_AXIS_BOUNDS;
    }
    let (mut lo, mut hi) = if min > max { (max, min) } else { (min, max) };

    if lo == hi {
        if lo == 0.0 {
            return (-10.0, 10.0);
        }
        let pad = lo.abs() * 0.1;
        lo -= pad;
        hi += pad;
    }

    for _ in 0..MAX_PASSES {
        let (next_lo, next_hi) = nice_pass(lo, hi);
        if next_lo == lo && next_hi == hi {
            break;
        }
        lo = next_lo;
        hi = next_hi;
    }
    (lo, hi)
}

fn nice_pass(mut lo: f64, mut hi: f64) -> (f64, f64) {
    if lo > 0.0 && hi > 0.0 && lo <= hi / 2.5 {
        lo = 0.0;
    } else if lo < 0.0 && hi < 0.0 && hi >= lo / 2.5 {
        hi = 0.0;
    }
    let gap = tick_gap((hi - lo) / TARGET_TICKS);
    if gap <= 0.0 || !gap.is_finite() {
        return (lo, hi);
    }
    let lo = round_to_gap((lo / gap + EPSILON).floor() * gap, gap);
    let hi = round_to_gap((hi / gap - EPSILON).ceil() * gap, gap);
    (lo, hi)
}

/// The 1/2/5 × 10^k step nearest above `raw`.
fn tick_gap(raw: f64) -> f64 {
    if raw <= 0.0 || !raw.is_finite() {
        return 0.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let base = raw / magnitude;
    let step = if base < 2.0 - EPSILON {
        1.0
    } else if base < 5.0 - EPSILON {
        2.0
    } else {
        5.0
    };
    step * magnitude
}

// Keep multiples of a decimal gap free of binary noise, so 4.4 stays 4.4.
fn round_to_gap(value: f64, gap: f64) -> f64 {
    let decimals = (-gap.log10().floor()).max(0.0) as i32 + 1;
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Fit `axis` to `values` with nice bounds.
///
/// Does nothing when there are no values. Returns whether the domain changed.
pub fn set_nice_domain(values: &[f64], axis: &mut NumericAxis) -> bool {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let Some((min, max)) = finite.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        None => Some((v, v)),
    }) else {
        return false;
    };
    let (lo, hi) = compute_nice_numeric_bounds(min, max);
    let changed = axis.set_domain(lo, hi);
    if changed {
        tracing::debug!(target: targets::AXIS, lo, hi, "axis rescaled");
    }
    changed
}
