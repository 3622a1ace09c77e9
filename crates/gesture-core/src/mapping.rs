//! Clamped linear range mapping.

use serde::Serialize;

/// Closed interval `[lo, hi]`. `lo` may be greater than `hi` for inverted
/// output ranges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Range {
    pub lo: f32,
    pub hi: f32,
}

impl Range {
    pub const fn new(lo: f32, hi: f32) -> Self {
        Self { lo, hi }
    }

    pub fn midpoint(&self) -> f32 {
        (self.lo + self.hi) / 2.0
    }

    pub fn contains(&self, value: f32) -> bool {
        let (lo, hi) = if self.lo <= self.hi {
            (self.lo, self.hi)
        } else {
            (self.hi, self.lo)
        };
        (lo..=hi).contains(&value)
    }
}

/// Pinch domain and the fixed UI output ranges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinchMapping {
    /// Thumb-index distance domain in pixels.
    pub input: Range,
    /// Percentage shown on screen.
    pub percent: Range,
    /// Top edge of the filled volume bar; inverted so a louder level draws a
    /// taller bar.
    pub bar_px: Range,
}

impl Default for PinchMapping {
    fn default() -> Self {
        Self {
            input: Range::new(30.0, 250.0),
            percent: Range::new(0.0, 100.0),
            bar_px: Range::new(375.0, 125.0),
        }
    }
}

/// Map `value` from `[in_lo, in_hi]` onto `[out_lo, out_hi]`.
///
/// `value` is clamped into the input interval first, so anything below the
/// input range yields `out_lo` and anything above yields `out_hi`. An inverted
/// input interval is normalised by swapping both endpoint pairs. NaN maps to
/// `out_lo`.
pub fn interpolate(value: f32, in_lo: f32, in_hi: f32, out_lo: f32, out_hi: f32) -> f32 {
    if value.is_nan() {
        return out_lo;
    }
    let (in_lo, in_hi, out_lo, out_hi) = if in_hi < in_lo {
        (in_hi, in_lo, out_hi, out_lo)
    } else {
        (in_lo, in_hi, out_lo, out_hi)
    };
    if value <= in_lo {
        return out_lo;
    }
    if value >= in_hi {
        return out_hi;
    }
    let t = (value - in_lo) / (in_hi - in_lo);
    out_lo + t * (out_hi - out_lo)
}

/// [`interpolate`] over [`Range`] values.
pub fn map_range(value: f32, input: Range, output: Range) -> f32 {
    interpolate(value, input.lo, input.hi, output.lo, output.hi)
}
