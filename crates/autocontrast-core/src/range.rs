use crate::consts::{MAX_COEFFICIENT, MAX_INTENSITY};
use crate::error::{ContrastError, Result};
use crate::histogram::Histogram;

/// Clipped intensity bounds selected from a histogram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipResult {
    pub min_v: u8,
    pub max_v: u8,
}

impl Default for ClipResult {
    /// Sentinel left in place when no bin reaches the threshold.
    fn default() -> Self {
        Self {
            min_v: MAX_INTENSITY,
            max_v: 0,
        }
    }
}

impl ClipResult {
    /// The image already spans the full output range.
    pub fn is_full_range(&self) -> bool {
        self.min_v == 0 && self.max_v == MAX_INTENSITY
    }

    /// Fewer than two distinct intensities survive the clipping.
    pub fn is_degenerate(&self) -> bool {
        self.min_v >= self.max_v
    }

    /// Whether the rescale phase should run at all.
    pub fn needs_rescale(&self) -> bool {
        !self.is_full_range() && !self.is_degenerate()
    }
}

/// Samples ignored at each end: `floor(len * coefficient)`.
///
/// The coefficient must lie in `[0, 0.5)`. The product is taken in single
/// precision so that decimal coefficients behave as written: `100 * 0.01`
/// is 1, where widening `0.01f32` to f64 first would give 0.
pub fn ignore_count(len: usize, coefficient: f32) -> Result<u64> {
    if !(0.0..MAX_COEFFICIENT).contains(&coefficient) {
        return Err(ContrastError::InvalidCoefficient(coefficient));
    }
    Ok((len as f32 * coefficient).floor() as u64)
}

/// Pick `min_v`/`max_v` after discarding `ignore_count` samples from each end.
///
/// A bound is the first bin, scanning inwards, where the running tail count
/// has reached `ignore_count` and the bin itself is occupied. Crossing the
/// threshold on an empty bin does not settle the bound.
pub fn select_range(histogram: &Histogram, ignore_count: u64) -> ClipResult {
    let bins = histogram.bins();
    let mut clip = ClipResult::default();

    if let Some(i) = scan_tail(bins.iter().enumerate(), ignore_count) {
        clip.min_v = i as u8;
    }
    if let Some(i) = scan_tail(bins.iter().enumerate().rev(), ignore_count) {
        clip.max_v = i as u8;
    }
    clip
}

fn scan_tail<'a>(
    bins: impl Iterator<Item = (usize, &'a u64)>,
    ignore_count: u64,
) -> Option<usize> {
    let mut tail = 0u64;
    for (i, &count) in bins {
        if tail < ignore_count {
            tail += count;
        }
        if tail >= ignore_count && count != 0 {
            return Some(i);
        }
    }
    None
}
