use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{HISTOGRAM_BINS, MAX_INTENSITY};
use crate::error::Result;
use crate::pool::WorkerPool;
use crate::range::ClipResult;
use crate::schedule::{ScheduleRange, WorkScheduler};

/// How a scaled value is brought back to an integer before clamping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// Round half away from zero.
    #[default]
    Nearest,
    /// Truncate toward zero, like a C integer cast.
    Truncate,
}

impl std::fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Truncate => write!(f, "truncate"),
        }
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" | "round" => Ok(Self::Nearest),
            "truncate" | "trunc" => Ok(Self::Truncate),
            other => Err(format!(
                "unknown rounding mode '{other}' (expected nearest or truncate)"
            )),
        }
    }
}

/// `v -> clamp(R(scale * v - offset), 0, 255)` in single precision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearMap {
    pub scale: f32,
    pub offset: f32,
    pub rounding: RoundingMode,
}

impl LinearMap {
    /// Map stretching `[min_v, max_v]` onto `[0, 255]`, or `None` when the
    /// clip result calls for skipping the rescale.
    pub fn from_clip(clip: ClipResult, rounding: RoundingMode) -> Option<Self> {
        if !clip.needs_rescale() {
            return None;
        }
        let scale = MAX_INTENSITY as f32 / (clip.max_v - clip.min_v) as f32;
        Some(Self {
            scale,
            offset: scale * clip.min_v as f32,
            rounding,
        })
    }

    pub fn apply(&self, value: u8) -> u8 {
        let scaled = self.scale * value as f32 - self.offset;
        let integral = match self.rounding {
            RoundingMode::Nearest => scaled.round(),
            RoundingMode::Truncate => scaled.trunc(),
        };
        integral.clamp(0.0, MAX_INTENSITY as f32) as u8
    }

    /// The map evaluated for every byte value.
    pub fn lookup_table(&self) -> [u8; HISTOGRAM_BINS] {
        let mut lut = [0u8; HISTOGRAM_BINS];
        for (v, out) in lut.iter_mut().enumerate() {
            *out = self.apply(v as u8);
        }
        lut
    }
}

/// Shared view of a byte slice that hands out `&mut` sub-slices to
/// concurrent workers. Only sound while the requested ranges are pairwise
/// disjoint, which [`WorkScheduler`] guarantees within one phase.
struct DisjointBytes<'a> {
    ptr: *mut u8,
    len: usize,
    _marker: PhantomData<&'a mut [u8]>,
}

// SAFETY: workers only touch the disjoint ranges the scheduler gave them.
unsafe impl Send for DisjointBytes<'_> {}
unsafe impl Sync for DisjointBytes<'_> {}

impl<'a> DisjointBytes<'a> {
    fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            ptr: bytes.as_mut_ptr(),
            len: bytes.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// No other live reference may overlap `range`.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slice_mut(&self, range: ScheduleRange) -> &'a mut [u8] {
        assert!(range.end <= self.len, "range {range:?} past end {}", self.len);
        // SAFETY: in bounds by the assert; exclusivity is the caller's contract.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(range.start), range.len()) }
    }
}

/// Apply `map` to every byte in place on `pool`, partitioned by `scheduler`.
pub fn rescale(
    bytes: &mut [u8],
    scheduler: &WorkScheduler,
    pool: &WorkerPool,
    map: &LinearMap,
) -> Result<()> {
    scheduler.ensure_fits(bytes.len(), pool.workers())?;

    let lut = map.lookup_table();
    let view = DisjointBytes::new(bytes);

    pool.run("rescale", |worker| {
        let mut claims = scheduler.claims(worker);
        while let Some(range) = claims.claim() {
            // SAFETY: ranges from one scheduler never overlap.
            let chunk = unsafe { view.slice_mut(range) };
            for v in chunk {
                *v = lut[*v as usize];
            }
        }
    })?;
    Ok(())
}

/// Sequential reference: apply `map` to every byte.
pub fn rescale_sequential(bytes: &mut [u8], map: &LinearMap) {
    let lut = map.lookup_table();
    for v in bytes {
        *v = lut[*v as usize];
    }
}

