use std::sync::Mutex;

use tracing::trace;

use crate::consts::HISTOGRAM_BINS;
use crate::error::{ContrastError, Result};
use crate::pool::WorkerPool;
use crate::schedule::WorkScheduler;

/// Sample counts per intensity value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram {
    bins: [u64; HISTOGRAM_BINS],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            bins: [0; HISTOGRAM_BINS],
        }
    }

    pub fn from_bins(bins: [u64; HISTOGRAM_BINS]) -> Self {
        Self { bins }
    }

    /// Single-threaded reference count over `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hist = Self::new();
        count_into(&mut hist.bins, bytes);
        hist
    }

    pub fn bins(&self) -> &[u64; HISTOGRAM_BINS] {
        &self.bins
    }

    pub fn count(&self, value: u8) -> u64 {
        self.bins[value as usize]
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Number of bins with at least one sample.
    pub fn occupied(&self) -> usize {
        self.bins.iter().filter(|&&c| c != 0).count()
    }

    /// Add another table of counts bin by bin.
    pub fn merge(&mut self, other: &[u64; HISTOGRAM_BINS]) {
        for (dst, &src) in self.bins.iter_mut().zip(other) {
            *dst += src;
        }
    }
}

fn count_into(bins: &mut [u64; HISTOGRAM_BINS], bytes: &[u8]) {
    for &v in bytes {
        bins[v as usize] += 1;
    }
}

/// Build the histogram of `bytes` on `pool`, partitioned by `scheduler`.
///
/// Each worker counts into a private table and merges it once under the
/// lock, so the merge costs O(256) per worker regardless of image size. The
/// result does not depend on the worker count or the policy.
pub fn reduce(bytes: &[u8], scheduler: &WorkScheduler, pool: &WorkerPool) -> Result<Histogram> {
    scheduler.ensure_fits(bytes.len(), pool.workers())?;

    let shared = Mutex::new(Histogram::new());

    let merged = pool.run("histogram", |worker| {
        let mut local = [0u64; HISTOGRAM_BINS];
        let mut claims = scheduler.claims(worker);
        let mut ranges = 0usize;
        while let Some(range) = claims.claim() {
            count_into(&mut local, &bytes[range.as_range()]);
            ranges += 1;
        }
        trace!(worker, ranges, "histogram worker done");

        let mut hist = shared.lock().map_err(|_| ContrastError::WorkerFailed {
            phase: "histogram",
            reason: "merge lock poisoned".into(),
        })?;
        hist.merge(&local);
        Ok::<(), ContrastError>(())
    })?;
    merged.into_iter().collect::<Result<Vec<()>>>()?;

    shared.into_inner().map_err(|_| ContrastError::WorkerFailed {
        phase: "histogram",
        reason: "merge lock poisoned".into(),
    })
}
