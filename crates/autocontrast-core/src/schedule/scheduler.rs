use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ContrastError, Result};

use super::config::ScheduleConfig;

/// Half-open index range `[start, end)` handed to one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleRange {
    pub start: usize,
    pub end: usize,
}

impl ScheduleRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted range {start}..{end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Clone, Copy, Debug)]
enum Policy {
    Even,
    Chunked { chunk: usize },
    Dynamic { chunk: usize },
}

/// Partitions `[0, len)` among a fixed number of workers.
///
/// Static policies are pure functions of the worker index; the dynamic policy
/// shares one atomic cursor. Every policy hands out pairwise-disjoint ranges
/// whose union is exactly `[0, len)`, which is what lets the rescale phase
/// write through a shared view of the pixel bytes.
#[derive(Debug)]
pub struct WorkScheduler {
    len: usize,
    workers: usize,
    policy: Policy,
    cursor: AtomicUsize,
}

impl WorkScheduler {
    pub fn new(len: usize, config: &ScheduleConfig) -> Result<Self> {
        config.validate()?;
        let policy = match *config {
            ScheduleConfig::StaticEven { .. } => Policy::Even,
            ScheduleConfig::StaticChunked { chunk_size, .. } => Policy::Chunked {
                chunk: chunk_size.max(1),
            },
            // Clamped to len so the shared cursor cannot wrap around.
            ScheduleConfig::Dynamic { chunk_size, .. } => Policy::Dynamic {
                chunk: chunk_size.max(1).min(len.max(1)),
            },
        };
        Ok(Self {
            len,
            workers: config.workers(),
            policy,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Claim handle for `worker` (0-indexed). A worker index past the
    /// configured count gets an exhausted handle.
    pub fn claims(&self, worker: usize) -> WorkerClaims<'_> {
        let state = if worker >= self.workers {
            ClaimState::Done
        } else {
            match self.policy {
                Policy::Even => ClaimState::Even,
                Policy::Chunked { chunk } => match worker.checked_mul(chunk) {
                    Some(next) => ClaimState::Striped {
                        next,
                        chunk,
                        stride: self.workers.checked_mul(chunk),
                    },
                    None => ClaimState::Done,
                },
                Policy::Dynamic { chunk } => ClaimState::Shared { chunk },
            }
        };
        WorkerClaims {
            scheduler: self,
            worker,
            state,
        }
    }

    /// True while no range has been claimed from the shared cursor. Static
    /// policies hold no claim state and are always fresh.
    pub fn is_fresh(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) == 0
    }

    /// Check that this scheduler partitions `len` items among exactly
    /// `workers` workers and has not been claimed from yet; either mismatch
    /// would leave indices unvisited.
    pub fn ensure_fits(&self, len: usize, workers: usize) -> Result<()> {
        if self.len != len || self.workers != workers {
            return Err(ContrastError::InvalidSchedule(format!(
                "scheduler covers {} items over {} workers, phase needs {len} over {workers}",
                self.len, self.workers
            )));
        }
        if !self.is_fresh() {
            return Err(ContrastError::InvalidSchedule(
                "dynamic scheduler already claimed from; build one per phase".into(),
            ));
        }
        Ok(())
    }

    /// Drive every worker's claims to exhaustion on the calling thread and
    /// return all ranges handed out, in claim order.
    pub fn drain_all(&self) -> Vec<ScheduleRange> {
        (0..self.workers)
            .flat_map(|w| self.claims(w).collect::<Vec<_>>())
            .collect()
    }

    fn claim_dynamic(&self, chunk: usize) -> Option<ScheduleRange> {
        // The cursor never moves past len, so it cannot wrap.
        let start = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                (c < self.len).then(|| c.saturating_add(chunk).min(self.len))
            })
            .ok()?;
        Some(ScheduleRange::new(start, start.saturating_add(chunk).min(self.len)))
    }
}

/// Slice of `[0, len)` owned by `worker` under the even split:
/// `[len*w/workers, len*(w+1)/workers)`.
pub fn even_range(len: usize, workers: usize, worker: usize) -> ScheduleRange {
    let bound = |w: usize| ((len as u128 * w as u128) / workers as u128) as usize;
    ScheduleRange::new(bound(worker), bound(worker + 1))
}

#[derive(Clone, Copy, Debug)]
enum ClaimState {
    Even,
    Striped {
        next: usize,
        chunk: usize,
        stride: Option<usize>,
    },
    Shared {
        chunk: usize,
    },
    Done,
}

/// Per-worker view of a [`WorkScheduler`]. Call [`claim`](Self::claim) until
/// it returns `None`; handles for different workers may be used from
/// different threads at the same time.
#[derive(Debug)]
pub struct WorkerClaims<'a> {
    scheduler: &'a WorkScheduler,
    worker: usize,
    state: ClaimState,
}

impl WorkerClaims<'_> {
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn claim(&mut self) -> Option<ScheduleRange> {
        let len = self.scheduler.len;
        match self.state {
            ClaimState::Done => None,
            ClaimState::Even => {
                self.state = ClaimState::Done;
                let range = even_range(len, self.scheduler.workers, self.worker);
                (!range.is_empty()).then_some(range)
            }
            ClaimState::Striped {
                next,
                chunk,
                stride,
            } => {
                if next >= len {
                    self.state = ClaimState::Done;
                    return None;
                }
                // Overflow past usize::MAX ends the stripe; len is always below it.
                self.state = match stride.and_then(|s| next.checked_add(s)) {
                    Some(after) => ClaimState::Striped {
                        next: after,
                        chunk,
                        stride,
                    },
                    None => ClaimState::Done,
                };
                Some(ScheduleRange::new(next, next.saturating_add(chunk).min(len)))
            }
            ClaimState::Shared { chunk } => {
                let claimed = self.scheduler.claim_dynamic(chunk);
                if claimed.is_none() {
                    self.state = ClaimState::Done;
                }
                claimed
            }
        }
    }
}

impl Iterator for WorkerClaims<'_> {
    type Item = ScheduleRange;

    fn next(&mut self) -> Option<ScheduleRange> {
        self.claim()
    }
}
