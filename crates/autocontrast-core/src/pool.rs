use std::panic::{self, AssertUnwindSafe};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{ContrastError, Result};

/// Fixed-size pool that runs exactly one task per worker for each phase.
///
/// [`run`](Self::run) returns only after every worker task has finished, so
/// each call is a barrier between phases.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ContrastError::InvalidSchedule(
                "worker count must be positive, got 0".into(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("autocontrast-worker-{i}"))
            .build()
            .map_err(|e| ContrastError::WorkerFailed {
                phase: "startup",
                reason: e.to_string(),
            })?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `task(worker_index)` once on every pool thread and collect the
    /// results in worker order. A panicking worker fails the whole phase.
    pub fn run<R, F>(&self, phase: &'static str, task: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize) -> R + Sync,
    {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.broadcast(|ctx| task(ctx.index()))
        }))
        .map_err(|payload| ContrastError::WorkerFailed {
            phase,
            reason: panic_message(payload.as_ref()),
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
