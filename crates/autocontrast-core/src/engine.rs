use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::buffer::PixelBuffer;
use crate::compute::{AcceleratorBackend, DeviceDescriptor, DeviceRequest};
use crate::error::{ContrastError, Result};
use crate::histogram::{self, Histogram};
use crate::pipeline::types::{NoOpReporter, ProgressReporter, StretchPhase};
use crate::pool::WorkerPool;
use crate::range::{ignore_count, select_range, ClipResult};
use crate::rescale::{self, LinearMap, RoundingMode};
use crate::schedule::{ScheduleConfig, WorkScheduler};

/// Wall-clock time spent in each phase of one stretch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseTimings {
    pub histogram: Duration,
    pub selection: Duration,
    pub rescale: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.histogram + self.selection + self.rescale
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.total().as_secs_f64() * 1000.0
    }
}

/// Where one data-parallel phase actually ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseRunner {
    Host,
    Device,
}

/// What a stretch computed, for logging and metrics.
#[derive(Clone, Debug)]
pub struct StretchReport {
    pub ignore_count: u64,
    pub clip: ClipResult,
    /// `None` when the rescale phase was skipped.
    pub map: Option<LinearMap>,
    /// Where the phases ran: the host pool, a named device, or both when a
    /// device was lost part way.
    pub executor: String,
    pub histogram_runner: PhaseRunner,
    /// `None` when the rescale phase was skipped.
    pub rescale_runner: Option<PhaseRunner>,
    pub timings: PhaseTimings,
}

impl StretchReport {
    pub fn rescaled(&self) -> bool {
        self.map.is_some()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.timings.elapsed_ms()
    }
}

#[derive(Clone, Debug)]
pub struct StretchOutput {
    pub buffer: PixelBuffer,
    pub report: StretchReport,
}

struct Accelerator {
    backend: Arc<dyn AcceleratorBackend>,
    request: DeviceRequest,
}

/// Where the two data-parallel phases of one call run.
enum Executor<'a> {
    Host,
    Device {
        backend: &'a dyn AcceleratorBackend,
        device: DeviceDescriptor,
    },
}

/// Owns the worker pool and runs histogram, range selection and rescale.
///
/// The pool is sized from the schedule once and reused by every call.
pub struct StretchEngine {
    schedule: ScheduleConfig,
    rounding: RoundingMode,
    pool: WorkerPool,
    accelerator: Option<Accelerator>,
}

impl StretchEngine {
    pub fn new(schedule: ScheduleConfig) -> Result<Self> {
        schedule.validate()?;
        let pool = WorkerPool::new(schedule.workers())?;
        Ok(Self {
            schedule,
            rounding: RoundingMode::default(),
            pool,
            accelerator: None,
        })
    }

    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    /// Offload both data-parallel phases to the device `request` selects on
    /// `backend`, falling back to the host pool when nothing matches.
    pub fn with_accelerator(
        mut self,
        backend: Arc<dyn AcceleratorBackend>,
        request: DeviceRequest,
    ) -> Self {
        self.accelerator = Some(Accelerator { backend, request });
        self
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    pub fn stretch(&self, buffer: PixelBuffer, coefficient: f32) -> Result<StretchOutput> {
        self.stretch_reported(buffer, coefficient, &NoOpReporter)
    }

    /// Stretch `buffer` in place, reporting each phase to `reporter`.
    ///
    /// The buffer comes back only on success; a failed phase drops it.
    pub fn stretch_reported(
        &self,
        mut buffer: PixelBuffer,
        coefficient: f32,
        reporter: &dyn ProgressReporter,
    ) -> Result<StretchOutput> {
        let ignore = ignore_count(buffer.len(), coefficient)?;
        let executor = self.resolve_executor();
        let mut timings = PhaseTimings::default();

        reporter.begin_stage(StretchPhase::Histogram, Some(buffer.len()));
        let start = Instant::now();
        let (hist, histogram_runner) = self.histogram(buffer.as_bytes(), &executor)?;
        timings.histogram = start.elapsed();
        reporter.finish_stage();
        trace!(bins = ?hist.bins(), "histogram");

        reporter.begin_stage(StretchPhase::RangeSelection, None);
        let start = Instant::now();
        let clip = select_range(&hist, ignore);
        let map = LinearMap::from_clip(clip, self.rounding);
        timings.selection = start.elapsed();
        reporter.finish_stage();
        debug!(
            ignore_count = ignore,
            min_v = clip.min_v,
            max_v = clip.max_v,
            "range selected"
        );

        let mut rescale_runner = None;
        if let Some(map) = &map {
            debug!(scale = map.scale, offset = map.offset, "rescaling");
            reporter.begin_stage(StretchPhase::Rescale, Some(buffer.len()));
            let start = Instant::now();
            rescale_runner = Some(self.rescale(buffer.as_bytes_mut(), &executor, map)?);
            timings.rescale = start.elapsed();
            reporter.finish_stage();
        } else {
            debug!("rescale skipped");
        }

        let executor = self.executor_label(&executor, histogram_runner, rescale_runner);
        info!(
            executor = %executor,
            histogram_ms = timings.histogram.as_secs_f64() * 1000.0,
            selection_ms = timings.selection.as_secs_f64() * 1000.0,
            rescale_ms = timings.rescale.as_secs_f64() * 1000.0,
            "stretch complete"
        );

        Ok(StretchOutput {
            buffer,
            report: StretchReport {
                ignore_count: ignore,
                clip,
                map,
                executor,
                histogram_runner,
                rescale_runner,
                timings,
            },
        })
    }

    fn resolve_executor(&self) -> Executor<'_> {
        let Some(acc) = &self.accelerator else {
            return Executor::Host;
        };
        match acc.backend.supports(acc.request.filter, acc.request.index) {
            Some(device) => {
                debug!(
                    backend = acc.backend.name(),
                    device = %device.name,
                    compute_units = device.compute_units,
                    "device selected"
                );
                Executor::Device {
                    backend: acc.backend.as_ref(),
                    device,
                }
            }
            None => {
                info!(
                    backend = acc.backend.name(),
                    filter = %acc.request.filter,
                    "no matching device, using host pool"
                );
                Executor::Host
            }
        }
    }

    fn host_scheduler(&self, len: usize) -> Result<WorkScheduler> {
        WorkScheduler::new(len, &self.schedule)
    }

    fn histogram(
        &self,
        bytes: &[u8],
        executor: &Executor<'_>,
    ) -> Result<(Histogram, PhaseRunner)> {
        if let Executor::Device { backend, device } = executor {
            match backend.build_histogram(bytes, device) {
                Ok(hist) => return Ok((hist, PhaseRunner::Device)),
                Err(ContrastError::DeviceUnavailable(reason)) => {
                    warn!("device lost during histogram, using host pool: {reason}");
                }
                Err(e) => return Err(e),
            }
        }
        let hist = histogram::reduce(bytes, &self.host_scheduler(bytes.len())?, &self.pool)?;
        Ok((hist, PhaseRunner::Host))
    }

    fn rescale(
        &self,
        bytes: &mut [u8],
        executor: &Executor<'_>,
        map: &LinearMap,
    ) -> Result<PhaseRunner> {
        if let Executor::Device { backend, device } = executor {
            match backend.apply_rescale(bytes, device, map) {
                Ok(()) => return Ok(PhaseRunner::Device),
                Err(ContrastError::DeviceUnavailable(reason)) => {
                    warn!("device lost during rescale, using host pool: {reason}");
                }
                Err(e) => return Err(e),
            }
        }
        rescale::rescale(bytes, &self.host_scheduler(bytes.len())?, &self.pool, map)?;
        Ok(PhaseRunner::Host)
    }

    /// Describe the path the phases actually took.
    fn executor_label(
        &self,
        executor: &Executor<'_>,
        histogram: PhaseRunner,
        rescale: Option<PhaseRunner>,
    ) -> String {
        let host = format!("host pool, {}", self.schedule);
        let Executor::Device { backend, device } = executor else {
            return host;
        };
        let named = format!("{} ({}, {})", backend.name(), device.name, device.kind);
        match (histogram, rescale) {
            (PhaseRunner::Device, None | Some(PhaseRunner::Device)) => named,
            (PhaseRunner::Host, None | Some(PhaseRunner::Host)) => {
                format!("{host}; {named} unavailable")
            }
            (PhaseRunner::Device, Some(PhaseRunner::Host)) => {
                format!("{named}; rescale on {host}")
            }
            (PhaseRunner::Host, Some(PhaseRunner::Device)) => {
                format!("{named}; histogram on {host}")
            }
        }
    }
}

impl std::fmt::Debug for StretchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StretchEngine")
            .field("schedule", &self.schedule)
            .field("rounding", &self.rounding)
            .field("pool", &self.pool)
            .field(
                "accelerator",
                &self.accelerator.as_ref().map(|a| a.backend.name()),
            )
            .finish()
    }
}

/// One-shot stretch on a pool built for `schedule`.
pub fn stretch(
    buffer: PixelBuffer,
    coefficient: f32,
    schedule: &ScheduleConfig,
) -> Result<StretchOutput> {
    StretchEngine::new(*schedule)?.stretch(buffer, coefficient)
}
