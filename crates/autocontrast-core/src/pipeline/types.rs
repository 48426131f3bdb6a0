use std::time::Duration;

use crate::engine::StretchReport;
use crate::io::PnmHeader;

/// Phase of one file run, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StretchPhase {
    Reading,
    Histogram,
    RangeSelection,
    Rescale,
    Writing,
}

impl std::fmt::Display for StretchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading image"),
            Self::Histogram => write!(f, "Building histogram"),
            Self::RangeSelection => write!(f, "Selecting range"),
            Self::Rescale => write!(f, "Rescaling"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for a run.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A phase has started. `total_items` is the sample count when the
    /// phase touches every sample.
    fn begin_stage(&self, _phase: StretchPhase, _total_items: Option<usize>) {}

    /// The current phase is finished.
    fn finish_stage(&self) {}
}

pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Outcome of one file run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub header: PnmHeader,
    pub report: StretchReport,
    pub read: Duration,
    pub write: Duration,
}
