pub mod config;
mod orchestrator;
pub mod types;

pub use orchestrator::{build_engine, metrics_sink, run_file, run_file_reported};
pub use types::{NoOpReporter, ProgressReporter, RunSummary, StretchPhase};
