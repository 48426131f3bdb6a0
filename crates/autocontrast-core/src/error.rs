use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContrastError {
    #[error("Failed to open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid PNM file: {0}")]
    Format(String),

    #[error("Truncated pixel data: expected {expected} bytes, got {actual}")]
    TruncatedData { expected: usize, actual: usize },

    #[error("Invalid image dimensions: {width}x{height}x{channels} does not match {len} bytes")]
    InvalidDimensions {
        width: u32,
        height: u32,
        channels: usize,
        len: usize,
    },

    #[error("Clipping coefficient {0} outside [0, 0.5)")]
    InvalidCoefficient(f32),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("No compute device available: {0}")]
    DeviceUnavailable(String),

    #[error("Worker failed during {phase}: {reason}")]
    WorkerFailed { phase: &'static str, reason: String },

    #[error("GPU error: {0}")]
    Gpu(String),
}

pub type Result<T> = std::result::Result<T, ContrastError>;
