use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::consts::CSV_HEADER;
use crate::error::{ContrastError, Result};
use crate::schedule::ScheduleKind;

/// One timed stretch, as recorded by a [`MetricsSink`].
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsRecord {
    /// Usually the input file name.
    pub label: String,
    pub workers: usize,
    pub schedule: ScheduleKind,
    pub chunk_size: usize,
    pub elapsed_ms: f64,
}

/// Destination for per-run timing rows.
pub trait MetricsSink: Send + Sync {
    fn record(&self, record: &MetricsRecord) -> Result<()>;
}

/// Discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _record: &MetricsRecord) -> Result<()> {
        Ok(())
    }
}

/// Semicolon-separated file, one row per record, flushed after each row.
pub struct CsvMetricsSink {
    writer: Mutex<BufWriter<File>>,
}

impl CsvMetricsSink {
    /// Create (or truncate) `path` and write the header row.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| ContrastError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{CSV_HEADER}")?;
        writer.flush()?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }
}

impl MetricsSink for CsvMetricsSink {
    fn record(&self, record: &MetricsRecord) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| {
            ContrastError::Io(std::io::Error::other("metrics writer lock poisoned"))
        })?;
        writeln!(
            writer,
            "{};{};{};{};{}",
            record.label, record.workers, record.schedule, record.chunk_size, record.elapsed_ms
        )?;
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for CsvMetricsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvMetricsSink").finish_non_exhaustive()
    }
}
