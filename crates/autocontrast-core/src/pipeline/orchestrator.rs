use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::compute::create_backend;
use crate::engine::StretchEngine;
use crate::error::Result;
use crate::io::{read_pnm, write_pnm, PnmImage};
use crate::metrics::{CsvMetricsSink, MetricsRecord, MetricsSink, NoopSink};

use super::config::BenchmarkConfig;
use super::types::{NoOpReporter, ProgressReporter, RunSummary, StretchPhase};

/// Build the engine `config` describes, accelerator included.
pub fn build_engine(config: &BenchmarkConfig) -> Result<StretchEngine> {
    let mut engine = StretchEngine::new(config.schedule)?.with_rounding(config.rounding);
    if let Some(device) = &config.device {
        let backend = create_backend(&device.backend);
        info!(backend = backend.name(), filter = %device.filter, "Accelerator enabled");
        engine = engine.with_accelerator(backend, device.request());
    }
    Ok(engine)
}

/// The sink `config.metrics` asks for, or one that discards everything.
pub fn metrics_sink(config: &BenchmarkConfig) -> Result<Arc<dyn MetricsSink>> {
    match config.metrics.as_ref().and_then(|m| m.csv.as_ref()) {
        Some(path) => Ok(Arc::new(CsvMetricsSink::create(path)?)),
        None => Ok(Arc::new(NoopSink)),
    }
}

/// Label recorded for runs of `config`: the configured one, else the input
/// file name.
fn run_label(config: &BenchmarkConfig) -> String {
    config
        .metrics
        .as_ref()
        .and_then(|m| m.label.clone())
        .unwrap_or_else(|| {
            config
                .input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| config.input.display().to_string())
        })
}

/// Read, stretch and write one file, recording the stretch time to `sink`.
pub fn run_file(config: &BenchmarkConfig, sink: &dyn MetricsSink) -> Result<RunSummary> {
    run_file_reported(config, sink, Arc::new(NoOpReporter))
}

/// [`run_file`] with a thread-safe progress reporter.
pub fn run_file_reported(
    config: &BenchmarkConfig,
    sink: &dyn MetricsSink,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let engine = build_engine(config)?;

    reporter.begin_stage(StretchPhase::Reading, None);
    let start = Instant::now();
    let image = read_pnm(&config.input)?;
    let read = start.elapsed();
    reporter.finish_stage();

    let header = image.header();
    info!(
        path = %config.input.display(),
        format = %header.format,
        width = header.width,
        height = header.height,
        "Read image"
    );

    let max_value = image.max_value;
    let output = engine.stretch_reported(image.buffer, config.coefficient, reporter.as_ref())?;

    reporter.begin_stage(StretchPhase::Writing, None);
    let start = Instant::now();
    write_pnm(
        &config.output,
        &PnmImage {
            max_value,
            buffer: output.buffer,
        },
    )?;
    let write = start.elapsed();
    reporter.finish_stage();
    info!(path = %config.output.display(), "Wrote image");

    sink.record(&MetricsRecord {
        label: run_label(config),
        workers: config.schedule.workers(),
        schedule: config.schedule.kind(),
        chunk_size: config.schedule.chunk_size(),
        elapsed_ms: output.report.elapsed_ms(),
    })?;

    Ok(RunSummary {
        header,
        report: output.report,
        read,
        write,
    })
}
