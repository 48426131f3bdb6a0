use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use autocontrast_core::consts::{DEFAULT_BENCH_CHUNKS, DEFAULT_COEFFICIENT};
use autocontrast_core::io::read_pnm;
use autocontrast_core::metrics::{CsvMetricsSink, MetricsRecord, MetricsSink, NoopSink};
use autocontrast_core::rescale::RoundingMode;
use autocontrast_core::schedule::{default_workers, ScheduleConfig, ScheduleKind};
use autocontrast_core::StretchEngine;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::summary::{print_bench_table, BenchRow};

#[derive(Args)]
pub struct BenchArgs {
    /// Input PNM file (P5 or P6)
    pub file: PathBuf,

    /// Comma-separated worker counts (defaults to 1, 2, 4 and the CPU count)
    #[arg(long)]
    pub workers: Option<String>,

    /// Comma-separated schedules: static, static-chunked, dynamic
    #[arg(long, default_value = "static,static-chunked,dynamic")]
    pub schedules: String,

    /// Comma-separated chunk sizes for the chunked schedules
    #[arg(long)]
    pub chunks: Option<String>,

    /// Timed runs per grid point
    #[arg(long, default_value = "3")]
    pub repeat: usize,

    /// Fraction of samples ignored at each end, in [0, 0.5)
    #[arg(long, default_value_t = DEFAULT_COEFFICIENT)]
    pub coef: f32,

    /// How scaled values are rounded: nearest or truncate
    #[arg(long, default_value = "nearest")]
    pub rounding: RoundingMode,

    /// Write every run to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

fn parse_list<T>(list: &str, what: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let items = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid {what} '{s}': {e}"))
        })
        .collect::<Result<Vec<T>>>()?;
    if items.is_empty() {
        bail!("no {what} given");
    }
    Ok(items)
}

fn default_worker_counts() -> Vec<i64> {
    let mut counts = vec![1, 2, 4, default_workers() as i64];
    counts.sort_unstable();
    counts.dedup();
    counts
}

/// Every schedule the grid covers. The even split ignores chunk sizes.
fn build_grid(
    workers: &[i64],
    kinds: &[ScheduleKind],
    chunks: &[i64],
) -> Result<Vec<ScheduleConfig>> {
    let mut grid = Vec::new();
    for &w in workers {
        for &kind in kinds {
            if kind == ScheduleKind::StaticEven {
                grid.push(ScheduleConfig::from_parts(kind, w, 0)?);
            } else {
                for &c in chunks {
                    grid.push(ScheduleConfig::from_parts(kind, w, c)?);
                }
            }
        }
    }
    Ok(grid)
}

pub fn run(args: &BenchArgs) -> Result<()> {
    if args.repeat == 0 {
        bail!("--repeat must be at least 1");
    }

    let workers = match &args.workers {
        Some(list) => parse_list::<i64>(list, "worker count")?,
        None => default_worker_counts(),
    };
    let kinds = parse_list::<ScheduleKind>(&args.schedules, "schedule")?;
    let chunks = match &args.chunks {
        Some(list) => parse_list::<i64>(list, "chunk size")?,
        None => DEFAULT_BENCH_CHUNKS.iter().map(|&c| c as i64).collect(),
    };
    let grid = build_grid(&workers, &kinds, &chunks)?;

    let image = read_pnm(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let label = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let sink: Arc<dyn MetricsSink> = match &args.csv {
        Some(path) => Arc::new(
            CsvMetricsSink::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Arc::new(NoopSink),
    };

    println!(
        "Benchmarking {} ({} samples): {} configurations x {} runs",
        label,
        image.buffer.len(),
        grid.len(),
        args.repeat
    );

    let pb = ProgressBar::new((grid.len() * args.repeat) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let mut rows = Vec::with_capacity(grid.len());
    for schedule in grid {
        let engine = StretchEngine::new(schedule)?.with_rounding(args.rounding);
        pb.set_message(schedule.to_string());

        let mut times = Vec::with_capacity(args.repeat);
        for _ in 0..args.repeat {
            let output = engine.stretch(image.buffer.clone(), args.coef)?;
            let elapsed_ms = output.report.elapsed_ms();
            sink.record(&MetricsRecord {
                label: label.clone(),
                workers: schedule.workers(),
                schedule: schedule.kind(),
                chunk_size: schedule.chunk_size(),
                elapsed_ms,
            })?;
            times.push(elapsed_ms);
            pb.inc(1);
        }

        let row = BenchRow::from_times(schedule, &times);
        debug!(
            schedule = %schedule,
            mean_ms = row.mean_ms,
            min_ms = row.min_ms,
            "Grid point done"
        );
        rows.push(row);
    }
    pb.finish_with_message("Done");

    print_bench_table(&rows);
    if let Some(path) = &args.csv {
        println!("\nMetrics saved to {}", path.display());
    }

    Ok(())
}
