use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use autocontrast_core::compute::{BackendPreference, DeviceFilter};
use autocontrast_core::consts::DEFAULT_COEFFICIENT;
use autocontrast_core::pipeline::config::{BenchmarkConfig, DeviceConfig, MetricsConfig};
use autocontrast_core::pipeline::{metrics_sink, run_file_reported, ProgressReporter, StretchPhase};
use autocontrast_core::rescale::RoundingMode;
use autocontrast_core::schedule::{default_workers, ScheduleConfig};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::summary::{print_run_report, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Input PNM file (P5 or P6)
    pub file: PathBuf,

    /// Output file path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Run config file (TOML); command-line paths override its input and output
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Fraction of samples ignored at each end, in [0, 0.5)
    #[arg(long, default_value_t = DEFAULT_COEFFICIENT)]
    pub coef: f32,

    /// Schedule: static, static-chunked or dynamic, optionally with ",CHUNK"
    #[arg(long, default_value = "static")]
    pub schedule: String,

    /// Worker threads (defaults to the number of logical CPUs)
    #[arg(long, allow_hyphen_values = true)]
    pub workers: Option<i64>,

    /// Chunk size for the chunked schedules (0 = one sample per chunk)
    #[arg(long, allow_hyphen_values = true)]
    pub chunk: Option<i64>,

    /// Single worker, even split
    #[arg(long, conflicts_with_all = ["workers", "chunk"])]
    pub sequential: bool,

    /// How scaled values are rounded: nearest or truncate
    #[arg(long, default_value = "nearest")]
    pub rounding: RoundingMode,

    /// Offload to a device of this kind: dgpu, igpu, gpu, cpu or all
    #[arg(long)]
    pub device: Option<DeviceFilter>,

    /// Index into the devices matching --device
    #[arg(long, default_value = "0", requires = "device")]
    pub device_index: usize,

    /// Write the run time to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Label for the CSV row (defaults to the input file name)
    #[arg(long, requires = "csv")]
    pub label: Option<String>,
}

/// Phase names on a progress bar, one fifth per phase.
struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, phase: StretchPhase, _total_items: Option<usize>) {
        self.bar.set_message(phase.to_string());
    }

    fn finish_stage(&self) {
        self.bar.inc(20);
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        let mut config: BenchmarkConfig =
            toml::from_str(&contents).context("Invalid run config")?;
        config.input = args.file.clone();
        config.output = args.output.clone();
        config
    } else {
        build_config_from_args(args)?
    };

    let engine_label = match &config.device {
        Some(device) => format!("{} ({})", device.backend, device.filter),
        None => "host pool".to_string(),
    };
    print_run_summary(&config, &engine_label);

    let sink = metrics_sink(&config)?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}%")?
            .progress_chars("=> "),
    );
    let reporter = Arc::new(BarReporter { bar: pb.clone() });

    let summary = run_file_reported(&config, sink.as_ref(), reporter)
        .with_context(|| format!("Failed to stretch {}", config.input.display()))?;

    pb.set_position(100);
    pb.finish_with_message("Done");
    print_run_report(&summary);
    println!("\nOutput saved to {}", config.output.display());

    Ok(())
}

fn build_config_from_args(args: &RunArgs) -> Result<BenchmarkConfig> {
    let schedule = if args.sequential {
        ScheduleConfig::StaticEven { workers: 1 }
    } else {
        let workers = args.workers.unwrap_or(default_workers() as i64);
        let schedule_str = match args.chunk {
            Some(chunk) => {
                if args.schedule.contains(',') {
                    bail!("--chunk given twice: in --schedule '{}' and --chunk", args.schedule);
                }
                format!("{},{chunk}", args.schedule)
            }
            None => args.schedule.clone(),
        };
        ScheduleConfig::parse(&schedule_str, workers)?
    };

    let device = args.device.map(|filter| DeviceConfig {
        backend: BackendPreference::Auto,
        filter,
        index: args.device_index,
    });

    let metrics = args.csv.as_ref().map(|csv| MetricsConfig {
        csv: Some(csv.clone()),
        label: args.label.clone(),
    });

    Ok(BenchmarkConfig {
        input: args.file.clone(),
        output: args.output.clone(),
        coefficient: args.coef,
        schedule,
        rounding: args.rounding,
        device,
        metrics,
    })
}
