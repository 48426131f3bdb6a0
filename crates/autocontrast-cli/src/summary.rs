use autocontrast_core::pipeline::config::BenchmarkConfig;
use autocontrast_core::pipeline::RunSummary;
use autocontrast_core::schedule::ScheduleConfig;
use console::Style;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn ms(d: std::time::Duration) -> String {
    format!("{:.3} ms", d.as_secs_f64() * 1000.0)
}

pub fn print_run_summary(config: &BenchmarkConfig, engine_label: &str) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Autocontrast"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(12)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Engine"),
        s.method.apply_to(engine_label)
    );
    println!();

    println!("  {}", s.header.apply_to("Stretch"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Clip"),
        s.value.apply_to(format!("{:.2}% per side", config.coefficient * 100.0))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Schedule"),
        s.method.apply_to(&config.schedule)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Rounding"),
        s.method.apply_to(config.rounding)
    );
    match config.metrics.as_ref().and_then(|m| m.csv.as_ref()) {
        Some(csv) => println!(
            "    {:<12}{}",
            s.label.apply_to("Metrics"),
            s.path.apply_to(csv.display())
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Metrics"),
            s.disabled.apply_to("disabled")
        ),
    }
    println!();
}

pub fn print_run_report(summary: &RunSummary) {
    let s = Styles::new();
    let report = &summary.report;

    println!();
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Image"),
        s.value.apply_to(format!(
            "{} {}x{}",
            summary.header.format, summary.header.width, summary.header.height
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Ignored"),
        s.value.apply_to(format!("{} samples per side", report.ignore_count))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Range"),
        s.value
            .apply_to(format!("[{}, {}]", report.clip.min_v, report.clip.max_v))
    );
    match &report.map {
        Some(map) => println!(
            "    {:<12}{}",
            s.label.apply_to("Map"),
            s.value.apply_to(format!(
                "v * {:.4} - {:.4} ({})",
                map.scale, map.offset, map.rounding
            ))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Map"),
            s.disabled.apply_to("skipped, image unchanged")
        ),
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Executor"),
        s.method.apply_to(&report.executor)
    );
    println!();

    println!("  {}", s.header.apply_to("Timings"));
    let rows = [
        ("Read", summary.read),
        ("Histogram", report.timings.histogram),
        ("Selection", report.timings.selection),
        ("Rescale", report.timings.rescale),
        ("Write", summary.write),
    ];
    for (label, d) in rows {
        println!("    {:<12}{}", s.label.apply_to(label), s.value.apply_to(ms(d)));
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Stretch"),
        s.value.apply_to(format!("{:.3} ms", report.elapsed_ms()))
    );
}

/// Aggregated timings for one grid point of a benchmark.
pub struct BenchRow {
    pub schedule: ScheduleConfig,
    pub mean_ms: f64,
    pub min_ms: f64,
}

impl BenchRow {
    pub fn from_times(schedule: ScheduleConfig, times: &[f64]) -> Self {
        let mean_ms = times.iter().sum::<f64>() / times.len().max(1) as f64;
        let min_ms = times.iter().copied().fold(f64::INFINITY, f64::min);
        Self {
            schedule,
            mean_ms,
            min_ms,
        }
    }
}

pub fn print_bench_table(rows: &[BenchRow]) {
    let s = Styles::new();
    let best = rows.iter().map(|r| r.mean_ms).fold(f64::INFINITY, f64::min);

    println!();
    println!(
        "  {}",
        s.header.apply_to(format!(
            "{:<8}{:<16}{:>8}{:>12}{:>12}",
            "Workers", "Schedule", "Chunk", "Mean ms", "Min ms"
        ))
    );
    for row in rows {
        let line = format!(
            "{:<8}{:<16}{:>8}{:>12.3}{:>12.3}",
            row.schedule.workers(),
            row.schedule.kind().to_string(),
            row.schedule.chunk_size(),
            row.mean_ms,
            row.min_ms
        );
        if row.mean_ms == best {
            println!("  {}", s.method.apply_to(line));
        } else {
            println!("  {}", s.value.apply_to(line));
        }
    }
}
