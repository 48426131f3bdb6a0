mod common;

use std::sync::{Arc, Mutex};

use autocontrast_core::compute::cpu::CpuDeviceBackend;
use autocontrast_core::compute::{
    select_device, AcceleratorBackend, DeviceDescriptor, DeviceFilter, DeviceKind, DeviceRequest,
};
use autocontrast_core::histogram::{reduce, Histogram};
use autocontrast_core::pool::WorkerPool;
use autocontrast_core::pipeline::{ProgressReporter, StretchPhase};
use autocontrast_core::range::ClipResult;
use autocontrast_core::rescale::{LinearMap, RoundingMode};
use autocontrast_core::schedule::{ScheduleConfig, WorkScheduler};
use autocontrast_core::{stretch, ContrastError, PhaseRunner, PixelBuffer, StretchEngine};

use common::{all_schedules, banded_bytes, gray, lcg_bytes, rgb_ramp};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sequential() -> ScheduleConfig {
    ScheduleConfig::StaticEven { workers: 1 }
}

fn device(name: &str, kind: DeviceKind) -> DeviceDescriptor {
    DeviceDescriptor {
        name: name.to_string(),
        compute_units: 4,
        max_group_size: 256,
        kind,
    }
}

/// Backend whose kernels fail with a fixed error.
struct FailingBackend {
    error: fn() -> ContrastError,
}

impl AcceleratorBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn supports(&self, _filter: DeviceFilter, _index: usize) -> Option<DeviceDescriptor> {
        Some(device("flaky", DeviceKind::DiscreteGpu))
    }

    fn build_histogram(&self, _bytes: &[u8], _device: &DeviceDescriptor) -> Result<Histogram, ContrastError> {
        Err((self.error)())
    }

    fn apply_rescale(
        &self,
        _bytes: &mut [u8],
        _device: &DeviceDescriptor,
        _map: &LinearMap,
    ) -> Result<(), ContrastError> {
        Err((self.error)())
    }
}

/// Backend that counts on the host but loses its device before the rescale.
struct RescaleLostBackend;

impl AcceleratorBackend for RescaleLostBackend {
    fn name(&self) -> &str {
        "half"
    }

    fn supports(&self, _filter: DeviceFilter, _index: usize) -> Option<DeviceDescriptor> {
        Some(device("brittle", DeviceKind::IntegratedGpu))
    }

    fn build_histogram(&self, bytes: &[u8], _device: &DeviceDescriptor) -> Result<Histogram, ContrastError> {
        Ok(Histogram::from_bytes(bytes))
    }

    fn apply_rescale(
        &self,
        _bytes: &mut [u8],
        _device: &DeviceDescriptor,
        _map: &LinearMap,
    ) -> Result<(), ContrastError> {
        Err(ContrastError::DeviceUnavailable("reset".into()))
    }
}

#[derive(Default)]
struct RecordingReporter {
    phases: Mutex<Vec<StretchPhase>>,
    finished: Mutex<usize>,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, phase: StretchPhase, _total_items: Option<usize>) {
        self.phases.lock().unwrap().push(phase);
    }

    fn finish_stage(&self) {
        *self.finished.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// End-to-end behaviour
// ---------------------------------------------------------------------------

#[test]
fn test_worked_example() {
    let out = stretch(gray(vec![10, 20, 230, 240]), 0.0, &sequential()).unwrap();
    assert_eq!(out.buffer.as_bytes(), &[0, 11, 244, 255]);
    assert_eq!(out.report.clip, ClipResult { min_v: 10, max_v: 240 });
    assert_eq!(out.report.ignore_count, 0);
    assert!(out.report.rescaled());
}

#[test]
fn test_worked_example_truncate() {
    let engine = StretchEngine::new(sequential())
        .unwrap()
        .with_rounding(RoundingMode::Truncate);
    let out = engine.stretch(gray(vec![10, 20, 230, 240]), 0.0).unwrap();
    assert_eq!(out.buffer.as_bytes(), &[0, 11, 243, 254]);
}

#[test]
fn test_full_range_buffer_is_unchanged() {
    let mut samples = lcg_bytes(5000, 3);
    samples[0] = 0;
    samples[1] = 255;
    for config in all_schedules(3) {
        let out = stretch(gray(samples.clone()), 0.0, &config).unwrap();
        assert_eq!(out.buffer.as_bytes(), samples.as_slice(), "{config}");
        assert!(!out.report.rescaled());
    }
}

#[test]
fn test_stretch_is_idempotent() {
    let samples = banded_bytes(20_000, 60, 180, 11);
    let once = stretch(gray(samples), 0.0, &sequential()).unwrap();
    assert!(once.report.rescaled());
    let first = once.buffer.clone();

    let twice = stretch(once.buffer, 0.0, &sequential()).unwrap();
    assert!(!twice.report.rescaled());
    assert_eq!(twice.buffer, first);
}

#[test]
fn test_uniform_buffer_is_unchanged() {
    let config = ScheduleConfig::Dynamic {
        workers: 4,
        chunk_size: 16,
    };
    let pool = WorkerPool::new(4).unwrap();
    let scheduler = WorkScheduler::new(1000, &config).unwrap();
    let hist = reduce(&[77; 1000], &scheduler, &pool).unwrap();
    assert_eq!(hist.occupied(), 1);
    assert_eq!(hist.count(77), 1000);

    let out = stretch(gray(vec![77; 1000]), 0.1, &config).unwrap();
    assert_eq!(out.report.clip.min_v, 77);
    assert_eq!(out.report.clip.max_v, 77);
    assert!(out.buffer.as_bytes().iter().all(|&v| v == 77));
    assert!(!out.report.rescaled());
}

#[test]
fn test_single_sample_is_unchanged() {
    let out = stretch(gray(vec![42]), 0.01, &sequential()).unwrap();
    assert_eq!(out.buffer.as_bytes(), &[42]);
}

#[test]
fn test_empty_buffer() {
    let out = stretch(gray(Vec::new()), 0.01, &sequential()).unwrap();
    assert!(out.buffer.is_empty());
    assert_eq!(out.report.clip, ClipResult::default());
    assert!(!out.report.rescaled());
}

#[test]
fn test_clipping_ignores_outliers() {
    // 99 dark and 99 bright outliers around a 100..=150 band; 10_000 samples
    // at 1% ignore 100 from each end.
    let band = banded_bytes(9802, 100, 150, 5);
    let mut samples = band.clone();
    samples.extend(std::iter::repeat(0).take(99));
    samples.extend(std::iter::repeat(255).take(99));
    let out = stretch(gray(samples), 0.01, &sequential()).unwrap();

    assert_eq!(out.report.ignore_count, 100);
    assert_eq!(out.report.clip, ClipResult { min_v: 100, max_v: 150 });
    let hist = Histogram::from_bytes(out.buffer.as_bytes());
    let band_hist = Histogram::from_bytes(&band);
    assert_eq!(hist.count(0), 99 + band_hist.count(100));
    assert_eq!(hist.count(255), 99 + band_hist.count(150));
}

#[test]
fn test_every_schedule_gives_identical_output() {
    let samples = banded_bytes(123_457, 30, 220, 17);
    let expected = stretch(gray(samples.clone()), 0.02, &sequential()).unwrap();

    for workers in [1, 2, 4, 7] {
        let mut configs = all_schedules(workers);
        configs.push(ScheduleConfig::Dynamic {
            workers,
            chunk_size: 4096,
        });
        for config in configs {
            let engine = StretchEngine::new(config).unwrap();
            let out = engine.stretch(gray(samples.clone()), 0.02).unwrap();
            assert_eq!(out.buffer, expected.buffer, "{config}");
            assert_eq!(out.report.clip, expected.report.clip, "{config}");
        }
    }
}

#[test]
fn test_engine_reuse_across_calls() {
    let engine = StretchEngine::new(ScheduleConfig::Dynamic {
        workers: 4,
        chunk_size: 16,
    })
    .unwrap();
    for seed in 0..4 {
        let samples = banded_bytes(10_000, 20, 120, seed);
        let reference = stretch(gray(samples.clone()), 0.01, &sequential()).unwrap();
        let out = engine.stretch(gray(samples), 0.01).unwrap();
        assert_eq!(out.buffer, reference.buffer, "seed {seed}");
    }
}

#[test]
fn test_rgb_buffer_keeps_shape() {
    let buffer = rgb_ramp(64, 8);
    let out = stretch(buffer.clone(), 0.0, &ScheduleConfig::StaticEven { workers: 2 }).unwrap();
    assert_eq!(out.buffer.width(), 64);
    assert_eq!(out.buffer.height(), 8);
    assert_eq!(out.buffer.channels(), buffer.channels());
    assert_eq!(out.buffer.len(), buffer.len());
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_invalid_coefficient_rejected() {
    for coef in [0.5, -0.1, f32::NAN] {
        let err = stretch(gray(vec![1, 2, 3]), coef, &sequential()).unwrap_err();
        assert!(matches!(err, ContrastError::InvalidCoefficient(_)), "{coef}");
    }
}

#[test]
fn test_zero_workers_rejected() {
    let err = StretchEngine::new(ScheduleConfig::StaticEven { workers: 0 }).unwrap_err();
    assert!(matches!(err, ContrastError::InvalidSchedule(_)));
}

#[test]
fn test_pixel_buffer_dimension_mismatch() {
    let err = PixelBuffer::new(vec![0; 10], 3, 3, autocontrast_core::Channels::Gray).unwrap_err();
    assert!(matches!(err, ContrastError::InvalidDimensions { len: 10, .. }));
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

#[test]
fn test_reporter_sees_every_phase() {
    let engine = StretchEngine::new(sequential()).unwrap();
    let reporter = RecordingReporter::default();
    engine
        .stretch_reported(gray(vec![10, 20, 230, 240]), 0.0, &reporter)
        .unwrap();
    assert_eq!(
        *reporter.phases.lock().unwrap(),
        vec![
            StretchPhase::Histogram,
            StretchPhase::RangeSelection,
            StretchPhase::Rescale
        ]
    );
    assert_eq!(*reporter.finished.lock().unwrap(), 3);
}

#[test]
fn test_reporter_skips_rescale_when_unneeded() {
    let engine = StretchEngine::new(sequential()).unwrap();
    let reporter = RecordingReporter::default();
    engine
        .stretch_reported(gray(vec![5; 10]), 0.0, &reporter)
        .unwrap();
    assert_eq!(
        *reporter.phases.lock().unwrap(),
        vec![StretchPhase::Histogram, StretchPhase::RangeSelection]
    );
}

// ---------------------------------------------------------------------------
// Accelerator offload
// ---------------------------------------------------------------------------

#[test]
fn test_select_device_filters_and_indexes() {
    let devices = vec![
        device("igpu0", DeviceKind::IntegratedGpu),
        device("dgpu0", DeviceKind::DiscreteGpu),
        device("cpu0", DeviceKind::Cpu),
        device("dgpu1", DeviceKind::DiscreteGpu),
    ];
    let pick = |filter, index| select_device(&devices, filter, index).map(|d| d.name);

    assert_eq!(pick(DeviceFilter::Dgpu, 1).as_deref(), Some("dgpu1"));
    assert_eq!(pick(DeviceFilter::Gpu, 2).as_deref(), Some("dgpu1"));
    assert_eq!(pick(DeviceFilter::Cpu, 0).as_deref(), Some("cpu0"));
    assert_eq!(pick(DeviceFilter::All, 0).as_deref(), Some("igpu0"));
    // Past the end of the filtered list: first match.
    assert_eq!(pick(DeviceFilter::Dgpu, 9).as_deref(), Some("dgpu0"));
    assert_eq!(select_device(&devices[2..3], DeviceFilter::Gpu, 0), None);
}

#[test]
fn test_cpu_device_matches_host_path() {
    let samples = banded_bytes(50_001, 25, 200, 23);
    let host = stretch(gray(samples.clone()), 0.01, &sequential()).unwrap();

    let engine = StretchEngine::new(sequential())
        .unwrap()
        .with_accelerator(Arc::new(CpuDeviceBackend::new()), DeviceRequest::default());
    let out = engine.stretch(gray(samples), 0.01).unwrap();

    assert_eq!(out.buffer, host.buffer);
    assert_eq!(out.report.clip, host.report.clip);
    assert!(out.report.executor.starts_with("CPU/Rayon"), "{}", out.report.executor);
    assert_eq!(out.report.histogram_runner, PhaseRunner::Device);
    assert_eq!(out.report.rescale_runner, Some(PhaseRunner::Device));
}

#[test]
fn test_cpu_device_histogram_matches_sequential() {
    let backend = CpuDeviceBackend::new();
    let device = backend.supports(DeviceFilter::Cpu, 0).unwrap();
    for len in [0, 1, 3, 1000, 77_777] {
        let bytes = lcg_bytes(len, len as u64);
        assert_eq!(
            backend.build_histogram(&bytes, &device).unwrap(),
            Histogram::from_bytes(&bytes),
            "len={len}"
        );
    }
}

#[test]
fn test_unmatched_filter_falls_back_to_host() {
    let request = DeviceRequest {
        filter: DeviceFilter::Dgpu,
        index: 0,
    };
    let engine = StretchEngine::new(sequential())
        .unwrap()
        .with_accelerator(Arc::new(CpuDeviceBackend::new()), request);
    let out = engine.stretch(gray(vec![10, 20, 230, 240]), 0.0).unwrap();

    assert_eq!(out.buffer.as_bytes(), &[0, 11, 244, 255]);
    assert!(out.report.executor.starts_with("host pool"), "{}", out.report.executor);
}

#[test]
fn test_lost_device_falls_back_to_host() {
    let backend = FailingBackend {
        error: || ContrastError::DeviceUnavailable("unplugged".into()),
    };
    let engine = StretchEngine::new(sequential())
        .unwrap()
        .with_accelerator(Arc::new(backend), DeviceRequest::default());
    let out = engine.stretch(gray(vec![10, 20, 230, 240]), 0.0).unwrap();
    assert_eq!(out.buffer.as_bytes(), &[0, 11, 244, 255]);
    assert_eq!(out.report.histogram_runner, PhaseRunner::Host);
    assert_eq!(out.report.rescale_runner, Some(PhaseRunner::Host));
    assert!(out.report.executor.starts_with("host pool"), "{}", out.report.executor);
}

#[test]
fn test_device_lost_before_rescale_reports_both_paths() {
    let engine = StretchEngine::new(sequential())
        .unwrap()
        .with_accelerator(Arc::new(RescaleLostBackend), DeviceRequest::default());
    let out = engine.stretch(gray(vec![10, 20, 230, 240]), 0.0).unwrap();

    assert_eq!(out.buffer.as_bytes(), &[0, 11, 244, 255]);
    assert_eq!(out.report.histogram_runner, PhaseRunner::Device);
    assert_eq!(out.report.rescale_runner, Some(PhaseRunner::Host));
    assert!(out.report.executor.starts_with("half (brittle"), "{}", out.report.executor);
    assert!(out.report.executor.contains("rescale on host pool"), "{}", out.report.executor);
}

#[test]
fn test_skipped_rescale_has_no_runner() {
    let out = stretch(gray(vec![0, 128, 255]), 0.0, &sequential()).unwrap();
    assert_eq!(out.report.histogram_runner, PhaseRunner::Host);
    assert_eq!(out.report.rescale_runner, None);
}

#[test]
fn test_device_kernel_error_is_returned() {
    let backend = FailingBackend {
        error: || ContrastError::Gpu("kernel fault".into()),
    };
    let engine = StretchEngine::new(sequential())
        .unwrap()
        .with_accelerator(Arc::new(backend), DeviceRequest::default());
    let err = engine.stretch(gray(vec![10, 20, 230, 240]), 0.0).unwrap_err();
    assert!(matches!(err, ContrastError::Gpu(_)));
}
