mod common;

use autocontrast_core::histogram::{reduce, Histogram};
use autocontrast_core::pool::WorkerPool;
use autocontrast_core::schedule::{ScheduleConfig, WorkScheduler};
use autocontrast_core::ContrastError;

use common::{all_schedules, lcg_bytes};

// ---------------------------------------------------------------------------
// Sequential reference
// ---------------------------------------------------------------------------

#[test]
fn test_from_bytes_counts() {
    let hist = Histogram::from_bytes(&[0, 0, 7, 255, 7, 7]);
    assert_eq!(hist.count(0), 2);
    assert_eq!(hist.count(7), 3);
    assert_eq!(hist.count(255), 1);
    assert_eq!(hist.total(), 6);
    assert_eq!(hist.occupied(), 3);
}

#[test]
fn test_merge_adds_bin_by_bin() {
    let mut a = Histogram::from_bytes(&[1, 2, 2]);
    let b = Histogram::from_bytes(&[2, 3]);
    a.merge(b.bins());
    assert_eq!(a.count(1), 1);
    assert_eq!(a.count(2), 3);
    assert_eq!(a.count(3), 1);
    assert_eq!(a.total(), 5);
}

// ---------------------------------------------------------------------------
// Parallel reduction
// ---------------------------------------------------------------------------

#[test]
fn test_reduce_matches_sequential_for_every_schedule() {
    let bytes = lcg_bytes(100_003, 42);
    let expected = Histogram::from_bytes(&bytes);

    for workers in [1, 2, 4, 7] {
        let pool = WorkerPool::new(workers).unwrap();
        for config in all_schedules(workers) {
            let scheduler = WorkScheduler::new(bytes.len(), &config).unwrap();
            let hist = reduce(&bytes, &scheduler, &pool).unwrap();
            assert_eq!(hist, expected, "{config}");
            assert_eq!(hist.total(), bytes.len() as u64, "{config}");
        }
    }
}

#[test]
fn test_reduce_tiny_buffers() {
    for len in [1, 2, 3, 5] {
        let bytes = lcg_bytes(len, 7);
        let expected = Histogram::from_bytes(&bytes);
        let pool = WorkerPool::new(4).unwrap();
        for config in all_schedules(4) {
            let scheduler = WorkScheduler::new(len, &config).unwrap();
            assert_eq!(reduce(&bytes, &scheduler, &pool).unwrap(), expected, "{config} len={len}");
        }
    }
}

#[test]
fn test_reduce_empty_buffer() {
    let pool = WorkerPool::new(3).unwrap();
    let scheduler = WorkScheduler::new(0, &ScheduleConfig::StaticEven { workers: 3 }).unwrap();
    let hist = reduce(&[], &scheduler, &pool).unwrap();
    assert_eq!(hist.total(), 0);
    assert_eq!(hist.occupied(), 0);
}

#[test]
fn test_reduce_reuses_pool_across_calls() {
    let pool = WorkerPool::new(4).unwrap();
    let config = ScheduleConfig::Dynamic {
        workers: 4,
        chunk_size: 64,
    };
    for seed in 0..5 {
        let bytes = lcg_bytes(10_000, seed);
        let scheduler = WorkScheduler::new(bytes.len(), &config).unwrap();
        assert_eq!(
            reduce(&bytes, &scheduler, &pool).unwrap(),
            Histogram::from_bytes(&bytes)
        );
    }
}

#[test]
fn test_reduce_rejects_mismatched_scheduler() {
    let bytes = lcg_bytes(100, 1);
    let pool = WorkerPool::new(3).unwrap();

    let wrong_workers =
        WorkScheduler::new(bytes.len(), &ScheduleConfig::StaticEven { workers: 2 }).unwrap();
    assert!(matches!(
        reduce(&bytes, &wrong_workers, &pool),
        Err(ContrastError::InvalidSchedule(_))
    ));

    let wrong_len = WorkScheduler::new(50, &ScheduleConfig::StaticEven { workers: 3 }).unwrap();
    assert!(matches!(
        reduce(&bytes, &wrong_len, &pool),
        Err(ContrastError::InvalidSchedule(_))
    ));
}

#[test]
fn test_reduce_rejects_spent_dynamic_scheduler() {
    let bytes = lcg_bytes(1000, 4);
    let pool = WorkerPool::new(4).unwrap();
    let config = ScheduleConfig::Dynamic {
        workers: 4,
        chunk_size: 16,
    };
    let scheduler = WorkScheduler::new(bytes.len(), &config).unwrap();

    let first = reduce(&bytes, &scheduler, &pool).unwrap();
    assert_eq!(first.total(), 1000);
    assert!(matches!(
        reduce(&bytes, &scheduler, &pool),
        Err(ContrastError::InvalidSchedule(_))
    ));
}

#[test]
fn test_reduce_reuses_static_scheduler() {
    let bytes = lcg_bytes(1000, 4);
    let pool = WorkerPool::new(3).unwrap();
    for config in [
        ScheduleConfig::StaticEven { workers: 3 },
        ScheduleConfig::StaticChunked {
            workers: 3,
            chunk_size: 16,
        },
    ] {
        let scheduler = WorkScheduler::new(bytes.len(), &config).unwrap();
        let first = reduce(&bytes, &scheduler, &pool).unwrap();
        let second = reduce(&bytes, &scheduler, &pool).unwrap();
        assert_eq!(first, second, "{config}");
        assert_eq!(second.total(), 1000, "{config}");
    }
}

#[test]
fn test_reduce_uniform_buffer_has_one_bin() {
    let bytes = vec![77u8; 1000];
    let pool = WorkerPool::new(4).unwrap();
    for config in all_schedules(4) {
        let scheduler = WorkScheduler::new(bytes.len(), &config).unwrap();
        let hist = reduce(&bytes, &scheduler, &pool).unwrap();
        assert_eq!(hist.occupied(), 1, "{config}");
        assert_eq!(hist.count(77), 1000, "{config}");
    }
}
