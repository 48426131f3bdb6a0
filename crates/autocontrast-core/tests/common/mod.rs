#![allow(dead_code)]

use std::path::{Path, PathBuf};

use autocontrast_core::schedule::ScheduleConfig;
use autocontrast_core::{Channels, PixelBuffer};

/// Deterministic pseudo-random bytes (64-bit LCG, high byte of the state).
pub fn lcg_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

/// Bytes confined to `[lo, hi]`, spread pseudo-randomly.
pub fn banded_bytes(len: usize, lo: u8, hi: u8, seed: u64) -> Vec<u8> {
    let span = u16::from(hi - lo) + 1;
    lcg_bytes(len, seed)
        .into_iter()
        .map(|v| lo + (u16::from(v) % span) as u8)
        .collect()
}

/// Single-row grayscale buffer.
pub fn gray(samples: Vec<u8>) -> PixelBuffer {
    PixelBuffer::from_samples(samples).unwrap()
}

/// `width x height` RGB buffer with a horizontal ramp in every channel.
pub fn rgb_ramp(width: u32, height: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for _ in 0..height {
        for x in 0..width {
            let v = (x * 255 / width.max(1)) as u8;
            data.extend_from_slice(&[v, v / 2, 255 - v]);
        }
    }
    PixelBuffer::new(data, width, height, Channels::Rgb).unwrap()
}

/// Every policy for `workers`, with the chunk sizes the tests sweep.
pub fn all_schedules(workers: usize) -> Vec<ScheduleConfig> {
    let mut configs = vec![ScheduleConfig::StaticEven { workers }];
    for chunk_size in [0, 1, 16, 1000] {
        configs.push(ScheduleConfig::StaticChunked {
            workers,
            chunk_size,
        });
        configs.push(ScheduleConfig::Dynamic {
            workers,
            chunk_size,
        });
    }
    configs
}

/// Raw PNM file bytes: header followed by `payload`.
pub fn pnm_bytes(code: u8, width: u32, height: u32, max_value: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = format!("P{code}\n{width} {height}\n{max_value}\n").into_bytes();
    bytes.extend_from_slice(payload);
    bytes
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
