/// Number of intensity bins: one per possible byte value.
pub const HISTOGRAM_BINS: usize = 256;

/// Largest sample value, and the top of the output range.
pub const MAX_INTENSITY: u8 = 255;

/// Default fraction of samples ignored at each end of the histogram.
pub const DEFAULT_COEFFICIENT: f32 = 0.01;

/// Exclusive upper bound for the clipping coefficient. At 0.5 the dark and
/// bright tails would cover the whole image.
pub const MAX_COEFFICIENT: f32 = 0.5;

/// Largest PNM maxval representable with one byte per sample.
pub const PNM_MAX_VALUE: u16 = 255;

/// Chunk sizes swept by the benchmark when none are given.
pub const DEFAULT_BENCH_CHUNKS: [usize; 3] = [0, 16, 1000];

/// Header row written by the CSV metrics sink.
pub const CSV_HEADER: &str = "FILE;WORKERS;SCHEDULE;CHUNK_SIZE;TIME";

/// Invocations per workgroup in the wgpu kernels (must match the WGSL sources).
pub const GPU_WORKGROUP_SIZE: u32 = 256;

/// Upper bound on workgroups along one dispatch dimension.
pub const GPU_MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

/// Private 256-bin slices per histogram dispatch on a GPU. wgpu does not
/// report compute-unit counts, so a fixed number stands in for them.
pub const GPU_HISTOGRAM_COPIES: u32 = 16;
