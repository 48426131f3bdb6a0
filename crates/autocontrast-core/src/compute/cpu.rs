use rayon::prelude::*;

use crate::consts::HISTOGRAM_BINS;
use crate::error::{ContrastError, Result};
use crate::histogram::Histogram;
use crate::rescale::LinearMap;

use super::{select_device, AcceleratorBackend, DeviceDescriptor, DeviceFilter, DeviceKind};

/// Host processor exposed as a compute device, backed by the global Rayon pool.
///
/// The histogram kernel keeps one 256-bin slice per compute unit and sums
/// them at the end, the same layout the GPU kernel uses.
pub struct CpuDeviceBackend {
    device: DeviceDescriptor,
}

impl Default for CpuDeviceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuDeviceBackend {
    pub fn new() -> Self {
        let units = rayon::current_num_threads().max(1);
        Self {
            device: DeviceDescriptor {
                name: format!("host ({units} threads)"),
                compute_units: u32::try_from(units).unwrap_or(u32::MAX),
                max_group_size: 1,
                kind: DeviceKind::Cpu,
            },
        }
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    fn check(&self, device: &DeviceDescriptor) -> Result<()> {
        if device.kind != DeviceKind::Cpu {
            return Err(ContrastError::DeviceUnavailable(format!(
                "{} is not served by the CPU backend",
                device.name
            )));
        }
        Ok(())
    }
}

/// Bytes per compute unit, rounded up so every byte lands in some slice.
fn slice_len(len: usize, units: u32) -> usize {
    len.div_ceil(units.max(1) as usize).max(1)
}

impl AcceleratorBackend for CpuDeviceBackend {
    fn name(&self) -> &str {
        "CPU/Rayon"
    }

    fn supports(&self, filter: DeviceFilter, index: usize) -> Option<DeviceDescriptor> {
        select_device(std::slice::from_ref(&self.device), filter, index)
    }

    fn build_histogram(&self, bytes: &[u8], device: &DeviceDescriptor) -> Result<Histogram> {
        self.check(device)?;
        let units = device.compute_units.max(1) as usize;
        let mut partials = vec![0u64; HISTOGRAM_BINS * units];

        partials
            .par_chunks_mut(HISTOGRAM_BINS)
            .zip(bytes.par_chunks(slice_len(bytes.len(), device.compute_units)))
            .for_each(|(bins, chunk)| {
                for &v in chunk {
                    bins[v as usize] += 1;
                }
            });

        let mut hist = Histogram::new();
        for bins in partials.chunks_exact(HISTOGRAM_BINS) {
            let mut table = [0u64; HISTOGRAM_BINS];
            table.copy_from_slice(bins);
            hist.merge(&table);
        }
        Ok(hist)
    }

    fn apply_rescale(
        &self,
        bytes: &mut [u8],
        device: &DeviceDescriptor,
        map: &LinearMap,
    ) -> Result<()> {
        self.check(device)?;
        let lut = map.lookup_table();
        let len = slice_len(bytes.len(), device.compute_units);
        bytes.par_chunks_mut(len).for_each(|chunk| {
            for v in chunk {
                *v = lut[*v as usize];
            }
        });
        Ok(())
    }
}
