//! Offload of the histogram and rescale phases to a compute device.
//!
//! A backend advertises devices through [`AcceleratorBackend::supports`];
//! when no device matches the requested filter the engine runs the host
//! worker pool instead.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod wgpu_backend;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::histogram::Histogram;
use crate::rescale::LinearMap;

/// Broad class of a compute device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Cpu,
    IntegratedGpu,
    DiscreteGpu,
    Other,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::IntegratedGpu => write!(f, "Integrated GPU"),
            Self::DiscreteGpu => write!(f, "Discrete GPU"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Read-only snapshot of a device, taken once per stretch call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub compute_units: u32,
    pub max_group_size: usize,
    pub kind: DeviceKind,
}

/// Which devices a caller is willing to run on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFilter {
    /// Discrete GPUs only.
    Dgpu,
    /// Integrated GPUs only.
    Igpu,
    /// Any GPU.
    Gpu,
    Cpu,
    #[default]
    All,
}

impl DeviceFilter {
    pub fn matches(self, kind: DeviceKind) -> bool {
        match self {
            Self::Dgpu => kind == DeviceKind::DiscreteGpu,
            Self::Igpu => kind == DeviceKind::IntegratedGpu,
            Self::Gpu => matches!(kind, DeviceKind::DiscreteGpu | DeviceKind::IntegratedGpu),
            Self::Cpu => kind == DeviceKind::Cpu,
            Self::All => true,
        }
    }
}

impl std::fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dgpu => write!(f, "dgpu"),
            Self::Igpu => write!(f, "igpu"),
            Self::Gpu => write!(f, "gpu"),
            Self::Cpu => write!(f, "cpu"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for DeviceFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dgpu" => Ok(Self::Dgpu),
            "igpu" => Ok(Self::Igpu),
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown device kind '{other}' (expected dgpu, igpu, gpu, cpu or all)"
            )),
        }
    }
}

/// Device filter plus an index into the filtered list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequest {
    #[serde(default)]
    pub filter: DeviceFilter,
    #[serde(default)]
    pub index: usize,
}

/// Pick the `index`-th device matching `filter`. An index past the end of
/// the filtered list selects its first entry; an empty list selects nothing.
pub fn select_device(
    devices: &[DeviceDescriptor],
    filter: DeviceFilter,
    index: usize,
) -> Option<DeviceDescriptor> {
    let filtered: Vec<&DeviceDescriptor> =
        devices.iter().filter(|d| filter.matches(d.kind)).collect();
    filtered
        .get(index)
        .or_else(|| filtered.first())
        .map(|d| (*d).clone())
}

/// Alternate implementation of the histogram and rescale phases.
///
/// Results must match the host path exactly: the histogram bin for bin, and
/// the rescaled bytes byte for byte.
pub trait AcceleratorBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// The `index`-th device of this backend matching `filter`, if any.
    fn supports(&self, filter: DeviceFilter, index: usize) -> Option<DeviceDescriptor>;

    /// Count every byte of `bytes` on `device`.
    fn build_histogram(&self, bytes: &[u8], device: &DeviceDescriptor) -> Result<Histogram>;

    /// Apply `map` to every byte of `bytes` on `device`, in place.
    fn apply_rescale(
        &self,
        bytes: &mut [u8],
        device: &DeviceDescriptor,
        map: &LinearMap,
    ) -> Result<()>;
}

/// Which accelerator backend to try.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// The GPU backend when compiled in and initialisable, else the CPU device.
    #[default]
    Auto,
    Cpu,
    #[cfg(feature = "gpu")]
    Gpu,
}

impl std::fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::Cpu => write!(f, "CPU"),
            #[cfg(feature = "gpu")]
            Self::Gpu => write!(f, "GPU"),
        }
    }
}

/// Create the accelerator backend for `preference`, falling back to the CPU
/// device backend when a GPU cannot be initialised.
pub fn create_backend(preference: &BackendPreference) -> Arc<dyn AcceleratorBackend> {
    match preference {
        BackendPreference::Cpu => Arc::new(cpu::CpuDeviceBackend::new()),
        BackendPreference::Auto => auto_backend(),
        #[cfg(feature = "gpu")]
        BackendPreference::Gpu => auto_backend(),
    }
}

#[cfg(feature = "gpu")]
fn auto_backend() -> Arc<dyn AcceleratorBackend> {
    match wgpu_backend::WgpuBackend::new() {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            tracing::warn!("GPU backend unavailable, using CPU device: {e}");
            Arc::new(cpu::CpuDeviceBackend::new())
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn auto_backend() -> Arc<dyn AcceleratorBackend> {
    Arc::new(cpu::CpuDeviceBackend::new())
}
