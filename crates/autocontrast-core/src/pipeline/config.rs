use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compute::{BackendPreference, DeviceFilter, DeviceRequest};
use crate::consts::DEFAULT_COEFFICIENT;
use crate::rescale::RoundingMode;
use crate::schedule::ScheduleConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Fraction of samples ignored at each end (0.0..0.5).
    #[serde(default = "default_coefficient")]
    pub coefficient: f32,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub rounding: RoundingMode,
    /// Accelerator offload; absent means the host pool only.
    #[serde(default)]
    pub device: Option<DeviceConfig>,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

fn default_coefficient() -> f32 {
    DEFAULT_COEFFICIENT
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input.pnm"),
            output: PathBuf::from("output.pnm"),
            coefficient: DEFAULT_COEFFICIENT,
            schedule: ScheduleConfig::default(),
            rounding: RoundingMode::default(),
            device: None,
            metrics: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub backend: BackendPreference,
    #[serde(default)]
    pub filter: DeviceFilter,
    /// Index into the devices matching `filter`.
    #[serde(default)]
    pub index: usize,
}

impl DeviceConfig {
    pub fn request(&self) -> DeviceRequest {
        DeviceRequest {
            filter: self.filter,
            index: self.index,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Write one row per run to this semicolon-separated file.
    pub csv: Option<PathBuf>,
    /// Row label; defaults to the input file name.
    pub label: Option<String>,
}
