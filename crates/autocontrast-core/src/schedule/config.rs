use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ContrastError, Result};

/// Scheduling discipline, without its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleKind {
    StaticEven,
    StaticChunked,
    Dynamic,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaticEven => write!(f, "static"),
            Self::StaticChunked => write!(f, "static-chunked"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl FromStr for ScheduleKind {
    type Err = ContrastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" | "static-even" | "even" => Ok(Self::StaticEven),
            "static-chunked" | "chunked" => Ok(Self::StaticChunked),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(ContrastError::InvalidSchedule(format!(
                "unknown schedule kind '{other}' (expected static, static-chunked or dynamic)"
            ))),
        }
    }
}

/// How the index range of one phase is split among workers.
///
/// `chunk_size == 0` means unit chunks for both chunked policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ScheduleConfig {
    /// One contiguous slice per worker.
    StaticEven { workers: usize },
    /// Fixed-size chunks dealt round-robin.
    StaticChunked { workers: usize, chunk_size: usize },
    /// Chunks claimed at runtime from a shared cursor.
    Dynamic { workers: usize, chunk_size: usize },
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::StaticEven {
            workers: default_workers(),
        }
    }
}

/// Worker count used when none is configured: rayon's global pool size.
pub fn default_workers() -> usize {
    rayon::current_num_threads().max(1)
}

impl ScheduleConfig {
    /// Build a config from loosely typed parts, as they arrive from the
    /// command line. Zero workers and negative chunk sizes are rejected.
    pub fn from_parts(kind: ScheduleKind, workers: i64, chunk_size: i64) -> Result<Self> {
        if workers <= 0 {
            return Err(ContrastError::InvalidSchedule(format!(
                "worker count must be positive, got {workers}"
            )));
        }
        if chunk_size < 0 {
            return Err(ContrastError::InvalidSchedule(format!(
                "chunk size must not be negative, got {chunk_size}"
            )));
        }
        let workers = usize::try_from(workers)
            .map_err(|_| ContrastError::InvalidSchedule(format!("too many workers: {workers}")))?;
        let chunk_size = usize::try_from(chunk_size).map_err(|_| {
            ContrastError::InvalidSchedule(format!("chunk size too large: {chunk_size}"))
        })?;
        Ok(match kind {
            ScheduleKind::StaticEven => Self::StaticEven { workers },
            ScheduleKind::StaticChunked => Self::StaticChunked {
                workers,
                chunk_size,
            },
            ScheduleKind::Dynamic => Self::Dynamic {
                workers,
                chunk_size,
            },
        })
    }

    /// Parse a schedule string: `static`, `static,16`,
    /// `static-chunked`, `dynamic` or `dynamic,16`.
    ///
    /// A chunk size after `static` selects round-robin striping.
    pub fn parse(text: &str, workers: i64) -> Result<Self> {
        let (kind_str, chunk_str) = match text.split_once(',') {
            Some((k, c)) => (k, Some(c)),
            None => (text, None),
        };
        let mut kind: ScheduleKind = kind_str.parse()?;
        let chunk_size = match chunk_str {
            Some(c) => {
                let c = c.trim();
                c.parse::<i64>().map_err(|_| {
                    ContrastError::InvalidSchedule(format!("invalid chunk size '{c}'"))
                })?
            }
            None => 0,
        };
        if kind == ScheduleKind::StaticEven && chunk_str.is_some() {
            kind = ScheduleKind::StaticChunked;
        }
        Self::from_parts(kind, workers, chunk_size)
    }

    pub fn kind(&self) -> ScheduleKind {
        match self {
            Self::StaticEven { .. } => ScheduleKind::StaticEven,
            Self::StaticChunked { .. } => ScheduleKind::StaticChunked,
            Self::Dynamic { .. } => ScheduleKind::Dynamic,
        }
    }

    pub fn workers(&self) -> usize {
        match *self {
            Self::StaticEven { workers }
            | Self::StaticChunked { workers, .. }
            | Self::Dynamic { workers, .. } => workers,
        }
    }

    /// Configured chunk size; 0 for the even split.
    pub fn chunk_size(&self) -> usize {
        match *self {
            Self::StaticEven { .. } => 0,
            Self::StaticChunked { chunk_size, .. } | Self::Dynamic { chunk_size, .. } => {
                chunk_size
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers() == 0 {
            return Err(ContrastError::InvalidSchedule(
                "worker count must be positive, got 0".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for ScheduleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaticEven { workers } => write!(f, "static ({workers} workers)"),
            Self::StaticChunked {
                workers,
                chunk_size,
            }
            | Self::Dynamic {
                workers,
                chunk_size,
            } => write!(
                f,
                "{},{} ({workers} workers)",
                self.kind(),
                chunk_size
            ),
        }
    }
}
