pub mod config;
mod scheduler;

pub use config::{default_workers, ScheduleConfig, ScheduleKind};
pub use scheduler::{even_range, ScheduleRange, WorkScheduler, WorkerClaims};
