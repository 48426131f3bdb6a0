pub mod buffer;
pub mod compute;
pub mod consts;
pub mod engine;
pub mod error;
pub mod histogram;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod range;
pub mod rescale;
pub mod schedule;

pub use buffer::{Channels, PixelBuffer};
pub use engine::{stretch, PhaseRunner, StretchEngine, StretchOutput, StretchReport};
pub use error::{ContrastError, Result};
