use serde::{Deserialize, Serialize};

use crate::error::{ContrastError, Result};

/// Samples per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channels {
    Gray,
    Rgb,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }

    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Self::Gray),
            3 => Some(Self::Rgb),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gray => write!(f, "Gray"),
            Self::Rgb => write!(f, "RGB"),
        }
    }
}

/// Interleaved 8-bit image samples, row-major.
///
/// The byte count always equals `width * height * channels`; the buffer is
/// rescaled in place and never resized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: Channels,
}

impl PixelBuffer {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: Channels) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(channels.count()));
        if expected != Some(data.len()) {
            return Err(ContrastError::InvalidDimensions {
                width,
                height,
                channels: channels.count(),
                len: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// A single-row grayscale buffer holding `samples`.
    pub fn from_samples(samples: Vec<u8>) -> Result<Self> {
        let width = u32::try_from(samples.len()).map_err(|_| ContrastError::InvalidDimensions {
            width: u32::MAX,
            height: 1,
            channels: 1,
            len: samples.len(),
        })?;
        let height = if width == 0 { 0 } else { 1 };
        Self::new(samples, width, height, Channels::Gray)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
