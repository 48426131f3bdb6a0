use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::buffer::{Channels, PixelBuffer};
use crate::consts::PNM_MAX_VALUE;
use crate::error::{ContrastError, Result};

/// Binary PNM variants with one byte per sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PnmFormat {
    /// `P5`, one channel.
    Graymap,
    /// `P6`, three interleaved channels.
    Pixmap,
}

impl PnmFormat {
    pub fn code(self) -> u8 {
        match self {
            Self::Graymap => 5,
            Self::Pixmap => 6,
        }
    }

    pub fn channels(self) -> Channels {
        match self {
            Self::Graymap => Channels::Gray,
            Self::Pixmap => Channels::Rgb,
        }
    }

    pub fn from_channels(channels: Channels) -> Self {
        match channels {
            Channels::Gray => Self::Graymap,
            Channels::Rgb => Self::Pixmap,
        }
    }
}

impl std::fmt::Display for PnmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PnmHeader {
    pub format: PnmFormat,
    pub width: u32,
    pub height: u32,
    pub max_value: u16,
}

impl PnmHeader {
    /// Payload size in bytes, or `None` if it overflows `usize`.
    pub fn data_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.format.channels().count())
    }
}

/// A decoded image plus the maxval it was stored with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PnmImage {
    pub max_value: u16,
    pub buffer: PixelBuffer,
}

impl PnmImage {
    pub fn new(buffer: PixelBuffer) -> Self {
        Self {
            max_value: PNM_MAX_VALUE,
            buffer,
        }
    }

    pub fn header(&self) -> PnmHeader {
        PnmHeader {
            format: PnmFormat::from_channels(self.buffer.channels()),
            width: self.buffer.width(),
            height: self.buffer.height(),
            max_value: self.max_value,
        }
    }
}

/// Walks the ASCII header one whitespace-separated token at a time.
struct HeaderCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HeaderCursor<'a> {
    /// Skip whitespace and `#` comments running to end of line.
    fn skip_blank(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'#' {
                while let Some(&c) = self.bytes.get(self.pos) {
                    self.pos += 1;
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self, what: &str) -> Result<&'a [u8]> {
        self.skip_blank();
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'#')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(ContrastError::Format(format!("missing {what}")));
        }
        Ok(&self.bytes[start..self.pos])
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.token(what)?;
        std::str::from_utf8(token)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                ContrastError::Format(format!(
                    "invalid {what} '{}'",
                    String::from_utf8_lossy(token)
                ))
            })
    }
}

/// Parse the header and return it with the offset of the first payload byte.
pub fn read_header(bytes: &[u8]) -> Result<(PnmHeader, usize)> {
    match bytes.first() {
        Some(b'P') => {}
        _ => return Err(ContrastError::Format("missing 'P' magic".into())),
    }
    let format = match bytes.get(1) {
        Some(b'5') => PnmFormat::Graymap,
        Some(b'6') => PnmFormat::Pixmap,
        Some(&c) => {
            return Err(ContrastError::Format(format!(
                "unsupported format 'P{}'",
                c as char
            )))
        }
        None => return Err(ContrastError::Format("missing format code".into())),
    };

    let mut cursor = HeaderCursor { bytes, pos: 2 };
    if !cursor.bytes.get(cursor.pos).is_some_and(u8::is_ascii_whitespace) {
        return Err(ContrastError::Format("malformed magic number".into()));
    }
    let width: u32 = cursor.number("width")?;
    let height: u32 = cursor.number("height")?;
    let max_value: u16 = cursor.number("maxval")?;
    if !(1..=PNM_MAX_VALUE).contains(&max_value) {
        return Err(ContrastError::Format(format!(
            "maxval {max_value} outside 1..={PNM_MAX_VALUE}"
        )));
    }

    // Exactly one whitespace byte separates the header from the payload.
    match cursor.bytes.get(cursor.pos) {
        Some(b) if b.is_ascii_whitespace() => cursor.pos += 1,
        Some(_) => {
            return Err(ContrastError::Format(
                "expected whitespace after maxval".into(),
            ))
        }
        None => {}
    }

    Ok((
        PnmHeader {
            format,
            width,
            height,
            max_value,
        },
        cursor.pos,
    ))
}

/// Decode a complete P5/P6 file held in memory. Bytes past the payload are
/// ignored.
pub fn decode_pnm(bytes: &[u8]) -> Result<PnmImage> {
    let (header, offset) = read_header(bytes)?;
    let expected = header.data_len().ok_or_else(|| {
        ContrastError::Format(format!(
            "image {}x{} too large",
            header.width, header.height
        ))
    })?;
    let payload = &bytes[offset..];
    if payload.len() < expected {
        return Err(ContrastError::TruncatedData {
            expected,
            actual: payload.len(),
        });
    }

    let buffer = PixelBuffer::new(
        payload[..expected].to_vec(),
        header.width,
        header.height,
        header.format.channels(),
    )?;
    Ok(PnmImage {
        max_value: header.max_value,
        buffer,
    })
}

/// Memory-map and decode a PNM file.
pub fn read_pnm(path: &Path) -> Result<PnmImage> {
    let file = File::open(path).map_err(|source| ContrastError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mmap = unsafe { Mmap::map(&file)? };
    decode_pnm(&mmap)
}

pub fn encode_pnm<W: Write>(image: &PnmImage, mut out: W) -> Result<()> {
    let header = image.header();
    write!(
        out,
        "P{}\n{} {}\n{}\n",
        header.format.code(),
        header.width,
        header.height,
        header.max_value
    )?;
    out.write_all(image.buffer.as_bytes())?;
    Ok(())
}

pub fn write_pnm(path: &Path, image: &PnmImage) -> Result<()> {
    let file = File::create(path).map_err(|source| ContrastError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    encode_pnm(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}
