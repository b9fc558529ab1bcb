//! Codec selection from the output file extension

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Four-character codec identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FourCC([u8; 4]);

impl FourCC {
    pub const H264: FourCC = FourCC(*b"H264");
    pub const MJPG: FourCC = FourCC(*b"MJPG");

    pub const fn new(code: [u8; 4]) -> Self {
        FourCC(code)
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Numeric code as used by video-for-windows style APIs (little-endian packing)
    pub fn code(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Codec used for a recording, resolved once when the recording starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    /// H.264 in an MP4 container
    H264,
    /// Motion JPEG in an AVI container
    Mjpg,
}

impl Codec {
    /// Pick the codec for an output path: `.mp4` records H.264, everything
    /// else (including no extension) records Motion JPEG.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp4") => Codec::H264,
            _ => Codec::Mjpg,
        }
    }

    pub fn fourcc(&self) -> FourCC {
        match self {
            Codec::H264 => FourCC::H264,
            Codec::Mjpg => FourCC::MJPG,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fourcc().fmt(f)
    }
}
