//! Core frame types shared by sources, the converter and the encoders

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in a frame of this size
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<[u32; 2]> for FrameSize {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

/// Native pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Interleaved R, G, B; 3 bytes per pixel
    Rgb24,
    /// Interleaved B, G, R; 3 bytes per pixel
    Bgr24,
    /// Interleaved R, G, B, A; 4 bytes per pixel
    Rgba32,
    /// Packed 4:2:2 Y0 U Y1 V
    Yuyv,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgba32 => 4,
            PixelFormat::Yuyv => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Bgr24 => "BGR24",
            PixelFormat::Rgba32 => "RGBA32",
            PixelFormat::Yuyv => "YUYV",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order of rows in a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowOrder {
    /// First row in memory is the top of the image
    #[default]
    TopDown,
    /// First row in memory is the bottom of the image (DIB style)
    BottomUp,
}

/// One captured image.
///
/// The pixel buffer is reference counted, so cloning a frame to hand it to the
/// preview sink does not copy pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    /// Microseconds since the source started
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows in `data`
    pub stride: usize,
    pub format: PixelFormat,
    pub row_order: RowOrder,
    pub data: Bytes,
}

impl Frame {
    /// Create a tightly packed, top-down frame
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Self {
        Self {
            sequence: 0,
            timestamp_us: 0,
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            row_order: RowOrder::TopDown,
            data: data.into(),
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_timestamp_us(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// Channel order of a packed 3-channel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Byte offsets of the red and blue channel inside one pixel
    pub fn red_blue_offsets(&self) -> (usize, usize) {
        match self {
            ChannelOrder::Rgb => (0, 2),
            ChannelOrder::Bgr => (2, 0),
        }
    }
}

/// Tightly packed 3-channel frame ready for an encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFrame {
    /// Sequence number of the source frame
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl ConvertedFrame {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Pixel data as packed RGB, swapping channels only when needed
    pub fn rgb_bytes(&self) -> Cow<'_, [u8]> {
        match self.order {
            ChannelOrder::Rgb => Cow::Borrowed(&self.data),
            ChannelOrder::Bgr => {
                let mut rgb = self.data.clone();
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                Cow::Owned(rgb)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_frame_stride() {
        let frame = Frame::packed(4, 2, PixelFormat::Rgb24, vec![0u8; 24]);
        assert_eq!(frame.stride, 12);
        assert_eq!(frame.size(), FrameSize::new(4, 2));
        assert_eq!(frame.row_order, RowOrder::TopDown);
    }

    #[test]
    fn test_frame_clone_shares_buffer() {
        let frame = Frame::packed(2, 1, PixelFormat::Bgr24, vec![1u8, 2, 3, 4, 5, 6]);
        let view = frame.clone();
        assert_eq!(frame.data.as_ptr(), view.data.as_ptr());
    }

    #[test]
    fn test_rgb_bytes_swaps_bgr() {
        let frame = ConvertedFrame {
            sequence: 0,
            width: 1,
            height: 1,
            order: ChannelOrder::Bgr,
            data: vec![10, 20, 30],
        };
        assert_eq!(&*frame.rgb_bytes(), &[30, 20, 10]);
    }

    #[test]
    fn test_frame_size_display() {
        assert_eq!(FrameSize::new(1920, 1080).to_string(), "1920x1080");
        assert!(FrameSize::new(0, 10).is_empty());
    }
}
