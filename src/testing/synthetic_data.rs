//! Generated gradient frames
//!
//! The pattern shifts with the frame number so consecutive frames differ,
//! which keeps inter-frame encoders honest.

use crate::types::{Frame, PixelFormat, RowOrder};

/// The logical RGB color of pixel (x, y) in frame `frame_number`
pub fn pattern_pixel(frame_number: u64, x: u32, y: u32) -> [u8; 3] {
    let base = (frame_number % 256) as u8;
    [
        base.wrapping_add((x % 256) as u8),
        base.wrapping_add((y % 256) as u8),
        base.wrapping_add(((x + y) % 256) as u8),
    ]
}

/// A packed top-down RGB24 gradient frame
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> Frame {
    synthetic_frame(
        frame_number,
        width,
        height,
        PixelFormat::Rgb24,
        0,
        RowOrder::TopDown,
    )
}

/// A gradient frame in an arbitrary layout.
///
/// Every row is followed by `row_padding` filler bytes (the last row
/// included). Formats the converter does not handle get a flat fill.
pub fn synthetic_frame(
    frame_number: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
    row_padding: usize,
    row_order: RowOrder,
) -> Frame {
    let row_bytes = width as usize * format.bytes_per_pixel();
    let stride = row_bytes + row_padding;
    let mut data = vec![0xA5u8; stride * height as usize];

    for y in 0..height {
        let mem_row = match row_order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => height - 1 - y,
        } as usize;
        let row = &mut data[mem_row * stride..mem_row * stride + row_bytes];

        match format {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    let [r, g, b] = pattern_pixel(frame_number, x as u32, y);
                    if format == PixelFormat::Rgb24 {
                        px.copy_from_slice(&[r, g, b]);
                    } else {
                        px.copy_from_slice(&[b, g, r]);
                    }
                }
            }
            PixelFormat::Rgba32 | PixelFormat::Yuyv => row.fill((frame_number % 256) as u8),
        }
    }

    Frame {
        sequence: frame_number,
        timestamp_us: 0,
        width,
        height,
        stride,
        format,
        row_order,
        data: data.into(),
    }
}
