//! Pixel layout conversion from captured frames to encoder input
//!
//! Captured frames may carry row padding and bottom-up row order. The encoder
//! consumes tightly packed top-down buffers with the channel order reversed
//! relative to the source (RGB in, BGR out and vice versa).

use crate::errors::CameraError;
use crate::types::{ChannelOrder, ConvertedFrame, Frame, PixelFormat, RowOrder};

const CHANNELS: usize = 3;

/// Convert a captured frame into a packed buffer with swapped channel order.
///
/// The whole layout is validated before the output buffer is allocated, so a
/// failing call never yields a partially written frame.
pub fn convert(frame: &Frame) -> Result<ConvertedFrame, CameraError> {
    let order = match frame.format {
        PixelFormat::Rgb24 => ChannelOrder::Bgr,
        PixelFormat::Bgr24 => ChannelOrder::Rgb,
        other => {
            return Err(CameraError::UnsupportedFormat(format!(
                "cannot convert {} frames",
                other
            )))
        }
    };

    let data = pack_rows(frame, |dst, src| {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    })?;

    Ok(ConvertedFrame {
        sequence: frame.sequence,
        width: frame.width,
        height: frame.height,
        order,
        data,
    })
}

/// Packed top-down RGB copy of a frame, used for still snapshots
pub fn to_rgb(frame: &Frame) -> Result<Vec<u8>, CameraError> {
    match frame.format {
        PixelFormat::Rgb24 => pack_rows(frame, |dst, src| dst.copy_from_slice(src)),
        PixelFormat::Bgr24 => pack_rows(frame, |dst, src| {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
        }),
        other => Err(CameraError::UnsupportedFormat(format!(
            "cannot convert {} frames",
            other
        ))),
    }
}

/// Copy every visible row of a 3-byte-per-pixel frame into a packed buffer,
/// applying `pixel` to each (destination, source) pixel pair.
fn pack_rows<F>(frame: &Frame, pixel: F) -> Result<Vec<u8>, CameraError>
where
    F: Fn(&mut [u8], &[u8]),
{
    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 {
        return Err(CameraError::UnsupportedFormat(format!(
            "empty frame {}",
            frame.size()
        )));
    }

    let row_bytes = width
        .checked_mul(CHANNELS)
        .ok_or_else(|| CameraError::UnsupportedFormat("frame width overflows".to_string()))?;
    if frame.stride < row_bytes {
        return Err(CameraError::UnsupportedFormat(format!(
            "stride {} is shorter than a {}-byte row",
            frame.stride, row_bytes
        )));
    }

    let required = frame
        .stride
        .checked_mul(height - 1)
        .and_then(|n| n.checked_add(row_bytes))
        .ok_or_else(|| CameraError::UnsupportedFormat("frame layout overflows".to_string()))?;
    if frame.data.len() < required {
        return Err(CameraError::UnsupportedFormat(format!(
            "buffer holds {} bytes, layout needs {}",
            frame.data.len(),
            required
        )));
    }

    let mut out = vec![0u8; row_bytes * height];
    for (y, dst_row) in out.chunks_exact_mut(row_bytes).enumerate() {
        let src_y = match frame.row_order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => height - 1 - y,
        };
        let start = src_y * frame.stride;
        let src_row = &frame.data[start..start + row_bytes];
        for (dst, src) in dst_row
            .chunks_exact_mut(CHANNELS)
            .zip(src_row.chunks_exact(CHANNELS))
        {
            pixel(dst, src);
        }
    }

    Ok(out)
}
