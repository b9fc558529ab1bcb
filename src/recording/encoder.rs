//! H.264 encoder wrapper using openh264

use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate, FrameType, RateControlMode};
use openh264::formats::YUVBuffer;
use openh264::OpenH264API;

use crate::errors::CameraError;
use crate::types::{ChannelOrder, FrameSize};

const DEFAULT_BITRATE: u32 = 5_000_000;
const DEFAULT_FRAME_RATE: f64 = 30.0;

/// H.264 encoder using openh264
pub struct H264Encoder {
    encoder: Encoder,
    size: FrameSize,
    frame_count: u64,
}

impl H264Encoder {
    /// Create an encoder for frames of exactly `size` at 5 Mbit/s, 30 fps
    pub fn new(size: FrameSize) -> Result<Self, CameraError> {
        Self::with_rate(size, DEFAULT_BITRATE, DEFAULT_FRAME_RATE)
    }

    /// Create an encoder targeting `bitrate` bits per second at `frame_rate`.
    ///
    /// openh264 infers dimensions from the YUV source at encode time, so the
    /// size is enforced here instead. 4:2:0 subsampling needs even dimensions.
    /// Frame skipping is disabled: every input frame yields output.
    pub fn with_rate(size: FrameSize, bitrate: u32, frame_rate: f64) -> Result<Self, CameraError> {
        if size.is_empty() || size.width % 2 != 0 || size.height % 2 != 0 {
            return Err(CameraError::EncoderInitFailed(format!(
                "H.264 needs non-zero even dimensions, got {}",
                size
            )));
        }

        if bitrate == 0 {
            return Err(CameraError::EncoderInitFailed("H.264 bitrate must be non-zero".to_string()));
        }
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(CameraError::EncoderInitFailed(format!("invalid frame rate {}", frame_rate)));
        }

        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(bitrate))
            .max_frame_rate(FrameRate::from_hz(frame_rate as f32))
            .rate_control_mode(RateControlMode::Bitrate)
            .skip_frames(false);

        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| CameraError::EncoderInitFailed(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            size,
            frame_count: 0,
        })
    }

    /// Encode one packed 3-channel frame.
    /// Returns the NAL units as a single Annex B buffer.
    pub fn encode_packed(&mut self, data: &[u8], order: ChannelOrder) -> Result<EncodedFrame, CameraError> {
        let expected_size = self.size.pixels() * 3;
        if data.len() != expected_size {
            return Err(CameraError::EncodingError(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected_size,
                data.len()
            )));
        }

        let yuv = packed_to_yuv420(data, order, self.size);
        let yuv_buffer = YUVBuffer::from_vec(yuv, self.size.width as usize, self.size.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| CameraError::EncodingError(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    /// Number of frames passed to the encoder
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Annex B data (with start codes); empty if the encoder produced nothing
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// Convert packed RGB or BGR to planar YUV 4:2:0 (BT.601)
fn packed_to_yuv420(src: &[u8], order: ChannelOrder, size: FrameSize) -> Vec<u8> {
    let w = size.width as usize;
    let h = size.height as usize;
    let (r_at, b_at) = order.red_blue_offsets();

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let px = &src[(y * w + x) * 3..][..3];
            let r = px[r_at] as i32;
            let g = px[1] as i32;
            let b = px[b_at] as i32;

            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            // one chroma sample per 2x2 block
            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}
