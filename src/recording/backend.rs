//! Encoder backend seam
//!
//! A backend owns one output file for the lifetime of a recording. The
//! platform factory picks the container writer for the resolved codec; tests
//! inject their own factory to observe what reaches the encoder.

use std::path::PathBuf;

use super::codec::Codec;
use super::config::{BackendStats, EncoderTuning};
use super::mjpeg::MjpegAviWriter;
use crate::errors::CameraError;
use crate::types::{ConvertedFrame, FrameSize};

/// Everything a backend needs to open its output
#[derive(Debug, Clone)]
pub struct EncoderParams {
    pub path: PathBuf,
    pub codec: Codec,
    pub frame_rate: f64,
    pub frame_size: FrameSize,
    /// Three-channel color input; monochrome output is not supported
    pub is_color: bool,
}

/// An open, writable video stream
pub trait EncoderBackend: Send {
    /// Append one packed frame. Dimensions were validated by the session.
    fn write(&mut self, frame: &ConvertedFrame) -> Result<(), CameraError>;

    /// Flush and finalize the container, consuming the backend
    fn finish(self: Box<Self>) -> Result<BackendStats, CameraError>;
}

/// Opens encoder backends for recording sessions
pub trait EncoderFactory: Send + Sync {
    fn open(&self, params: &EncoderParams) -> Result<Box<dyn EncoderBackend>, CameraError>;
}

/// Factory for the built-in container writers: H.264/MP4 and Motion JPEG/AVI
#[derive(Debug, Clone, Default)]
pub struct PlatformEncoders {
    tuning: EncoderTuning,
}

impl PlatformEncoders {
    pub fn new(tuning: EncoderTuning) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> &EncoderTuning {
        &self.tuning
    }
}

impl EncoderFactory for PlatformEncoders {
    fn open(&self, params: &EncoderParams) -> Result<Box<dyn EncoderBackend>, CameraError> {
        if !params.is_color {
            return Err(CameraError::EncoderInitFailed(
                "monochrome output is not supported".to_string(),
            ));
        }

        match params.codec {
            Codec::Mjpg => Ok(Box::new(MjpegAviWriter::create(params, &self.tuning)?)),
            #[cfg(feature = "recording")]
            Codec::H264 => Ok(Box::new(super::mp4::Mp4Writer::create(params, &self.tuning)?)),
            #[cfg(not(feature = "recording"))]
            Codec::H264 => Err(CameraError::EncoderInitFailed(
                "H.264 support not compiled in (enable the `recording` feature)".to_string(),
            )),
        }
    }
}
