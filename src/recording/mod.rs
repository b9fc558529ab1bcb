//! Video recording for crabcapture
//!
//! A [`RecordingSession`] owns one encoder backend for one output file. The
//! codec follows the file extension:
//! - `.mp4`: H.264 via openh264, muxed by muxide (feature `recording`)
//! - anything else: Motion JPEG in an AVI container
//!
//! # Example
//! ```rust,ignore
//! use crabcapture::recording::RecordingSession;
//! use crabcapture::types::FrameSize;
//!
//! let mut session = RecordingSession::open("clip.avi", FrameSize::new(640, 480), 25.0)?;
//! session.write(&converted)?;
//! let stats = session.close()?;
//! ```

mod backend;
mod codec;
mod config;
#[cfg(feature = "recording")]
mod encoder;
mod mjpeg;
#[cfg(feature = "recording")]
mod mp4;
mod session;

pub use backend::{EncoderBackend, EncoderFactory, EncoderParams, PlatformEncoders};
pub use codec::{Codec, FourCC};
pub use config::{BackendStats, EncoderTuning, RecordingStats};
#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
pub use mjpeg::MjpegAviWriter;
#[cfg(feature = "recording")]
pub use mp4::Mp4Writer;
pub use session::RecordingSession;
