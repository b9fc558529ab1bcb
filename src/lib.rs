//! crabcapture: live camera capture with preview fan-out and recording
//!
//! A [`FrameSource`](source::FrameSource) pushes frames from its own capture
//! context into a [`CaptureCoordinator`]. The coordinator hands every frame to
//! a preview sink and, while recording, converts it to the encoder layout and
//! appends it to a [`RecordingSession`](recording::RecordingSession).
//!
//! # Features
//! - `recording` (default): H.264 in MP4 via openh264 and muxide
//! - `camera`: live camera input via nokhwa
//!
//! Motion JPEG in AVI is always available.
//!
//! # Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use crabcapture::{CaptureCoordinator, ChannelPreview};
//! use crabcapture::source::{SyntheticConfig, SyntheticSource};
//!
//! # fn main() -> Result<(), crabcapture::CameraError> {
//! let (preview, frames) = ChannelPreview::new(4);
//! let source = SyntheticSource::new(SyntheticConfig::default());
//! let coordinator = CaptureCoordinator::new(Box::new(source), Arc::new(preview));
//!
//! coordinator.start_capture("synthetic")?;
//! coordinator.start_recording("clip.avi")?;
//! let first = frames.recv().expect("preview frame");
//! println!("frame {} is {}x{}", first.sequence, first.width, first.height);
//! let stats = coordinator.stop_recording()?;
//! coordinator.stop_capture()?;
//! # let _ = stats;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod convert;
pub mod coordinator;
pub mod errors;
pub mod recording;
pub mod source;
pub mod testing;
pub mod timing;
pub mod types;

pub use config::AppConfig;
pub use coordinator::{
    CaptureCoordinator, CaptureEvent, ChannelPreview, NullPreview, PreviewSink, RecordingSettings,
};
pub use errors::CameraError;
pub use types::{ChannelOrder, ConvertedFrame, Frame, FrameSize, PixelFormat, RowOrder};

/// Initialize logging, defaulting to `crabcapture=info` when `RUST_LOG` is unset
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("crabcapture=info");
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
