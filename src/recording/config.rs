//! Encoder tuning and recording statistics

use serde::{Deserialize, Serialize};

use super::codec::Codec;

/// Codec-specific knobs handed to every encoder backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderTuning {
    /// Target bitrate in bits per second (H.264)
    pub bitrate: u32,
    /// JPEG quality 1-100 (Motion JPEG)
    pub jpeg_quality: u8,
    /// Write the MP4 index before the media data
    pub fast_start: bool,
    /// Optional title metadata (MP4)
    pub title: Option<String>,
}

impl EncoderTuning {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_fast_start(mut self, enabled: bool) -> Self {
        self.fast_start = enabled;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

impl Default for EncoderTuning {
    fn default() -> Self {
        Self {
            bitrate: 5_000_000,
            jpeg_quality: 85,
            fast_start: true,
            title: None,
        }
    }
}

/// Totals reported by an encoder backend when it finalizes its file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendStats {
    /// Frames that made it into the container
    pub frames: u64,
    /// Frames the encoder produced no output for
    pub skipped: u64,
    pub bytes_written: u64,
}

/// Statistics returned after closing a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    pub codec: Codec,
    /// Frames handed to the encoder
    pub frames_written: u64,
    /// Frames the encoder produced no output for; each failed its write
    pub skipped_frames: u64,
    /// Presentation duration derived from frame count and frame rate
    pub duration_secs: f64,
    /// Wall-clock time the session was open
    pub elapsed_secs: f64,
    pub bytes_written: u64,
    pub output_path: String,
}
