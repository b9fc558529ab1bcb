//! A single recording: one output file, one encoder, one writer

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::backend::{EncoderBackend, EncoderFactory, EncoderParams, PlatformEncoders};
use super::codec::Codec;
use super::config::RecordingStats;
use crate::errors::CameraError;
use crate::types::{ConvertedFrame, FrameSize};

enum SessionState {
    Open {
        encoder: Box<dyn EncoderBackend>,
        started: Instant,
        frames: u64,
    },
    Closed,
}

/// Owns the encoder for one output file.
///
/// The encoder only exists while the session is open. `close` finalizes the
/// file and is idempotent; a session dropped while open closes itself.
pub struct RecordingSession {
    state: SessionState,
    path: PathBuf,
    codec: Codec,
    frame_size: FrameSize,
    frame_rate: f64,
}

impl RecordingSession {
    /// Open a recording with the built-in encoders and default tuning
    pub fn open<P: AsRef<Path>>(path: P, frame_size: FrameSize, frame_rate: f64) -> Result<Self, CameraError> {
        Self::open_with(&PlatformEncoders::default(), path, frame_size, frame_rate)
    }

    /// Open a recording through the given encoder factory.
    ///
    /// The codec is resolved from the file extension once, here.
    pub fn open_with<P: AsRef<Path>>(
        factory: &dyn EncoderFactory,
        path: P,
        frame_size: FrameSize,
        frame_rate: f64,
    ) -> Result<Self, CameraError> {
        let path = path.as_ref().to_path_buf();
        if frame_size.is_empty() {
            return Err(CameraError::EncoderInitFailed(format!(
                "invalid frame size {}",
                frame_size
            )));
        }
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(CameraError::EncoderInitFailed(format!(
                "invalid frame rate {}",
                frame_rate
            )));
        }

        let codec = Codec::for_path(&path);
        let params = EncoderParams {
            path: path.clone(),
            codec,
            frame_rate,
            frame_size,
            is_color: true,
        };
        let encoder = factory.open(&params)?;

        log::info!(
            "Recording to {} ({}, {} @ {:.2} fps)",
            path.display(),
            codec,
            frame_size,
            frame_rate
        );

        Ok(Self {
            state: SessionState::Open {
                encoder,
                started: Instant::now(),
                frames: 0,
            },
            path,
            codec,
            frame_size,
            frame_rate,
        })
    }

    /// Append one frame. The frame must match the session's frame size.
    pub fn write(&mut self, frame: &ConvertedFrame) -> Result<(), CameraError> {
        let SessionState::Open { encoder, frames, .. } = &mut self.state else {
            return Err(CameraError::NotRecording);
        };

        if frame.size() != self.frame_size {
            return Err(CameraError::FrameSizeMismatch {
                expected: self.frame_size,
                actual: frame.size(),
            });
        }

        encoder.write(frame)?;
        *frames += 1;
        Ok(())
    }

    /// Finalize the file and release the encoder.
    ///
    /// Returns `None` if the session was already closed.
    pub fn close(&mut self) -> Result<Option<RecordingStats>, CameraError> {
        let SessionState::Open { encoder, started, frames } =
            std::mem::replace(&mut self.state, SessionState::Closed)
        else {
            return Ok(None);
        };

        let backend = encoder.finish()?;
        let stats = RecordingStats {
            codec: self.codec,
            frames_written: frames,
            skipped_frames: backend.skipped,
            duration_secs: backend.frames as f64 / self.frame_rate,
            elapsed_secs: started.elapsed().as_secs_f64(),
            bytes_written: backend.bytes_written,
            output_path: self.path.to_string_lossy().to_string(),
        };

        log::info!(
            "Recording finished: {} frames, {:.2}s, {} bytes -> {}",
            stats.frames_written,
            stats.duration_secs,
            stats.bytes_written,
            stats.output_path
        );
        Ok(Some(stats))
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open { .. })
    }

    pub fn frames_written(&self) -> u64 {
        match self.state {
            SessionState::Open { frames, .. } => frames,
            SessionState::Closed => 0,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.is_open() {
            log::warn!("Recording {} dropped while open, finalizing", self.path.display());
            if let Err(e) = self.close() {
                log::error!("Failed to finalize {}: {}", self.path.display(), e);
            }
        }
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("path", &self.path)
            .field("codec", &self.codec)
            .field("frame_size", &self.frame_size)
            .field("open", &self.is_open())
            .finish()
    }
}
