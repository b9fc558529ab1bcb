//! In-memory encoder factory that records what reaches the encoder

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::errors::CameraError;
use crate::recording::{BackendStats, Codec, EncoderBackend, EncoderFactory, EncoderParams};
use crate::types::{ConvertedFrame, FrameSize};

/// One observable encoder operation
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderEvent {
    Opened {
        path: PathBuf,
        codec: Codec,
        frame_size: FrameSize,
    },
    Frame {
        sequence: u64,
    },
    Finished,
}

/// Encoder factory that writes nothing to disk.
///
/// Clones share one event log, so a test can keep a handle while the
/// coordinator owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryEncoders {
    events: Arc<Mutex<Vec<EncoderEvent>>>,
    write_delay: Option<Duration>,
    fail_open: bool,
    fail_writes: bool,
}

impl MemoryEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside every write, simulating a slow encoder
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Every `open` fails with `EncoderInitFailed`
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Every write fails with `EncodingError`
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn events(&self) -> Vec<EncoderEvent> {
        self.log().clone()
    }

    /// Sequence numbers of every frame written, across all sessions
    pub fn written_sequences(&self) -> Vec<u64> {
        self.log()
            .iter()
            .filter_map(|e| match e {
                EncoderEvent::Frame { sequence } => Some(*sequence),
                _ => None,
            })
            .collect()
    }

    pub fn finish_count(&self) -> usize {
        self.log()
            .iter()
            .filter(|e| matches!(e, EncoderEvent::Finished))
            .count()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<EncoderEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EncoderFactory for MemoryEncoders {
    fn open(&self, params: &EncoderParams) -> Result<Box<dyn EncoderBackend>, CameraError> {
        if self.fail_open {
            return Err(CameraError::EncoderInitFailed(format!(
                "memory encoder refused {}",
                params.path.display()
            )));
        }
        self.log().push(EncoderEvent::Opened {
            path: params.path.clone(),
            codec: params.codec,
            frame_size: params.frame_size,
        });
        Ok(Box::new(MemoryBackend {
            encoders: self.clone(),
            frames: 0,
            bytes: 0,
        }))
    }
}

struct MemoryBackend {
    encoders: MemoryEncoders,
    frames: u64,
    bytes: u64,
}

impl EncoderBackend for MemoryBackend {
    fn write(&mut self, frame: &ConvertedFrame) -> Result<(), CameraError> {
        if let Some(delay) = self.encoders.write_delay {
            std::thread::sleep(delay);
        }
        if self.encoders.fail_writes {
            return Err(CameraError::EncodingError(format!(
                "memory encoder rejected frame {}",
                frame.sequence
            )));
        }
        self.encoders.log().push(EncoderEvent::Frame {
            sequence: frame.sequence,
        });
        self.frames += 1;
        self.bytes += frame.data.len() as u64;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<BackendStats, CameraError> {
        self.encoders.log().push(EncoderEvent::Finished);
        Ok(BackendStats {
            frames: self.frames,
            skipped: 0,
            bytes_written: self.bytes,
        })
    }
}
