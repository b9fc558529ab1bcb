//! Capture coordinator
//!
//! Receives frames from a [`FrameSource`], fans each one out to a preview
//! sink and, while a recording is running, through the converter into the
//! [`RecordingSession`].
//!
//! Locking: commands take the source lock before the recording lock. The
//! capture callback runs under the source's gate and only takes the
//! recording lock, never the source lock.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::config::AppConfig;
use crate::convert;
use crate::errors::CameraError;
use crate::recording::{Codec, EncoderFactory, PlatformEncoders, RecordingSession, RecordingStats};
use crate::source::FrameSource;
use crate::types::{Frame, FrameSize};

const DEFAULT_EVENT_QUEUE: usize = 64;

/// Receives every captured frame for live display
pub trait PreviewSink: Send + Sync {
    fn deliver(&self, frame: Frame) -> Result<(), CameraError>;
}

/// Preview sink that discards frames
#[derive(Debug, Default)]
pub struct NullPreview;

impl PreviewSink for NullPreview {
    fn deliver(&self, _frame: Frame) -> Result<(), CameraError> {
        Ok(())
    }
}

/// Preview sink backed by a bounded channel.
///
/// When the consumer falls behind, new frames are dropped rather than
/// blocking the capture thread.
#[derive(Debug, Clone)]
pub struct ChannelPreview {
    tx: Sender<Frame>,
}

impl ChannelPreview {
    pub fn new(capacity: usize) -> (Self, Receiver<Frame>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl PreviewSink for ChannelPreview {
    fn deliver(&self, frame: Frame) -> Result<(), CameraError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(frame)) => {
                log::trace!("Preview queue full, dropping frame {}", frame.sequence);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(CameraError::IoError(
                "preview receiver disconnected".to_string(),
            )),
        }
    }
}

/// Asynchronous notifications for the operator
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    RecordingStarted { path: PathBuf, codec: Codec },
    RecordingStopped(RecordingStats),
    /// A frame captured while recording did not reach the file
    FrameDropped { sequence: u64, error: CameraError },
}

/// How recordings are sized and timed
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSettings {
    pub frame_rate: f64,
    /// Fixed output size; when unset the latest captured frame decides
    pub frame_size: Option<FrameSize>,
    /// Used when no frame has been captured yet
    pub capture_resolution: FrameSize,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            frame_rate: 25.0,
            frame_size: None,
            capture_resolution: FrameSize::new(640, 480),
        }
    }
}

impl RecordingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            frame_rate: config.recording.frame_rate,
            frame_size: config.recording.frame_size(),
            capture_resolution: config.capture.resolution(),
        }
    }
}

enum RecordingState {
    Idle,
    Recording(RecordingSession),
}

/// State touched from the capture callback
struct Shared {
    recording: Mutex<RecordingState>,
    preview: Arc<dyn PreviewSink>,
    events: Sender<CaptureEvent>,
    latest: Mutex<Option<Frame>>,
    frames_captured: AtomicU64,
}

impl Shared {
    fn recording(&self) -> MutexGuard<'_, RecordingState> {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn latest(&self) -> MutexGuard<'_, Option<Frame>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CaptureEvent) {
        if let Err(TrySendError::Full(event)) = self.events.try_send(event) {
            log::debug!("Event queue full, dropping {:?}", event);
        }
    }

    fn on_frame(&self, frame: Frame) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        *self.latest() = Some(frame.clone());

        let preview = panic::catch_unwind(AssertUnwindSafe(|| self.preview.deliver(frame.clone())));
        match preview {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Preview rejected frame {}: {}", frame.sequence, e),
            Err(_) => log::error!("Preview sink panicked on frame {}", frame.sequence),
        }

        let mut state = self.recording();
        if let RecordingState::Recording(session) = &mut *state {
            let written = convert::convert(&frame).and_then(|converted| session.write(&converted));
            if let Err(error) = written {
                log::warn!("Dropped frame {} from recording: {}", frame.sequence, error);
                self.emit(CaptureEvent::FrameDropped {
                    sequence: frame.sequence,
                    error,
                });
            }
        }
    }
}

/// Owns a frame source and the recording state machine
pub struct CaptureCoordinator {
    source: Mutex<Box<dyn FrameSource>>,
    shared: Arc<Shared>,
    encoders: Arc<dyn EncoderFactory>,
    settings: RecordingSettings,
    events_rx: Receiver<CaptureEvent>,
}

impl CaptureCoordinator {
    pub fn new(source: Box<dyn FrameSource>, preview: Arc<dyn PreviewSink>) -> Self {
        Self::with_event_queue(source, preview, DEFAULT_EVENT_QUEUE)
    }

    fn with_event_queue(
        source: Box<dyn FrameSource>,
        preview: Arc<dyn PreviewSink>,
        capacity: usize,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            source: Mutex::new(source),
            shared: Arc::new(Shared {
                recording: Mutex::new(RecordingState::Idle),
                preview,
                events: events_tx,
                latest: Mutex::new(None),
                frames_captured: AtomicU64::new(0),
            }),
            encoders: Arc::new(PlatformEncoders::default()),
            settings: RecordingSettings::default(),
            events_rx,
        }
    }

    /// Build a coordinator whose encoders and recording settings follow `config`
    pub fn from_config(
        config: &AppConfig,
        source: Box<dyn FrameSource>,
        preview: Arc<dyn PreviewSink>,
    ) -> Self {
        Self::with_event_queue(source, preview, config.recording.event_queue)
            .with_encoders(Arc::new(PlatformEncoders::new(config.recording.tuning())))
            .with_settings(RecordingSettings::from_config(config))
    }

    pub fn with_encoders(mut self, encoders: Arc<dyn EncoderFactory>) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn with_settings(mut self, settings: RecordingSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    /// Receiver for operator events; clones share one queue
    pub fn events(&self) -> Receiver<CaptureEvent> {
        self.events_rx.clone()
    }

    fn source(&self) -> MutexGuard<'_, Box<dyn FrameSource>> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start_capture(&self, device: &str) -> Result<(), CameraError> {
        let mut source = self.source();
        if source.is_running() {
            return Err(CameraError::AlreadyCapturing);
        }

        let shared = self.shared.clone();
        source.start(device, Box::new(move |frame: Frame| shared.on_frame(frame)))?;
        log::info!("Capture started on '{}'", device);
        Ok(())
    }

    /// Leave recording, then stop the source and wait for it to quiesce.
    ///
    /// The source is stopped even if finalizing the recording fails.
    pub fn stop_capture(&self) -> Result<(), CameraError> {
        let mut source = self.source();
        let closed = self.stop_recording();
        // A source that ended on its own may still hold its handler
        let was_running = source.is_running();
        source.stop();
        if was_running {
            log::info!("Capture stopped");
        }
        closed.map(|_| ())
    }

    /// Start recording to `path`. Returns the codec chosen for the file.
    pub fn start_recording<P: AsRef<Path>>(&self, path: P) -> Result<Codec, CameraError> {
        let source = self.source();
        if !source.is_running() {
            return Err(CameraError::NotCapturing);
        }

        let mut state = self.shared.recording();
        if matches!(*state, RecordingState::Recording(_)) {
            return Err(CameraError::AlreadyRecording);
        }

        let frame_size = self.recording_frame_size();
        let session = RecordingSession::open_with(
            self.encoders.as_ref(),
            path.as_ref(),
            frame_size,
            self.settings.frame_rate,
        )?;
        let codec = session.codec();
        *state = RecordingState::Recording(session);
        drop(state);
        drop(source);

        self.shared.emit(CaptureEvent::RecordingStarted {
            path: path.as_ref().to_path_buf(),
            codec,
        });
        Ok(codec)
    }

    /// Stop recording and finalize the file. Returns `None` when idle.
    pub fn stop_recording(&self) -> Result<Option<RecordingStats>, CameraError> {
        let mut session = {
            let mut state = self.shared.recording();
            match std::mem::replace(&mut *state, RecordingState::Idle) {
                RecordingState::Recording(session) => session,
                RecordingState::Idle => return Ok(None),
            }
        };

        let stats = session.close()?;
        if let Some(ref stats) = stats {
            self.shared.emit(CaptureEvent::RecordingStopped(stats.clone()));
        }
        Ok(stats)
    }

    pub fn is_capturing(&self) -> bool {
        self.source().is_running()
    }

    pub fn is_recording(&self) -> bool {
        matches!(*self.shared.recording(), RecordingState::Recording(_))
    }

    pub fn frames_captured(&self) -> u64 {
        self.shared.frames_captured.load(Ordering::Relaxed)
    }

    /// Most recent frame delivered by the source
    pub fn latest_frame(&self) -> Option<Frame> {
        self.shared.latest().clone()
    }

    /// Write the latest captured frame as a still image.
    /// The format follows the file extension.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();
        let frame = self.latest_frame().ok_or(CameraError::NoFrameAvailable)?;
        let rgb = convert::to_rgb(&frame)?;

        let image = image::RgbImage::from_raw(frame.width, frame.height, rgb).ok_or_else(|| {
            CameraError::UnsupportedFormat(format!("cannot build a {} image", frame.size()))
        })?;
        image
            .save(path)
            .map_err(|e| CameraError::IoError(format!("Failed to save {}: {}", path.display(), e)))?;

        log::info!("Saved snapshot of frame {} to {}", frame.sequence, path.display());
        Ok(())
    }

    fn recording_frame_size(&self) -> FrameSize {
        self.settings
            .frame_size
            .or_else(|| self.shared.latest().as_ref().map(Frame::size))
            .unwrap_or(self.settings.capture_resolution)
    }
}

impl Drop for CaptureCoordinator {
    fn drop(&mut self) {
        if let Err(e) = self.stop_capture() {
            log::error!("Failed to finalize recording during shutdown: {}", e);
        }
    }
}
