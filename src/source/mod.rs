//! Frame sources
//!
//! A source pushes frames to a registered handler from its own capture
//! context. `stop` blocks until that context has quiesced: once it returns
//! the handler is never invoked again.

#[cfg(feature = "camera")]
mod camera;
mod synthetic;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use crate::errors::CameraError;
use crate::types::Frame;

/// Per-frame callback registered with a source
pub type FrameHandler = Box<dyn FnMut(Frame) + Send + 'static>;

/// A push-based producer of captured frames
pub trait FrameSource: Send {
    /// Resolve `device` and begin delivering frames to `handler`
    fn start(&mut self, device: &str, handler: FrameHandler) -> Result<(), CameraError>;

    /// Stop capturing. Returns only after the last handler call has finished.
    /// Stopping a source that is not running does nothing.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Serializes handler calls against `close`.
///
/// Delivery holds the gate lock for the whole handler call, so `close`
/// waits for an in-flight frame and every later delivery is refused.
#[derive(Default)]
pub(crate) struct CallbackGate {
    handler: Mutex<Option<FrameHandler>>,
}

impl CallbackGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open(&self, handler: FrameHandler) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Hand a frame to the handler. Returns `false` once the gate is closed.
    pub(crate) fn deliver(&self, frame: Frame) -> bool {
        let mut guard = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handler) = guard.as_mut() else {
            return false;
        };

        let sequence = frame.sequence;
        if panic::catch_unwind(AssertUnwindSafe(|| handler(frame))).is_err() {
            log::error!("Frame handler panicked on frame {}; capture continues", sequence);
        }
        true
    }

    /// Drop the handler, waiting for any in-flight delivery first
    pub(crate) fn close(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
