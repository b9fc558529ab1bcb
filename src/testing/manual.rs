//! A frame source driven by the test itself

use std::sync::Arc;

use crate::source::{CallbackGate, FrameHandler, FrameSource};
use crate::errors::CameraError;
use crate::types::Frame;

/// Source whose frames are pushed by hand through a [`ManualTrigger`].
///
/// Any non-empty device name is accepted.
pub struct ManualSource {
    gate: Arc<CallbackGate>,
    device: Option<String>,
}

/// Pushes frames into a [`ManualSource`] from any thread
#[derive(Clone)]
pub struct ManualTrigger {
    gate: Arc<CallbackGate>,
}

impl ManualSource {
    pub fn new() -> (Self, ManualTrigger) {
        let gate = Arc::new(CallbackGate::new());
        let trigger = ManualTrigger { gate: gate.clone() };
        (Self { gate, device: None }, trigger)
    }

    /// Device passed to the last successful `start`
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }
}

impl ManualTrigger {
    /// Deliver one frame synchronously. Returns `false` if the source is not
    /// running, in which case the frame was discarded.
    pub fn emit(&self, frame: Frame) -> bool {
        self.gate.deliver(frame)
    }
}

impl FrameSource for ManualSource {
    fn start(&mut self, device: &str, handler: FrameHandler) -> Result<(), CameraError> {
        if device.is_empty() {
            return Err(CameraError::DeviceUnavailable("empty device name".to_string()));
        }
        if self.gate.is_open() {
            return Err(CameraError::AlreadyCapturing);
        }
        self.gate.open(handler);
        self.device = Some(device.to_string());
        Ok(())
    }

    fn stop(&mut self) {
        self.gate.close();
    }

    fn is_running(&self) -> bool {
        self.gate.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_video_frame;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_emit_reaches_handler_only_while_running() {
        let (mut source, trigger) = ManualSource::new();
        assert!(!trigger.emit(synthetic_video_frame(0, 2, 2)));

        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        source
            .start("cam", Box::new(move |_: Frame| {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert_eq!(source.device(), Some("cam"));
        assert!(trigger.emit(synthetic_video_frame(1, 2, 2)));

        source.stop();
        assert!(!trigger.emit(synthetic_video_frame(2, 2, 2)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_device_unavailable() {
        let (mut source, _trigger) = ManualSource::new();
        let result = source.start("", Box::new(|_: Frame| {}));
        assert!(matches!(result, Err(CameraError::DeviceUnavailable(_))));
        assert!(!source.is_running());
    }
}
