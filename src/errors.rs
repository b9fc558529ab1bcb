use crate::types::FrameSize;

/// Errors raised anywhere in the capture → convert → encode pipeline.
///
/// The enum is `Clone` so per-frame failures can travel through the event
/// channel to the operator while the original is logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    /// No capture device could be opened for the requested handle.
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The frame's pixel layout cannot be converted; the frame is dropped.
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),
    /// The container/codec combination could not be opened; recording stays idle.
    #[error("Encoder initialization failed: {0}")]
    EncoderInitFailed(String),
    #[error("Frame size {actual} does not match recording size {expected}")]
    FrameSizeMismatch { expected: FrameSize, actual: FrameSize },
    #[error("No recording in progress")]
    NotRecording,
    #[error("Capture is not running")]
    NotCapturing,
    #[error("A recording is already in progress")]
    AlreadyRecording,
    #[error("Capture is already running")]
    AlreadyCapturing,
    #[error("No frame has been captured yet")]
    NoFrameAvailable,
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for CameraError {
    fn from(e: std::io::Error) -> Self {
        CameraError::IoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_message_names_both_sizes() {
        let err = CameraError::FrameSizeMismatch {
            expected: FrameSize::new(640, 480),
            actual: FrameSize::new(320, 240),
        };
        let msg = err.to_string();
        assert!(msg.contains("640x480"));
        assert!(msg.contains("320x240"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CameraError = io.into();
        assert!(matches!(err, CameraError::IoError(ref m) if m.contains("missing")));
    }
}
