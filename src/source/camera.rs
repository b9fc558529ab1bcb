//! Live camera input through nokhwa

use std::sync::Arc;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{query, Buffer, CallbackCamera};

use super::{CallbackGate, FrameHandler, FrameSource};
use crate::errors::CameraError;
use crate::timing::CaptureClock;
use crate::types::{Frame, FrameSize, PixelFormat};

/// Camera source driven by nokhwa's threaded callback camera.
///
/// Frames are decoded to RGB24 on nokhwa's capture thread before they reach
/// the handler.
pub struct CameraSource {
    resolution: FrameSize,
    frame_rate: u32,
    gate: Arc<CallbackGate>,
    camera: Option<CallbackCamera>,
}

impl CameraSource {
    pub fn new(resolution: FrameSize, frame_rate: u32) -> Self {
        Self {
            resolution,
            frame_rate,
            gate: Arc::new(CallbackGate::new()),
            camera: None,
        }
    }

    /// Human readable names of the cameras the platform reports
    pub fn list_devices() -> Result<Vec<String>, CameraError> {
        let cameras = query(ApiBackend::Auto)
            .map_err(|e| CameraError::DeviceUnavailable(format!("Failed to query cameras: {}", e)))?;
        Ok(cameras.iter().map(|c| c.human_name()).collect())
    }

    /// Accepts a numeric index or a camera's human readable name
    fn resolve(device: &str) -> Result<CameraIndex, CameraError> {
        let cameras = query(ApiBackend::Auto)
            .map_err(|e| CameraError::DeviceUnavailable(format!("Failed to query cameras: {}", e)))?;
        if cameras.is_empty() {
            return Err(CameraError::DeviceUnavailable("no cameras found".to_string()));
        }

        if let Ok(index) = device.parse::<u32>() {
            if (index as usize) < cameras.len() {
                return Ok(CameraIndex::Index(index));
            }
        }

        cameras
            .iter()
            .find(|c| c.human_name() == device)
            .map(|c| c.index().clone())
            .ok_or_else(|| CameraError::DeviceUnavailable(format!("no camera named '{}'", device)))
    }
}

impl FrameSource for CameraSource {
    fn start(&mut self, device: &str, handler: FrameHandler) -> Result<(), CameraError> {
        if self.camera.is_some() {
            return Err(CameraError::AlreadyCapturing);
        }

        let index = Self::resolve(device)?;
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(self.resolution.width, self.resolution.height),
                FrameFormat::MJPEG,
                self.frame_rate,
            ),
        ));

        self.gate.open(handler);
        let gate = self.gate.clone();
        let clock = CaptureClock::new();
        let mut sequence = 0u64;

        let callback = move |buffer: Buffer| {
            let image = match buffer.decode_image::<RgbFormat>() {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("Dropping undecodable camera frame: {}", e);
                    return;
                }
            };
            let (width, height) = image.dimensions();
            let frame = Frame::packed(width, height, PixelFormat::Rgb24, image.into_raw())
                .with_sequence(sequence)
                .with_timestamp_us(clock.micros());
            if gate.deliver(frame) {
                sequence += 1;
            }
        };

        let opened = CallbackCamera::new(index, requested, callback).and_then(|mut camera| {
            camera.open_stream()?;
            Ok(camera)
        });

        match opened {
            Ok(camera) => {
                log::info!("Camera '{}' streaming ({} requested)", device, self.resolution);
                self.camera = Some(camera);
                Ok(())
            }
            Err(e) => {
                self.gate.close();
                Err(CameraError::DeviceUnavailable(format!(
                    "Failed to open camera '{}': {}",
                    device, e
                )))
            }
        }
    }

    fn stop(&mut self) {
        // Close first so a frame arriving during shutdown is refused
        self.gate.close();
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {}", e);
            }
            log::info!("Camera capture stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.camera.is_some()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

// SAFETY: the callback camera is only touched through `&mut self`, so it is
// never used from two threads at once.
unsafe impl Send for CameraSource {}
