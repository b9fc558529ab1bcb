//! Thread-driven source of generated gradient frames

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{CallbackGate, FrameHandler, FrameSource};
use crate::errors::CameraError;
use crate::testing::synthetic_frame;
use crate::timing::CaptureClock;
use crate::types::{PixelFormat, RowOrder};

/// Shape of the frames a [`SyntheticSource`] produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Device names this source answers to
    pub devices: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub format: PixelFormat,
    /// Extra bytes at the end of every row
    pub row_padding: usize,
    pub row_order: RowOrder,
    /// Stop producing after this many frames
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            devices: vec!["synthetic".to_string()],
            width: 640,
            height: 480,
            frame_rate: 30.0,
            format: PixelFormat::Rgb24,
            row_padding: 0,
            row_order: RowOrder::TopDown,
            frame_limit: None,
        }
    }
}

impl SyntheticConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Accepts a configured name or its index in `devices`
    fn resolves(&self, device: &str) -> bool {
        if self.devices.iter().any(|d| d == device) {
            return true;
        }
        device
            .parse::<usize>()
            .map(|i| i < self.devices.len())
            .unwrap_or(false)
    }
}

/// Frame source backed by a generator thread.
///
/// Frames are paced to `frame_rate` against a monotonic clock and carry
/// increasing sequence numbers starting at zero.
pub struct SyntheticSource {
    config: SyntheticConfig,
    gate: Arc<CallbackGate>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            gate: Arc::new(CallbackGate::new()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Synthetic capture thread panicked");
            }
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl FrameSource for SyntheticSource {
    fn start(&mut self, device: &str, handler: FrameHandler) -> Result<(), CameraError> {
        if self.is_running() {
            return Err(CameraError::AlreadyCapturing);
        }
        // A source that ran out its frame limit still holds a finished thread
        self.join_thread();

        if !self.config.resolves(device) {
            return Err(CameraError::DeviceUnavailable(format!(
                "no synthetic device named '{}'",
                device
            )));
        }
        if !(self.config.frame_rate.is_finite() && self.config.frame_rate > 0.0) {
            return Err(CameraError::ConfigError(format!(
                "invalid synthetic frame rate {}",
                self.config.frame_rate
            )));
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        self.gate.open(handler);

        let config = self.config.clone();
        let gate = self.gate.clone();
        let stop_flag = self.stop_flag.clone();
        let spawned = std::thread::Builder::new()
            .name("crabcapture-synthetic".to_string())
            .spawn(move || run_generator(config, gate, stop_flag));

        match spawned {
            Ok(handle) => {
                log::info!(
                    "Synthetic capture started on '{}' ({}x{} {} @ {:.1} fps)",
                    device,
                    self.config.width,
                    self.config.height,
                    self.config.format,
                    self.config.frame_rate
                );
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.gate.close();
                Err(CameraError::DeviceUnavailable(format!(
                    "failed to spawn capture thread: {}",
                    e
                )))
            }
        }
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        let was_open = self.gate.close();
        self.join_thread();
        if was_open {
            log::info!("Synthetic capture stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_generator(config: SyntheticConfig, gate: Arc<CallbackGate>, stop_flag: Arc<AtomicBool>) {
    let clock = CaptureClock::new();
    let period = Duration::from_secs_f64(1.0 / config.frame_rate);
    let started = Instant::now();
    let mut sequence = 0u64;

    while !stop_flag.load(Ordering::SeqCst) {
        if config.frame_limit.is_some_and(|limit| sequence >= limit) {
            log::debug!("Synthetic source reached its limit of {} frames", sequence);
            break;
        }

        let frame = synthetic_frame(
            sequence,
            config.width,
            config.height,
            config.format,
            config.row_padding,
            config.row_order,
        )
        .with_timestamp_us(clock.micros());

        if !gate.deliver(frame) {
            break;
        }
        sequence += 1;

        let deadline = started + period.mul_f64(sequence as f64);
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}
