//! Configuration management for crabcapture
//!
//! Settings are read from an optional TOML file and layered with `CAMREC_`
//! environment variables, e.g. `CAMREC_RECORDING__FRAME_RATE=30`.

use crate::errors::CameraError;
use crate::recording::EncoderTuning;
use crate::types::FrameSize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CAMREC";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub recording: RecordingConfig,
}

/// Capture device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device handle handed to the frame source
    pub device: String,
    /// Requested resolution [width, height]
    pub resolution: [u32; 2],
    pub frame_rate: u32,
    /// Frames buffered for the preview consumer before new ones are dropped
    pub preview_queue: usize,
}

/// Recording configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Frame rate written into the container
    pub frame_rate: f64,
    /// Fixed output size [width, height]; follows the camera when unset
    pub frame_size: Option<[u32; 2]>,
    pub output_directory: String,
    /// JPEG quality for Motion JPEG output (1-100)
    pub jpeg_quality: u8,
    /// H.264 target bitrate in bits per second
    pub bitrate: u32,
    /// Put the MP4 index at the front of the file
    pub fast_start: bool,
    /// Capacity of the capture event channel
    pub event_queue: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            resolution: [640, 480],
            frame_rate: 30,
            preview_queue: 4,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let tuning = EncoderTuning::default();
        Self {
            frame_rate: 25.0,
            frame_size: None,
            output_directory: "./recordings".to_string(),
            jpeg_quality: tuning.jpeg_quality,
            bitrate: tuning.bitrate,
            fast_start: tuning.fast_start,
            event_queue: 64,
        }
    }
}

impl CaptureConfig {
    pub fn resolution(&self) -> FrameSize {
        FrameSize::from(self.resolution)
    }
}

impl RecordingConfig {
    pub fn frame_size(&self) -> Option<FrameSize> {
        self.frame_size.map(FrameSize::from)
    }

    /// Encoder settings for the built-in backends
    pub fn tuning(&self) -> EncoderTuning {
        EncoderTuning::default()
            .with_bitrate(self.bitrate)
            .with_jpeg_quality(self.jpeg_quality)
            .with_fast_start(self.fast_start)
    }
}

impl AppConfig {
    /// Load from a TOML file (if it exists) with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit environment map instead of the process environment
    pub fn load_with_env<P: AsRef<Path>>(
        path: P,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, CameraError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .map_err(|e| CameraError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| CameraError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        log::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::ConfigError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabcapture.toml")
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        Self::load(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), CameraError> {
        let invalid = |msg: &str| Err(CameraError::ConfigError(msg.to_string()));

        if self.capture.resolution().is_empty() {
            return invalid("capture resolution must be non-zero");
        }
        if self.capture.frame_rate == 0 || self.capture.frame_rate > 240 {
            return invalid("capture frame rate must be 1-240");
        }
        if self.capture.preview_queue == 0 {
            return invalid("preview queue must hold at least one frame");
        }

        let fps = self.recording.frame_rate;
        if !(fps.is_finite() && fps > 0.0 && fps <= 240.0) {
            return invalid("recording frame rate must be in (0, 240]");
        }
        if self.recording.frame_size().is_some_and(|s| s.is_empty()) {
            return invalid("recording frame size must be non-zero");
        }
        if self.recording.jpeg_quality == 0 || self.recording.jpeg_quality > 100 {
            return invalid("JPEG quality must be between 1 and 100");
        }
        if self.recording.bitrate == 0 {
            return invalid("bitrate must be non-zero");
        }
        if self.recording.event_queue == 0 {
            return invalid("event queue must hold at least one event");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.capture.resolution, [640, 480]);
        assert_eq!(config.recording.frame_rate, 25.0);
        assert_eq!(config.recording.frame_size, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = AppConfig::default();
        bad.capture.resolution = [0, 480];
        assert!(matches!(bad.validate(), Err(CameraError::ConfigError(_))));

        let mut bad = AppConfig::default();
        bad.recording.frame_rate = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = AppConfig::default();
        bad.recording.jpeg_quality = 101;
        assert!(bad.validate().is_err());

        let mut bad = AppConfig::default();
        bad.recording.frame_size = Some([320, 0]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("crabcapture.toml");

        let mut config = AppConfig::default();
        config.capture.device = "synthetic".to_string();
        config.recording.frame_size = Some([320, 240]);
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_with_env(&path, Some(HashMap::new())).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "[recording]\nframe_rate = 12.5\n").unwrap();

        let loaded = AppConfig::load_with_env(&path, Some(HashMap::new())).unwrap();
        assert_eq!(loaded.recording.frame_rate, 12.5);
        assert_eq!(loaded.capture, CaptureConfig::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.toml");
        fs::write(&path, "[recording]\nframe_rate = 12.5\n").unwrap();

        let env = HashMap::from([
            ("CAMREC_RECORDING__FRAME_RATE".to_string(), "30".to_string()),
            ("CAMREC_CAPTURE__DEVICE".to_string(), "synthetic".to_string()),
        ]);
        let loaded = AppConfig::load_with_env(&path, Some(env)).unwrap();
        assert_eq!(loaded.recording.frame_rate, 30.0);
        assert_eq!(loaded.capture.device, "synthetic");
    }

    #[test]
    fn test_invalid_file_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[recording]\njpeg_quality = 0\n").unwrap();

        let result = AppConfig::load_with_env(&path, Some(HashMap::new()));
        assert!(matches!(result, Err(CameraError::ConfigError(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let loaded = AppConfig::load_with_env("nonexistent_file.toml", Some(HashMap::new())).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("event_queue"));
    }
}
