use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::Result;
use crate::fingers::DEFAULT_EXTENSION_THRESHOLD;
use crate::types::ImageFormat;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub finger_threshold: f32,
    pub countdown_seconds: u32,
    pub countdown_interval_ms: u64,
    pub image_format: ImageFormat,
    pub jpeg_quality: u8,
    pub frame_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub mirror: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: String,
    pub min_confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            finger_threshold: DEFAULT_EXTENSION_THRESHOLD,
            countdown_seconds: 3,
            countdown_interval_ms: 1000,
            image_format: ImageFormat::Jpeg,
            jpeg_quality: 90,
            frame_interval_ms: 33,
        }
    }
}

impl CaptureConfig {
    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            mirror: true,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "hand_landmark.onnx".to_string(),
            min_confidence: 0.5,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "captures".to_string(),
        }
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "rusty_snap.json";

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            // Missing fields fall back to Default via #[serde(default)]
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    info!(path = %path.display(), "loaded configuration");
                    c
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "config parse failed, using defaults");
                    Self::default()
                }
            }
        } else {
            info!(path = %path.display(), "configuration file not found, creating default");
            Self::default()
        };

        // Write back so new fields show up in the file
        config.save(path)?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.capture.countdown_seconds, 3);
        assert!((config.capture.finger_threshold - 0.03).abs() < f32::EPSILON);
        assert!(path.exists(), "default config should be written back");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "capture": { "countdown_seconds": 5, "image_format": "png" } }"#)
            .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.capture.countdown_seconds, 5);
        assert_eq!(config.capture.image_format, ImageFormat::Png);
        assert_eq!(config.capture.countdown_interval_ms, 1000);
        assert_eq!(config.output.dir, "captures");

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("frame_interval_ms"));
    }

    #[test]
    fn test_garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.detector.model_path, "hand_landmark.onnx");
    }
}
