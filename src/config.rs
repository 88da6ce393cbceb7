//! Configuration management for pipcorder
//!
//! Provides loading, saving and validation of the compositor layout, the
//! recording format and the storage location.

use crate::compositor::{Corner, PipLayout};
use crate::errors::CaptureError;
use crate::recording::{
    MimeConfiguration, RecordingQuality, DEFAULT_CHUNK_BYTES, MAX_FPS, MIN_FPS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipcorderConfig {
    pub compositor: CompositorConfig,
    pub recording: RecordingSettings,
    pub storage: StorageConfig,
}

/// Compositor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Render ticks per second, normally the display refresh rate
    pub refresh_rate_hz: u32,
    /// Overlay height is the surface height divided by this
    pub overlay_divisor: u32,
    /// Corner the overlay is anchored to
    pub corner: Corner,
    /// Overlay distance from the corner in pixels
    pub margin: u32,
}

/// Recording format configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// MIME type such as `video/webm; codecs=vp9`
    pub mime_type: String,
    /// Upper bound on recorded frames per second
    pub fps: f64,
    /// Quality preset
    pub quality: RecordingQuality,
    /// Encoded bytes buffered before a chunk is released
    pub chunk_bytes: usize,
}

/// Storage and file naming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory finished recordings are written to
    pub output_directory: String,
    /// Prefix of generated file names (`<prefix>-<millis>.<ext>`)
    pub filename_prefix: String,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        let layout = PipLayout::default();
        Self {
            refresh_rate_hz: 60,
            overlay_divisor: layout.divisor,
            corner: layout.corner,
            margin: layout.margin,
        }
    }
}

impl CompositorConfig {
    pub fn layout(&self) -> PipLayout {
        PipLayout {
            divisor: self.overlay_divisor,
            corner: self.corner,
            margin: self.margin,
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            mime_type: "video/x-motion-jpeg".to_string(),
            fps: 30.0,
            quality: RecordingQuality::High,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

impl RecordingSettings {
    /// Encoding configuration for a capture session
    pub fn mime_configuration(&self) -> Result<MimeConfiguration, CaptureError> {
        let mime = self.mime_type.parse()?;
        Ok(MimeConfiguration::from_quality(mime, self.quality)
            .with_fps(self.fps)
            .with_chunk_bytes(self.chunk_bytes))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_directory: "./recordings".to_string(),
            filename_prefix: "vid".to_string(),
        }
    }
}

impl PipcorderConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("Failed to read config file: {}", e)))?;

        let config: PipcorderConfig = toml::from_str(&contents)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CaptureError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string).map_err(|e| CaptureError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("pipcorder.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.compositor.refresh_rate_hz == 0 || self.compositor.refresh_rate_hz > 240 {
            return Err("Invalid refresh rate (must be 1-240)".to_string());
        }
        if self.compositor.overlay_divisor == 0 {
            return Err("Overlay divisor must be at least 1".to_string());
        }

        if let Err(e) = self.recording.mime_configuration() {
            return Err(e.to_string());
        }
        if !(MIN_FPS..=MAX_FPS).contains(&self.recording.fps) {
            return Err(format!(
                "Invalid recording FPS (must be {}-{})",
                MIN_FPS, MAX_FPS
            ));
        }
        if self.recording.chunk_bytes == 0 {
            return Err("Chunk size must be at least 1 byte".to_string());
        }

        if self.storage.filename_prefix.is_empty()
            || self
                .storage
                .filename_prefix
                .contains(|c: char| matches!(c, '/' | '\\'))
        {
            return Err("Filename prefix must be non-empty and contain no separators".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipcorderConfig::default();
        assert_eq!(config.compositor.refresh_rate_hz, 60);
        assert_eq!(config.compositor.layout(), PipLayout::default());
        assert_eq!(config.recording.mime_type, "video/x-motion-jpeg");
        assert_eq!(config.storage.filename_prefix, "vid");
    }

    #[test]
    fn test_config_validation() {
        let config = PipcorderConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_rate = config.clone();
        bad_rate.compositor.refresh_rate_hz = 0;
        assert!(bad_rate.validate().is_err());

        let mut bad_divisor = PipcorderConfig::default();
        bad_divisor.compositor.overlay_divisor = 0;
        assert!(bad_divisor.validate().is_err());

        let mut bad_mime = PipcorderConfig::default();
        bad_mime.recording.mime_type = "video/quicktime".to_string();
        assert!(bad_mime.validate().is_err());

        for fps in [0.0, 1e-30, 0.5, 240.5, f64::NAN] {
            let mut bad_fps = PipcorderConfig::default();
            bad_fps.recording.fps = fps;
            assert!(bad_fps.validate().is_err(), "fps {} accepted", fps);
        }

        let mut bad_prefix = PipcorderConfig::default();
        bad_prefix.storage.filename_prefix = "a/b".to_string();
        assert!(bad_prefix.validate().is_err());
    }

    #[test]
    fn test_config_toml_format() {
        let config = PipcorderConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[compositor]"));
        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("corner = \"bottom_right\""));
        assert!(toml_string.contains("quality = \"high\""));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: PipcorderConfig = toml::from_str(
            r#"
            [compositor]
            corner = "top_left"

            [recording]
            mime_type = "video/webm; codecs=vp9"
            "#,
        )
        .unwrap();
        assert_eq!(config.compositor.corner, Corner::TopLeft);
        assert_eq!(config.compositor.overlay_divisor, 3);
        assert_eq!(config.recording.fps, 30.0);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_mime_configuration_from_settings() {
        let settings = RecordingSettings {
            fps: 24.0,
            quality: RecordingQuality::Low,
            ..Default::default()
        };
        let mime = settings.mime_configuration().unwrap();
        assert_eq!(mime.fps, 24.0);
        assert_eq!(mime.jpeg_quality, 60);
        assert_eq!(mime.chunk_bytes, DEFAULT_CHUNK_BYTES);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = PipcorderConfig::load_from_file("nonexistent_file.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().compositor.refresh_rate_hz, 60);
    }
}
