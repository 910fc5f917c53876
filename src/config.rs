//! Application configuration
//!
//! Every section has defaults so the service runs without a config file.
//! Values are read from TOML and may be overridden from the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub static_files: StaticConfig,
    pub camera: CameraConfig,
    pub imaging: ImagingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub http_port: u16,
    /// Upper bound on requests handled at once
    pub max_simultaneous_requests: usize,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            max_simultaneous_requests: DEFAULT_MAX_REQUESTS,
            debug: false,
        }
    }
}

/// Static file serving for a bundled dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("static"),
        }
    }
}

/// Which camera driver to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Vendor `rpicam-*` command line tools
    Rpicam,
    /// Synthetic test pattern, no hardware required
    Mock,
}

/// Camera driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: BackendKind,
    pub still_command: String,
    pub video_command: String,
    /// Extra slack on top of settle and exposure time before a capture is
    /// abandoned
    pub capture_timeout_secs: u64,
    pub still_width: u32,
    pub still_height: u32,
    pub video_width: u32,
    pub video_height: u32,
    pub video_framerate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Rpicam,
            still_command: "rpicam-still".to_string(),
            video_command: "rpicam-vid".to_string(),
            capture_timeout_secs: DEFAULT_CAPTURE_TIMEOUT_SECS,
            still_width: DEFAULT_STILL_WIDTH,
            still_height: DEFAULT_STILL_HEIGHT,
            video_width: DEFAULT_VIDEO_WIDTH,
            video_height: DEFAULT_VIDEO_HEIGHT,
            video_framerate: DEFAULT_VIDEO_FRAMERATE,
        }
    }
}

/// Post-processing and encoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingConfig {
    pub font_path: PathBuf,
    pub text_size: u32,
    pub text_color: String,
    pub jpeg_quality: u8,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from(DEFAULT_FONT_PATH),
            text_size: DEFAULT_TEXT_SIZE,
            text_color: "white".to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or from the per-user config file when
    /// no path is given. Falls back to defaults if neither exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        tracing::info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Per-user config location, e.g. `~/.config/picam-web/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "picam-web")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.http_port == 0 {
            return Err(Error::Config("http_port must be non-zero".into()));
        }
        if self.server.max_simultaneous_requests == 0 {
            return Err(Error::Config(
                "max_simultaneous_requests must be at least 1".into(),
            ));
        }
        let cam = &self.camera;
        if cam.still_width == 0 || cam.still_height == 0 {
            return Err(Error::Config("still resolution must be non-zero".into()));
        }
        if cam.video_width == 0 || cam.video_height == 0 || cam.video_framerate == 0 {
            return Err(Error::Config(
                "video resolution and framerate must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.imaging.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.imaging.jpeg_quality
            )));
        }
        Ok(())
    }
}
