//! Configuration file handling for qr-scanner.
//!
//! Loads configuration from `<config_dir>/qr-scanner/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::decoder::DecodeOptions;
use crate::media::{Facing, Resolution, StreamConstraints};

/// Configuration file structure for qr-scanner.
/// Loaded from <config_dir>/qr-scanner/config.toml (or custom path via --config).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CameraConfig {
    /// Device id to open; the rear-facing camera is picked when unset
    #[serde(default)]
    pub device: Option<String>,
    /// "environment" (rear) or "user" (front)
    #[serde(default = "default_facing")]
    pub facing: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            facing: default_facing(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScanConfig {
    /// "continuous" or "sampled"
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Tick of the sampled strategy
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Pause between attempts of the continuous strategy
    #[serde(default = "default_attempt_delay_ms")]
    pub attempt_delay_ms: u64,
    #[serde(default)]
    pub try_inverted: bool,
    /// Give up after this many seconds; 0 waits forever
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            frame_interval_ms: default_frame_interval_ms(),
            attempt_delay_ms: default_attempt_delay_ms(),
            try_inverted: false,
            timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ExportConfig {
    /// Where binary payloads are written; the working directory when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_facing() -> String {
    "environment".to_string()
}

fn default_width() -> u32 {
    Resolution::HIGH.width
}

fn default_height() -> u32 {
    Resolution::HIGH.height
}

fn default_fps() -> u32 {
    30
}

fn default_strategy() -> String {
    "continuous".to_string()
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_attempt_delay_ms() -> u64 {
    500
}

impl CameraConfig {
    /// Stream constraints for a session. Unknown facing names fall back to
    /// the rear camera.
    pub fn constraints(&self) -> StreamConstraints {
        let facing = match self.facing.to_ascii_lowercase().as_str() {
            "user" | "front" => Facing::User,
            _ => Facing::Environment,
        };
        StreamConstraints {
            device_id: self.device.clone(),
            facing,
            resolution: Resolution {
                width: self.width,
                height: self.height,
            },
            fps: self.fps,
        }
    }
}

impl ScanConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn attempt_delay(&self) -> Duration {
        Duration::from_millis(self.attempt_delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            try_inverted: self.try_inverted,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }

    /// Write the config to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        let io_error = |e: std::io::Error| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, content).map_err(io_error)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    SerializeError(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to access config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::SerializeError(source) => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::SerializeError(source) => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("qr-scanner").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/qr-scanner/config.toml")
        })
}
