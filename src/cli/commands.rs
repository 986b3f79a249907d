//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::args::{ConfigAction, ScanOptions, Strategy};
use crate::config::{self, Config, ConfigError};
use crate::decoder::{ContinuousDecoder, FrameDecoder, RqrrDecoder, SampledDecoder};
use crate::error::ScanError;
use crate::media::{MediaSource, StillImageSource, StreamConstraints};
use crate::result::ScanResult;
use crate::session::ScanController;

/// Errors that end a subcommand.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Scan(#[from] ScanError),

    #[error("Failed to load image '{}': {source}", path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("No QR code found within {0} seconds")]
    TimedOut(u64),

    #[error("Unknown decode strategy '{0}' in config (expected continuous or sampled)")]
    UnknownStrategy(String),

    #[error("Camera support is not compiled in; rebuild with --features camera")]
    CameraUnavailable,

    #[error("Config file already exists: {}", .0.display())]
    ConfigExists(PathBuf),
}

/// Scan settings after merging CLI flags over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub strategy: Strategy,
    pub timeout: Option<Duration>,
    pub save_dir: PathBuf,
    pub try_inverted: bool,
}

impl ScanSettings {
    /// CLI args > config file > built-in defaults.
    pub fn resolve(config: &Config, options: &ScanOptions) -> Result<Self, CommandError> {
        let strategy = match options.strategy {
            Some(strategy) => strategy,
            None => Strategy::from_name(&config.scan.strategy)
                .ok_or_else(|| CommandError::UnknownStrategy(config.scan.strategy.clone()))?,
        };
        let timeout = options
            .timeout
            .map(Duration::from_secs)
            .or_else(|| config.scan.timeout());
        let save_dir = options
            .save_dir
            .clone()
            .or_else(|| config.export.dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            strategy,
            timeout,
            save_dir,
            try_inverted: options.inverted || config.scan.try_inverted,
        })
    }
}

/// Build the frame decoder for a strategy.
pub fn build_decoder(settings: &ScanSettings, config: &Config) -> Arc<dyn FrameDecoder> {
    let mut options = config.scan.decode_options();
    options.try_inverted = settings.try_inverted;
    match settings.strategy {
        Strategy::Continuous => Arc::new(ContinuousDecoder::with_options(
            RqrrDecoder::new(),
            options,
            config.scan.attempt_delay(),
        )),
        Strategy::Sampled => Arc::new(SampledDecoder::with_options(
            RqrrDecoder::new(),
            options,
            config.scan.frame_interval(),
        )),
    }
}

/// Scan from a camera until a code is found, the timeout passes or Ctrl-C.
#[cfg(feature = "camera")]
pub async fn run_scan(
    config: &Config,
    camera: Option<String>,
    options: &ScanOptions,
) -> Result<(), CommandError> {
    let settings = ScanSettings::resolve(config, options)?;
    let mut constraints = config.camera.constraints();
    if camera.is_some() {
        constraints.device_id = camera;
    }

    let media: Arc<dyn MediaSource> = Arc::new(crate::camera::CameraSource::new());
    let controller = ScanController::new(media, build_decoder(&settings, config), constraints);
    run_session(&controller, &settings).await
}

#[cfg(not(feature = "camera"))]
pub async fn run_scan(
    _config: &Config,
    _camera: Option<String>,
    _options: &ScanOptions,
) -> Result<(), CommandError> {
    Err(CommandError::CameraUnavailable)
}

/// Decode a QR code from an image file, replayed as a one-camera feed.
pub async fn run_decode(
    config: &Config,
    image: &Path,
    options: &ScanOptions,
) -> Result<(), CommandError> {
    let settings = ScanSettings::resolve(config, options)?;
    let source =
        StillImageSource::from_path(image, config.camera.fps).map_err(|e| CommandError::Image {
            path: image.to_path_buf(),
            source: e,
        })?;

    let media: Arc<dyn MediaSource> = Arc::new(source);
    let controller = ScanController::new(
        media,
        build_decoder(&settings, config),
        StreamConstraints::default(),
    );
    run_session(&controller, &settings).await
}

/// Run one session to its outcome and print it.
async fn run_session(
    controller: &ScanController,
    settings: &ScanSettings,
) -> Result<(), CommandError> {
    let stop = controller.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping scan...");
        stop.stop();
    }) {
        log::warn!("Could not install Ctrl+C handler: {}", e);
    }

    eprintln!(
        "Scanning ({} strategy), press Ctrl+C to stop...",
        controller.strategy()
    );
    let outcome = match settings.timeout {
        Some(limit) => match tokio::time::timeout(limit, controller.scan()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                controller.shutdown().await;
                return Err(CommandError::TimedOut(limit.as_secs()));
            }
        },
        None => controller.scan().await,
    };

    let result = match outcome {
        Ok(result) => result,
        Err(ScanError::Cancelled) => {
            eprintln!("Scan stopped.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    print_result(&result, &settings.save_dir)
}

/// Print the decoded text; binary payloads are also written to `save_dir`.
pub fn print_result(result: &ScanResult, save_dir: &Path) -> Result<(), CommandError> {
    println!("{}", result.text);
    for line in result_details(result) {
        eprintln!("{}", line);
    }
    if result.is_binary() {
        let path = result.export_artifact(save_dir)?;
        eprintln!("Binary payload saved to {}", path.display());
    }
    Ok(())
}

/// Lines describing a result besides its text.
pub fn result_details(result: &ScanResult) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(bytes) = &result.raw_bytes {
        lines.push(format!("Binary data detected ({} bytes)", bytes.len()));
    }
    lines.push(format!(
        "Scanned at {} (ms since UNIX epoch)",
        result.timestamp_millis()
    ));
    lines
}

/// List available cameras and print them to stdout.
#[cfg(feature = "camera")]
pub fn list_cameras() -> Result<(), CommandError> {
    let devices = crate::camera::list_devices().map_err(ScanError::from)?;
    let inputs = crate::media::video_inputs(devices);
    if inputs.is_empty() {
        println!("No cameras found.");
        println!();
        println!("Make sure your camera is connected and permissions are granted.");
        println!("On macOS, grant access in System Settings > Privacy & Security > Camera.");
    } else {
        println!("Available cameras:");
        for device in inputs {
            println!("  {}", device);
        }
        println!();
        println!("Use --camera <id> to select a camera.");
    }
    Ok(())
}

#[cfg(not(feature = "camera"))]
pub fn list_cameras() -> Result<(), CommandError> {
    Err(CommandError::CameraUnavailable)
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, path: Option<&Path>) -> Result<(), CommandError> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(config::default_path);
    match action {
        ConfigAction::Show => {
            let config = Config::load(Some(&config_path))?;
            if config_path.exists() {
                println!("# Config file: {} (exists)", config_path.display());
            } else {
                println!("# Config file: {} (not found, showing defaults)", config_path.display());
            }
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(CommandError::ConfigExists(config_path));
            }
            Config::default().save(&config_path)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}
