//! CLI argument parsing with clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Scan QR codes from a camera or an image file
#[derive(Parser, Debug)]
#[command(name = "qr-scanner")]
#[command(version, about = "Scan QR codes from a camera or an image", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Scan with the rear (or only) camera
    qr-scanner scan

    # Pick a camera and give up after 30 seconds
    qr-scanner scan --camera 1 --timeout 30

    # Decode a screenshot
    qr-scanner decode ticket.png --save-dir ./out")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan from a camera until a code is found (Ctrl-C stops)
    Scan {
        /// Camera device id (from list-cameras)
        #[arg(long)]
        camera: Option<String>,
        #[command(flatten)]
        options: ScanOptions,
    },
    /// Decode a QR code from an image file
    Decode {
        /// Image to read (PNG, JPEG, ...)
        image: PathBuf,
        #[command(flatten)]
        options: ScanOptions,
    },
    /// List available cameras
    ListCameras,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags shared by `scan` and `decode`. Unset flags fall back to the config
/// file.
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct ScanOptions {
    /// Decode strategy
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory for binary payloads (qr-data-<timestamp>.bin)
    #[arg(long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,

    /// Also try light-on-dark codes
    #[arg(long)]
    pub inverted: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

/// How frames reach the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Strategy {
    /// Decode frames as the camera delivers them
    #[default]
    Continuous,
    /// Sample a frame on a fixed tick
    Sampled,
}

impl Strategy {
    /// Parse a strategy name from the config file.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::from_str(name, true).ok()
    }
}
