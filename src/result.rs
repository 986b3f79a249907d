//! Scan results and the binary artifact export.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::decoder::Decoded;
use crate::error::ScanError;

/// The outcome of one successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Decoded text (lossy UTF-8 when the payload is binary)
    pub text: String,
    /// Raw payload, present only when it is not valid UTF-8
    pub raw_bytes: Option<Vec<u8>>,
    /// When the code was decoded
    pub timestamp: SystemTime,
}

impl ScanResult {
    /// Build a result from a decoded payload.
    pub fn from_payload(payload: Vec<u8>, timestamp: SystemTime) -> Self {
        match String::from_utf8(payload) {
            Ok(text) => Self {
                text,
                raw_bytes: None,
                timestamp,
            },
            Err(e) => {
                let bytes = e.into_bytes();
                Self {
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                    raw_bytes: Some(bytes),
                    timestamp,
                }
            }
        }
    }

    /// Build a result from a decoder's output, keeping its timestamp.
    pub fn from_decoded(decoded: Decoded) -> Self {
        Self::from_payload(decoded.payload, decoded.timestamp)
    }

    pub fn is_binary(&self) -> bool {
        self.raw_bytes.is_some()
    }

    /// Milliseconds since the UNIX epoch.
    pub fn timestamp_millis(&self) -> u128 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis()
    }

    /// File name of the binary artifact, `qr-data-<timestamp>.bin`.
    pub fn artifact_name(&self) -> String {
        format!("qr-data-{}.bin", self.timestamp_millis())
    }

    /// Write the raw payload to `dir`, creating it if needed.
    ///
    /// # Errors
    /// * `ScanError::ArtifactMissing` - If the result carries no raw bytes
    /// * `ScanError::Io` - If the directory or file cannot be written
    pub fn export_artifact(&self, dir: &Path) -> Result<PathBuf, ScanError> {
        let bytes = self.raw_bytes.as_ref().ok_or(ScanError::ArtifactMissing)?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.artifact_name());
        std::fs::write(&path, bytes)?;
        log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

/// Read an exported artifact back.
pub fn read_artifact(path: &Path) -> Result<Vec<u8>, ScanError> {
    Ok(std::fs::read(path)?)
}
