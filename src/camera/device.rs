//! Camera device enumeration.

use nokhwa::query;
use nokhwa::utils::{ApiBackend, CameraIndex};

use crate::media::{DeviceInfo, MediaError};

/// List all camera devices on the system.
///
/// Device ids are the backend's indices rendered as strings; backends that
/// name devices by path or UID keep that string. If no cameras are found, returns an empty vector (not an error).
pub fn list_devices() -> Result<Vec<DeviceInfo>, MediaError> {
    let devices = query(ApiBackend::Auto).map_err(|e| MediaError::QueryFailed(e.to_string()))?;

    Ok(devices
        .into_iter()
        .map(|d| {
            let mut info = DeviceInfo::video_input(device_id(d.index()), d.human_name());
            info.description = d.description().to_string();
            info
        })
        .collect())
}

/// Device id for a backend index.
pub fn device_id(index: &CameraIndex) -> String {
    match index {
        CameraIndex::Index(i) => i.to_string(),
        CameraIndex::String(s) => s.clone(),
    }
}

/// Turn a device id produced by [`list_devices`] back into a backend index.
pub fn camera_index(id: &str) -> CameraIndex {
    match id.parse::<u32>() {
        Ok(i) => CameraIndex::Index(i),
        Err(_) => CameraIndex::String(id.to_string()),
    }
}
