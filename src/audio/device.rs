//! Audio input device enumeration using cpal

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::DeviceId;
use serde::Serialize;
use std::str::FromStr;

/// An available audio input device
#[derive(Debug, Clone, Serialize)]
pub struct AudioDevice {
    /// Stable identifier, usable across restarts
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Whether this is the system default input device
    pub is_default: bool,
}

/// Display name for a device
///
/// `description()` is the primary method on cpal 0.17+, with the
/// deprecated `name()` as fallback.
pub fn device_display_name(device: &cpal::Device) -> String {
    device
        .description()
        .map(|desc| desc.name().to_string())
        .unwrap_or_else(|_| {
            #[allow(deprecated)]
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        })
}

/// List all available audio input devices
pub fn list_input_devices() -> Vec<AudioDevice> {
    let host = cpal::default_host();

    let default_device_id = host
        .default_input_device()
        .as_ref()
        .and_then(|d| d.id().ok())
        .map(|id| id.to_string());

    let devices: Vec<AudioDevice> = host
        .input_devices()
        .map(|device_iter| {
            device_iter
                .filter_map(|device| {
                    let device_id = device.id().ok()?.to_string();
                    Some(AudioDevice {
                        name: device_display_name(&device),
                        is_default: Some(&device_id) == default_device_id.as_ref(),
                        id: device_id,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    tracing::debug!("found {} input devices", devices.len());
    devices
}

/// Find an input device by its stable ID
fn find_input_device_by_id(id_str: &str) -> Option<cpal::Device> {
    let host = cpal::default_host();
    let device_id = DeviceId::from_str(id_str).ok()?;
    host.device_by_id(&device_id)
}

/// Resolve the input device to record from
///
/// Uses the configured device when it can still be found, otherwise falls
/// back to the system default.
pub fn resolve_input_device(device_id: Option<&str>) -> Option<cpal::Device> {
    if let Some(id) = device_id {
        if let Some(device) = find_input_device_by_id(id) {
            tracing::info!("using configured input device: {}", device_display_name(&device));
            return Some(device);
        }
        tracing::warn!(
            "configured input device '{}' not found, falling back to default",
            id
        );
    }

    let device = cpal::default_host().default_input_device();
    if let Some(ref d) = device {
        tracing::info!("using default input device: {}", device_display_name(d));
    } else {
        tracing::error!("no default input device available");
    }
    device
}
