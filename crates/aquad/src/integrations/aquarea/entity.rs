use super::device::Device;
use super::device::MANUFACTURER;
use crate::engine;
use crate::engine::Platform;

pub const INTEGRATION_NAME: &str = "aquarea";

/// Identity shared by every Aquarea entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    /// Engine entity id, e.g. `water_heater.heat_pump_tank`
    pub entity_id: String,
    /// Stable id, `<device_id>_<key>`
    pub unique_id: String,
    pub name: String,
    pub device_id: String,
}

impl EntityInfo {
    pub fn new(platform: Platform, device: &Device, key: &str, name: &str) -> Self {
        Self {
            entity_id: format!("{}.{}_{}", platform, slugify(device.name()), key),
            unique_id: format!("{}_{}", device.device_id(), key),
            name: name.to_string(),
            device_id: device.device_id().to_string(),
        }
    }
}

/// Lowercase `name`, collapsing every run of other characters into `_`
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Device registry entry for an Aquarea device
pub fn device_entry(device: &Device) -> engine::Device {
    let mut entry = engine::Device::new(device.device_id().to_string(), device.name().to_string());
    entry.identifiers = vec![(INTEGRATION_NAME.to_string(), device.device_id().to_string())];
    entry.manufacturer = Some(MANUFACTURER.to_string());
    entry.model = Some(device.info.model.clone());
    entry.sw_version = Some(device.info.firmware_version.clone());
    entry
}
