use cpal::traits::{DeviceTrait, HostTrait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeviceKind {
    Physical,
    Virtual,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub kind: DeviceKind,
}

impl AudioDevice {
    pub fn is_virtual(&self) -> bool {
        self.kind == DeviceKind::Virtual
    }
}

const VIRTUAL_DEVICE_PATTERNS: &[&str] = &[
    "blackhole",
    "soundflower",
    "loopback",
    "virtual",
    "vb-audio",
    "voicemeeter",
    "cable",
];

pub(crate) fn is_virtual_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIRTUAL_DEVICE_PATTERNS.iter().any(|p| lower.contains(p))
}

fn detect_kind(name: &str) -> DeviceKind {
    if is_virtual_name(name) {
        DeviceKind::Virtual
    } else {
        DeviceKind::Physical
    }
}

pub fn list_devices() -> crate::Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host.input_devices()? {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        devices.push(AudioDevice {
            id: name.clone(),
            is_default: default_name.as_ref() == Some(&name),
            kind: detect_kind(&name),
            name,
        });
    }
    Ok(devices)
}

pub fn get_default_device() -> crate::Result<Option<AudioDevice>> {
    let host = cpal::default_host();
    Ok(host.default_input_device().map(|device| {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        AudioDevice {
            id: name.clone(),
            is_default: true,
            kind: detect_kind(&name),
            name,
        }
    }))
}

pub fn find_virtual_device() -> crate::Result<Option<AudioDevice>> {
    Ok(list_devices()?.into_iter().find(|d| d.is_virtual()))
}

pub fn find_device_by_id(id: &str) -> crate::Result<Option<AudioDevice>> {
    Ok(list_devices()?.into_iter().find(|d| d.id == id))
}
