//! Presence from the udev `input` subsystem.
//!
//! Scanners enumerate as keyboards, so any event node udev tags with
//! `ID_INPUT_KEY` or `ID_INPUT_KEYBOARD` counts. Devices whose name, vendor or
//! model looks like a scanner win over plain keyboards when choosing which
//! event node to read.

use super::match_pattern;
use crate::traits::{PresenceStrategy, ScannerPresence};
use kiosk_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const NAME: &str = "input";

/// udev properties marking a device as able to emit key events.
const KEY_PROPERTIES: [&str; 2] = ["ID_INPUT_KEY", "ID_INPUT_KEYBOARD"];

/// A key-capable `eventN` node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputDevice {
    /// Event node under the configured input directory.
    pub node: PathBuf,

    /// Kernel name of the device, e.g. `Honeywell Imaging 1900`.
    pub name: String,

    pub vendor: Option<String>,
    pub model: Option<String>,
}

impl InputDevice {
    /// Whether the name, vendor or model contains a scanner name fragment.
    pub fn looks_like_scanner(&self, patterns: &[String]) -> bool {
        [Some(&self.name), self.vendor.as_ref(), self.model.as_ref()]
            .into_iter()
            .flatten()
            .any(|text| match_pattern(text, patterns).is_some())
    }

    pub fn node_path(&self) -> String {
        self.node.display().to_string()
    }
}

fn property(device: &udev::Device, key: &str) -> Option<String> {
    device
        .property_value(key)
        .and_then(|value| value.to_str())
        // udev encodes spaces in ID_VENDOR / ID_MODEL as underscores
        .map(|value| value.replace('_', " "))
}

fn is_key_capable(device: &udev::Device) -> bool {
    KEY_PROPERTIES
        .iter()
        .any(|key| device.property_value(key).is_some_and(|value| value == "1"))
}

fn to_input_device(device: &udev::Device, input_dir: &Path) -> Option<InputDevice> {
    let node = device.devnode()?.file_name()?;
    if !node.to_string_lossy().starts_with("event") {
        return None;
    }

    // The human readable name sits on the parent `inputN` device.
    let name = device
        .parent()
        .and_then(|parent| {
            parent
                .attribute_value("name")
                .and_then(|value| value.to_str())
                .map(str::to_string)
        })
        .unwrap_or_default();

    Some(InputDevice {
        node: input_dir.join(node),
        name,
        vendor: property(device, "ID_VENDOR"),
        model: property(device, "ID_MODEL"),
    })
}

/// Key-capable event nodes currently known to udev, placed under `input_dir`.
///
/// Blocking. udev handles are not `Send`; use [`scan`] from async code.
pub fn enumerate(input_dir: &Path) -> Result<Vec<InputDevice>> {
    let udev_error = |e: std::io::Error| Error::detection(NAME, format!("udev: {e}"));

    let mut enumerator = udev::Enumerator::new().map_err(udev_error)?;
    enumerator.match_subsystem("input").map_err(udev_error)?;

    let devices = enumerator
        .scan_devices()
        .map_err(udev_error)?
        .filter(|device| is_key_capable(device))
        .filter_map(|device| to_input_device(&device, input_dir))
        .collect();

    Ok(devices)
}

/// [`enumerate`] on the blocking pool.
pub async fn scan(input_dir: &Path) -> Result<Vec<InputDevice>> {
    let input_dir = input_dir.to_path_buf();
    tokio::task::spawn_blocking(move || enumerate(&input_dir))
        .await
        .map_err(|e| Error::detection(NAME, e.to_string()))?
}

/// The device to read from: a scanner-looking one first, otherwise the first
/// keyboard.
pub fn pick_key_device<'a>(devices: &'a [InputDevice], patterns: &[String]) -> Option<&'a InputDevice> {
    devices
        .iter()
        .find(|d| d.looks_like_scanner(patterns))
        .or_else(|| devices.first())
}

/// Detects key-capable input devices.
#[derive(Debug, Clone)]
pub struct InputDevicesStrategy {
    input_dir: PathBuf,
    patterns: Vec<String>,
}

impl InputDevicesStrategy {
    pub fn new(input_dir: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            input_dir: input_dir.into(),
            patterns,
        }
    }
}

impl PresenceStrategy for InputDevicesStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn detect(&self) -> Result<ScannerPresence> {
        let devices = scan(&self.input_dir).await?;
        debug!("{} key-capable input devices", devices.len());

        Ok(match pick_key_device(&devices, &self.patterns) {
            Some(device) => {
                info!(
                    "Key-capable input device {:?} found at {}",
                    device.name,
                    device.node.display()
                );
                ScannerPresence::found(NAME, Some(device.node_path()))
            }
            None => ScannerPresence::absent(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<String> {
        kiosk_core::constants::SCANNER_NAME_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    fn device(node: &str, name: &str) -> InputDevice {
        InputDevice {
            node: PathBuf::from(node),
            name: name.to_string(),
            ..InputDevice::default()
        }
    }

    fn devices() -> Vec<InputDevice> {
        vec![
            device("/dev/input/event0", "Power Button"),
            device("/dev/input/event3", "AT Translated Set 2 keyboard"),
            device("/dev/input/event5", "Honeywell Imaging & Mobility 1900"),
        ]
    }

    #[test]
    fn test_scanner_name_wins() {
        let devices = devices();
        let chosen = pick_key_device(&devices, &patterns()).unwrap();
        assert_eq!(chosen.node_path(), "/dev/input/event5");
    }

    #[test]
    fn test_first_keyboard_without_name_match() {
        let devices = devices();
        let chosen = pick_key_device(&devices, &[]).unwrap();
        assert_eq!(chosen.node_path(), "/dev/input/event0");
        assert!(pick_key_device(&[], &patterns()).is_none());
    }

    #[test]
    fn test_vendor_and_model_match() {
        let by_vendor = InputDevice {
            vendor: Some("Zebra Technologies".to_string()),
            ..device("/dev/input/event7", "USB Keyboard")
        };
        let by_model = InputDevice {
            model: Some("Symbol Bar Code Scanner".to_string()),
            ..device("/dev/input/event8", "HID 05e0:1200")
        };
        assert!(by_vendor.looks_like_scanner(&patterns()));
        assert!(by_model.looks_like_scanner(&patterns()));
        assert!(!device("/dev/input/event1", "Sleep Button").looks_like_scanner(&patterns()));
    }

    #[test]
    fn test_enumerate_places_nodes_in_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        // Containers may have no udev database; whatever is reported must
        // still be an event node under the configured directory.
        if let Ok(devices) = enumerate(dir.path()) {
            for device in devices {
                assert!(device.node.starts_with(dir.path()), "{device:?}");
                let file = device.node.file_name().unwrap().to_string_lossy();
                assert!(file.starts_with("event"), "{device:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_strategy_reports_node() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = InputDevicesStrategy::new(dir.path(), patterns());

        if let Ok(presence) = strategy.detect().await {
            assert_eq!(presence.present, presence.device.is_some());
            if let Some(node) = presence.device {
                assert!(node.starts_with(&*dir.path().to_string_lossy()));
                assert_eq!(presence.strategy, Some(NAME));
            }
        }
    }
}
