//! Presence from HID device metadata (hidapi).

use super::{PatternMatch, match_descriptor};
use crate::traits::{PresenceStrategy, ScannerPresence};
use hidapi::HidApi;
use kiosk_core::{Error, Result};
use tracing::info;

pub const NAME: &str = "hid";

/// Matches HID manufacturer/product strings against scanner name fragments.
#[derive(Debug, Clone)]
pub struct HidStrategy {
    patterns: Vec<String>,
}

impl HidStrategy {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

impl PresenceStrategy for HidStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn detect(&self) -> Result<ScannerPresence> {
        let patterns = self.patterns.clone();
        // hidapi enumeration is blocking and walks sysfs
        tokio::task::spawn_blocking(move || enumerate(&patterns))
            .await
            .map_err(|e| Error::detection(NAME, e.to_string()))?
    }
}

fn enumerate(patterns: &[String]) -> Result<ScannerPresence> {
    let api = HidApi::new().map_err(|e| Error::detection(NAME, e.to_string()))?;

    for info in api.device_list() {
        let manufacturer = info.manufacturer_string().unwrap_or_default();
        let product = info.product_string().unwrap_or_default();

        if let Some(matched) = match_descriptor(manufacturer, product, patterns) {
            match matched {
                PatternMatch::Named(pattern) => info!(
                    "QR scanner detected via HID: {} {} ({:04x}:{:04x}, matched {:?})",
                    manufacturer,
                    product,
                    info.vendor_id(),
                    info.product_id(),
                    pattern
                ),
                PatternMatch::GenericHid => info!(
                    "Generic HID device detected: {} {} ({:04x}:{:04x})",
                    manufacturer,
                    product,
                    info.vendor_id(),
                    info.product_id()
                ),
            }
            return Ok(ScannerPresence::found(NAME, None));
        }
    }

    Ok(ScannerPresence::absent())
}
