//! Environment-driven configuration for both agents.
//!
//! The kiosk is configured entirely through environment variables so the same
//! image can run against a serial, USB or network printer without rebuilding.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `ESC_POS_SERIAL_DEVICE` | explicit serial device path | unset |
//! | `ESC_POS_SERIAL_BAUD` | serial baud rate | `9600` |
//! | `ESC_POS_USB_VID` / `ESC_POS_USB_PID` | USB id override (hex or decimal) | unset |
//! | `ESC_POS_NETWORK_HOST` | network printer host | unset |
//! | `ESC_POS_NETWORK_PORT` | network printer port | `9100` |
//! | `ESC_POS_NETWORK_SCAN_PREFIX` | /24 prefix to sweep, e.g. `192.168.1.` | unset |
//! | `PRINTER_BIND` / `PRINTER_PORT` | printer agent address | `127.0.0.1:9101` |
//! | `QR_SCANNER_BIND` / `QR_SCANNER_PORT` | scanner agent address | `127.0.0.1:9102` |

use crate::{
    Result,
    constants::{
        DEFAULT_BIND, DEFAULT_NETWORK_PORT, DEFAULT_PRINTER_PORT, DEFAULT_SCANNER_PORT,
        DEFAULT_SERIAL_BAUD,
    },
    error::Error,
};
use serde::Serialize;
use std::path::PathBuf;

pub const ENV_SERIAL_DEVICE: &str = "ESC_POS_SERIAL_DEVICE";
pub const ENV_SERIAL_BAUD: &str = "ESC_POS_SERIAL_BAUD";
pub const ENV_USB_VID: &str = "ESC_POS_USB_VID";
pub const ENV_USB_PID: &str = "ESC_POS_USB_PID";
pub const ENV_NETWORK_HOST: &str = "ESC_POS_NETWORK_HOST";
pub const ENV_NETWORK_PORT: &str = "ESC_POS_NETWORK_PORT";
pub const ENV_NETWORK_SCAN_PREFIX: &str = "ESC_POS_NETWORK_SCAN_PREFIX";
pub const ENV_PRINTER_BIND: &str = "PRINTER_BIND";
pub const ENV_PRINTER_PORT: &str = "PRINTER_PORT";
pub const ENV_SCANNER_BIND: &str = "QR_SCANNER_BIND";
pub const ENV_SCANNER_PORT: &str = "QR_SCANNER_PORT";

/// USB vendor/product pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsbId {
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Hints for locating the printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrinterConfig {
    pub serial_device: Option<PathBuf>,
    pub serial_baud: u32,
    pub usb_override: Option<UsbId>,
    pub network_host: Option<String>,
    pub network_port: u16,
    pub network_scan_prefix: Option<String>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            serial_device: None,
            serial_baud: DEFAULT_SERIAL_BAUD,
            usb_override: None,
            network_host: None,
            network_port: DEFAULT_NETWORK_PORT,
            network_scan_prefix: None,
        }
    }
}

/// Address an agent listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindConfig {
    pub host: String,
    pub port: u16,
}

impl BindConfig {
    fn new(port: u16) -> Self {
        Self {
            host: DEFAULT_BIND.to_string(),
            port,
        }
    }

    /// `host:port` form.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Complete kiosk configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KioskConfig {
    pub printer: PrinterConfig,
    pub printer_bind: BindConfig,
    pub scanner_bind: BindConfig,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            printer: PrinterConfig::default(),
            printer_bind: BindConfig::new(DEFAULT_PRINTER_PORT),
            scanner_bind: BindConfig::new(DEFAULT_SCANNER_PORT),
        }
    }
}

impl KioskConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns `Error::Config` when a variable is present but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Examples
    ///
    /// ```
    /// use kiosk_core::config::KioskConfig;
    ///
    /// let config = KioskConfig::from_lookup(|key| match key {
    ///     "ESC_POS_SERIAL_DEVICE" => Some("/dev/ttyUSB0".to_string()),
    ///     "ESC_POS_USB_VID" => Some("0x0fe6".to_string()),
    ///     "ESC_POS_USB_PID" => Some("811e".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(config.printer.serial_baud, 9600);
    /// assert_eq!(config.printer.usb_override.unwrap().vendor_id, 0x0fe6);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        config.printer.serial_device = get(ENV_SERIAL_DEVICE).map(PathBuf::from);
        if let Some(baud) = get(ENV_SERIAL_BAUD) {
            config.printer.serial_baud = parse_number(ENV_SERIAL_BAUD, &baud)?;
        }

        config.printer.usb_override = match (get(ENV_USB_VID), get(ENV_USB_PID)) {
            (Some(vid), Some(pid)) => Some(UsbId {
                vendor_id: parse_usb_id(ENV_USB_VID, &vid)?,
                product_id: parse_usb_id(ENV_USB_PID, &pid)?,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::config(format!(
                    "{ENV_USB_VID} and {ENV_USB_PID} must be set together"
                )));
            }
        };

        config.printer.network_host = get(ENV_NETWORK_HOST);
        if let Some(port) = get(ENV_NETWORK_PORT) {
            config.printer.network_port = parse_number(ENV_NETWORK_PORT, &port)?;
        }
        config.printer.network_scan_prefix = get(ENV_NETWORK_SCAN_PREFIX);

        if let Some(host) = get(ENV_PRINTER_BIND) {
            config.printer_bind.host = host;
        }
        if let Some(port) = get(ENV_PRINTER_PORT) {
            config.printer_bind.port = parse_number(ENV_PRINTER_PORT, &port)?;
        }
        if let Some(host) = get(ENV_SCANNER_BIND) {
            config.scanner_bind.host = host;
        }
        if let Some(port) = get(ENV_SCANNER_PORT) {
            config.scanner_bind.port = parse_number(ENV_SCANNER_PORT, &port)?;
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(format!("{key}: invalid number {value:?}")))
}

/// Accepts `0x0fe6` or a bare four-digit hex id (`0fe6`); anything else is
/// read as decimal.
fn parse_usb_id(key: &str, value: &str) -> Result<u16> {
    let lower = value.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        u16::from_str_radix(hex, 16)
    } else if lower.len() == 4 {
        u16::from_str_radix(&lower, 16)
    } else {
        lower.parse()
    };
    parsed.map_err(|_| Error::config(format!("{key}: invalid USB id {value:?}")))
}
