//! Descriptions of the ways a printer can be reached.
//!
//! A [`TransportSpec`] is plain data: building one never touches hardware.
//! Specs are built from configuration or from the fixed candidate tables in
//! `kiosk_core::constants` and are consumed once by an opener.

use kiosk_core::constants::{NETWORK_TIMEOUT, SERIAL_TIMEOUT, USB_TIMEOUT};
use serialport::{DataBits, Parity, StopBits};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Transport family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Serial,
    Usb,
    Network,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Usb => write!(f, "usb"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Serial line settings. Thermal printers are always 8N1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSpec {
    pub path: PathBuf,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub timeout: Duration,
}

impl SerialSpec {
    pub fn new(path: impl Into<PathBuf>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: SERIAL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbSpec {
    pub vendor_id: u16,
    pub product_id: u16,
    pub timeout: Duration,
}

impl UsbSpec {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            timeout: USB_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl NetworkSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: NETWORK_TIMEOUT,
        }
    }

    /// `host:port` form used for connecting and logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One way to reach a printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSpec {
    Serial(SerialSpec),
    Usb(UsbSpec),
    Network(NetworkSpec),
}

impl TransportSpec {
    pub fn serial(path: impl Into<PathBuf>, baud_rate: u32) -> Self {
        Self::Serial(SerialSpec::new(path, baud_rate))
    }

    pub fn usb(vendor_id: u16, product_id: u16) -> Self {
        Self::Usb(UsbSpec::new(vendor_id, product_id))
    }

    pub fn network(host: impl Into<String>, port: u16) -> Self {
        Self::Network(NetworkSpec::new(host, port))
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Serial(_) => TransportKind::Serial,
            Self::Usb(_) => TransportKind::Usb,
            Self::Network(_) => TransportKind::Network,
        }
    }
}

impl fmt::Display for TransportSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(s) => write!(f, "serial {} @ {} baud", s.path.display(), s.baud_rate),
            Self::Usb(u) => write!(f, "usb {:04x}:{:04x}", u.vendor_id, u.product_id),
            Self::Network(n) => write!(f, "network {}", n.address()),
        }
    }
}
