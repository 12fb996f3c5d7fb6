//! Shared foundations for the kiosk peripheral agents: the error taxonomy,
//! fixed hardware tables, environment configuration and the validated
//! discount types produced by the scanner.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{KioskConfig, PrinterConfig, UsbId};
pub use error::{Error, ErrorClass, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
