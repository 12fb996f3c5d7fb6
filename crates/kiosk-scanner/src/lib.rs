//! QR scanner side of the kiosk agents.
//!
//! A keyboard-wedge scanner types its payload as key presses ending with
//! Enter. [`DeviceMonitor`] keeps checking whether such a device is attached,
//! reads its key events while it is, and feeds them to a [`CodeAssembler`]
//! that turns complete buffers into validated discount codes.
//! [`ScannerService`] wraps the monitor for callers.

pub mod assembler;
pub mod config;
pub mod detection;
pub mod keys;
pub mod monitor;
pub mod service;
pub mod source;
pub mod traits;

pub use assembler::{AssemblerState, CodeAssembler, Completion};
pub use config::MonitorConfig;
pub use monitor::{DeviceMonitor, MonitorEvent, MonitorStatus};
pub use service::{DiscountInfo, ScanOutcome, ScannerCheck, ScannerService, ScannerStatus};
