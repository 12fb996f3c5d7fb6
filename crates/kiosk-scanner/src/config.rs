//! Monitor configuration.

use crate::detection::StrategyKind;
use crate::detection::basic::LSUSB_TIMEOUT;
use crate::keys::Charset;
use kiosk_core::constants::{
    MONITOR_ERROR_BACKOFF, MONITOR_TICK_INTERVAL, SCAN_POLL_INTERVAL, SCANNER_NAME_PATTERNS,
};
use std::path::PathBuf;
use std::time::Duration;

/// Directory holding the input event nodes.
pub const DEFAULT_INPUT_DIR: &str = "/dev/input";

/// Timing, matching and detection settings of a [`DeviceMonitor`](crate::DeviceMonitor).
///
/// # Examples
///
/// ```
/// use kiosk_scanner::{MonitorConfig, detection::StrategyKind, keys::Charset};
/// use std::time::Duration;
///
/// let config = MonitorConfig {
///     tick_interval: Duration::from_secs(1),
///     charset: Charset::default().with_keypad(),
///     strategies: vec![StrategyKind::InputDevices],
///     ..MonitorConfig::default()
/// };
/// assert_eq!(config.error_backoff, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Delay between presence checks.
    pub tick_interval: Duration,

    /// Delay after a failed tick.
    pub error_backoff: Duration,

    /// Polling interval of a blocking scan.
    pub scan_poll_interval: Duration,

    /// Keys accepted as code characters.
    pub charset: Charset,

    /// Name fragments identifying scanner hardware, lowercase.
    pub name_patterns: Vec<String>,

    /// Directory holding the event nodes read by the monitor.
    pub input_dir: PathBuf,

    /// Program and arguments listing USB devices.
    pub lsusb_command: Vec<String>,

    /// Time allowed for the USB listing before it is killed.
    pub lsusb_timeout: Duration,

    /// Presence strategies, in the order they are tried.
    pub strategies: Vec<StrategyKind>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: MONITOR_TICK_INTERVAL,
            error_backoff: MONITOR_ERROR_BACKOFF,
            scan_poll_interval: SCAN_POLL_INTERVAL,
            charset: Charset::default(),
            name_patterns: SCANNER_NAME_PATTERNS.iter().map(|p| p.to_string()).collect(),
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            lsusb_command: vec!["lsusb".to_string()],
            lsusb_timeout: LSUSB_TIMEOUT,
            strategies: StrategyKind::ALL.to_vec(),
        }
    }
}
