//! Fixed tables and defaults for the kiosk peripherals.
//!
//! Everything here mirrors what a typical deployment looks like: a 58mm
//! thermal printer hanging off a USB-serial adapter, a USB printer from one of
//! a few common chipsets, or a networked printer on the raw port; and a
//! keyboard-emulating QR scanner.

use std::time::Duration;

// ============================================================================
// Printer transports
// ============================================================================

/// Default baud rate for serial printers.
pub const DEFAULT_SERIAL_BAUD: u32 = 9600;

/// Read timeout applied to serial transports.
pub const SERIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for USB bulk transfers.
pub const USB_TIMEOUT: Duration = Duration::from_secs(3);

/// Connect/write timeout for network printers.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(3);

/// Raw printing port (JetDirect / AppSocket).
pub const DEFAULT_NETWORK_PORT: u16 = 9100;

/// Per-host connect timeout while sweeping a subnet.
pub const SUBNET_CONNECT_TIMEOUT: Duration = Duration::from_millis(150);

/// Host numbers tried in a /24 subnet sweep.
pub const SUBNET_HOSTS: std::ops::RangeInclusive<u8> = 1..=254;

/// Known thermal printer chipsets as (vendor ID, product ID), tried in order.
///
/// # Examples
///
/// ```
/// use kiosk_core::constants::KNOWN_USB_PRINTERS;
///
/// assert_eq!(KNOWN_USB_PRINTERS[0], (0x0fe6, 0x811e));
/// ```
pub const KNOWN_USB_PRINTERS: &[(u16, u16)] = &[
    (0x0fe6, 0x811e), // Xprinter generic
    (0x0416, 0x5011), // Winbond/Nuvoton based
    (0x04b8, 0x0202), // Epson TM
];

/// Conventional serial device nodes: USB-serial adapters, then ACM, then
/// legacy UARTs.
pub const COMMON_SERIAL_PATHS: &[&str] = &[
    "/dev/ttyUSB0",
    "/dev/ttyUSB1",
    "/dev/ttyUSB2",
    "/dev/ttyUSB3",
    "/dev/ttyACM0",
    "/dev/ttyACM1",
    "/dev/ttyS0",
    "/dev/ttyS1",
];

/// Printable width of a 58mm roll in the default font.
pub const TICKET_WIDTH: usize = 32;

// ============================================================================
// Scanner
// ============================================================================

/// Name fragments identifying scanner hardware in device metadata.
pub const SCANNER_NAME_PATTERNS: &[&str] = &[
    "scanner",
    "qr",
    "barcode",
    "code reader",
    "honeywell",
    "symbol",
    "datalogic",
    "zebra",
    "cognex",
    "keyence",
    "omron",
];

/// Loose match for generic HID-class devices.
pub const GENERIC_HID_PATTERN: &str = "hid";

/// Interval between presence checks.
pub const MONITOR_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Interval used after a tick failed.
pub const MONITOR_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Polling interval of a blocking scan.
pub const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default timeout of a blocking scan.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest discount accepted, in cents (100.00).
pub const MAX_DISCOUNT_CENTS: u64 = 10_000;

/// Maximum number of fractional digits in a discount code.
pub const MAX_DISCOUNT_DECIMALS: usize = 2;

/// `/dev/input` always holds a couple of entries (`mice`, `by-path`) even
/// without any real input device attached.
pub const BASELINE_INPUT_ENTRIES: usize = 2;

/// Capacity of the monitor's notification channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Agents
// ============================================================================

/// Default bind address for both agents.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default port of the printer agent.
pub const DEFAULT_PRINTER_PORT: u16 = 9101;

/// Default port of the scanner agent.
pub const DEFAULT_SCANNER_PORT: u16 = 9102;
