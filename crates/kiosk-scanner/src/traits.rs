//! Trait seams between the monitor and the operating system.
//!
//! Both traits use native `async fn` (Edition 2024), so implementations are
//! dispatched through the `Any*` enums in [`crate::source`] and
//! [`crate::detection`] instead of trait objects.

#![allow(async_fn_in_trait)]

use crate::keys::KeyEvent;
use kiosk_core::Result;

/// Stream of key events from one input device.
pub trait KeySource {
    /// Wait for the next key event.
    ///
    /// # Errors
    /// Returns an error when the device went away or could not be read. The
    /// source is unusable afterwards.
    async fn next_event(&mut self) -> Result<KeyEvent>;

    /// Identifier of the underlying device (e.g. `/dev/input/event3`).
    fn device(&self) -> &str;
}

/// Result of one presence check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScannerPresence {
    pub present: bool,

    /// Event node readable as a key source, when the strategy knows one.
    pub device: Option<String>,

    /// Name of the strategy that produced a positive answer.
    pub strategy: Option<&'static str>,
}

impl ScannerPresence {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn found(strategy: &'static str, device: Option<String>) -> Self {
        Self {
            present: true,
            device,
            strategy: Some(strategy),
        }
    }
}

/// One way of deciding whether a scanner is attached.
pub trait PresenceStrategy {
    /// Short name used in logs and status.
    fn name(&self) -> &'static str;

    /// Run the check once.
    ///
    /// # Errors
    /// Returns `Error::Detection` when the check itself could not run. The
    /// detector treats that as "not detected by this strategy".
    async fn detect(&self) -> Result<ScannerPresence>;
}
