//! Mock presence strategy for testing.

use crate::traits::{PresenceStrategy, ScannerPresence};
use kiosk_core::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub const NAME: &str = "mock";

#[derive(Debug, Default)]
struct Shared {
    present: AtomicBool,
    failing: AtomicBool,
    panicking: AtomicBool,
    checks: AtomicUsize,
    device: Mutex<Option<String>>,
}

/// Presence strategy whose answer is set through a [`MockPresenceHandle`].
///
/// # Examples
///
/// ```
/// use kiosk_scanner::detection::MockPresence;
/// use kiosk_scanner::traits::PresenceStrategy;
///
/// #[tokio::main]
/// async fn main() -> kiosk_core::Result<()> {
///     let (strategy, handle) = MockPresence::new();
///     assert!(!strategy.detect().await?.present);
///
///     handle.set_present(true);
///     assert!(strategy.detect().await?.present);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockPresence {
    shared: Arc<Shared>,
}

impl MockPresence {
    /// Create an absent mock scanner and its controlling handle.
    pub fn new() -> (Self, MockPresenceHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockPresenceHandle { shared },
        )
    }
}

impl PresenceStrategy for MockPresence {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn detect(&self) -> Result<ScannerPresence> {
        let shared = &self.shared;
        shared.checks.fetch_add(1, Ordering::SeqCst);

        if shared.panicking.load(Ordering::SeqCst) {
            panic!("mock presence strategy panicked");
        }
        if shared.failing.load(Ordering::SeqCst) {
            return Err(Error::detection(NAME, "simulated failure"));
        }
        if !shared.present.load(Ordering::SeqCst) {
            return Ok(ScannerPresence::absent());
        }

        let device = shared
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(ScannerPresence::found(NAME, device))
    }
}

/// Controls a [`MockPresence`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockPresenceHandle {
    shared: Arc<Shared>,
}

impl MockPresenceHandle {
    pub fn set_present(&self, present: bool) {
        self.shared.present.store(present, Ordering::SeqCst);
    }

    /// Make `detect` return a detection error.
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::SeqCst);
    }

    /// Make `detect` panic, to exercise supervisor recovery.
    pub fn set_panicking(&self, panicking: bool) {
        self.shared.panicking.store(panicking, Ordering::SeqCst);
    }

    /// Event node reported while present.
    pub fn set_device(&self, device: Option<&str>) {
        *self
            .shared
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = device.map(str::to_string);
    }

    /// Number of `detect` calls so far.
    pub fn checks(&self) -> usize {
        self.shared.checks.load(Ordering::SeqCst)
    }
}
