//! Mock keyboard for testing the monitor without input devices.

use crate::keys::{Charset, KeyEvent, codes};
use crate::traits::KeySource;
use kiosk_core::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Device name reported by mock sources.
pub const MOCK_DEVICE: &str = "mock-keyboard";

#[derive(Debug, Default)]
struct Shared {
    sender: Mutex<Option<mpsc::Sender<KeyEvent>>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    fail_open: AtomicBool,
}

/// Controller for mock key sources.
///
/// Every [`open`](MockKeyboard::open) creates a fresh source; keystrokes sent
/// through the controller go to the most recently opened one. Opens and
/// drops are counted so tests can check reader lifecycles.
///
/// # Examples
///
/// ```
/// use kiosk_scanner::source::MockKeyboard;
/// use kiosk_scanner::traits::KeySource;
///
/// #[tokio::main]
/// async fn main() -> kiosk_core::Result<()> {
///     let keyboard = MockKeyboard::new();
///     let mut source = keyboard.open()?;
///
///     keyboard.type_code("-5").await?;
///     let first = source.next_event().await?;
///     assert_eq!(first.code, kiosk_scanner::keys::codes::KEY_MINUS);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockKeyboard {
    shared: Arc<Shared>,
}

impl MockKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new source and route future keystrokes to it.
    ///
    /// # Errors
    /// Returns `Error::Device` while [`set_fail_open`](Self::set_fail_open)
    /// is enabled.
    pub fn open(&self) -> Result<MockKeySource> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(Error::device("mock keyboard unavailable"));
        }

        let (tx, rx) = mpsc::channel(64);
        *self.sender() = Some(tx);
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        Ok(MockKeySource {
            rx,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Send one key event to the current source.
    ///
    /// # Errors
    /// Returns `Error::Device` when no source is open.
    pub async fn send(&self, event: KeyEvent) -> Result<()> {
        let sender = self
            .sender()
            .clone()
            .ok_or_else(|| Error::device("no mock key source open"))?;
        sender
            .send(event)
            .await
            .map_err(|_| Error::device("mock key source closed"))
    }

    /// Press and release `code`.
    pub async fn press(&self, code: u16) -> Result<()> {
        self.send(KeyEvent::down(code)).await?;
        self.send(KeyEvent::up(code)).await
    }

    /// Type `text` with the standard charset, followed by Enter.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` for characters a scanner cannot type.
    pub async fn type_code(&self, text: &str) -> Result<()> {
        let charset = Charset::standard();
        for c in text.chars() {
            let code = charset
                .code_for(c)
                .ok_or_else(|| Error::invalid_request(format!("cannot type {c:?}")))?;
            self.press(code).await?;
        }
        self.press(codes::KEY_ENTER).await
    }

    /// Make the current source fail its next read, as if unplugged.
    pub fn unplug(&self) {
        self.sender().take();
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Number of sources opened so far.
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Number of sources dropped so far.
    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    fn sender(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<KeyEvent>>> {
        self.shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Key source fed by a [`MockKeyboard`].
#[derive(Debug)]
pub struct MockKeySource {
    rx: mpsc::Receiver<KeyEvent>,
    shared: Arc<Shared>,
}

impl KeySource for MockKeySource {
    async fn next_event(&mut self) -> Result<KeyEvent> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| Error::device("mock keyboard unplugged"))
    }

    fn device(&self) -> &str {
        MOCK_DEVICE
    }
}

impl Drop for MockKeySource {
    fn drop(&mut self) {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}
