//! Scanner presence supervision and code capture.
//!
//! # Architecture
//!
//! ```text
//!   ┌────────────┐  tick   ┌───────────────────┐
//!   │ Supervisor │────────►│ PresenceDetector  │
//!   │   task     │         └───────────────────┘
//!   └─────┬──────┘
//!         │ connect / disconnect
//!         ▼
//!   ┌────────────┐  keys   ┌───────────────────┐   completions
//!   │  Reader    │────────►│  ScannerState     │──────────────► broadcast
//!   │   task     │         │  (one mutex)      │
//!   └────────────┘         └───────────────────┘
//!                                   ▲
//!                    status / take_code / scan_once
//! ```
//!
//! The supervisor re-checks presence every tick. A transition flips
//! `connected`, publishes [`MonitorEvent::StatusChanged`] once the lock is
//! released, and then starts or stops the reader. At most one reader exists;
//! it owns the device handle and is joined before a new one is opened.
//!
//! # Examples
//!
//! ```no_run
//! use kiosk_scanner::{DeviceMonitor, MonitorConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> kiosk_core::Result<()> {
//!     let monitor = DeviceMonitor::new(MonitorConfig::default());
//!     monitor.start();
//!
//!     let scan = monitor.scan_once(Duration::from_secs(30)).await?;
//!     println!("Discount {}", scan.amount);
//!
//!     monitor.stop().await;
//!     Ok(())
//! }
//! ```

use crate::assembler::{CodeAssembler, Completion};
use crate::config::MonitorConfig;
use crate::detection::PresenceDetector;
use crate::keys::KeyEvent;
use crate::source::{AnyKeySource, KeySourceOpener};
use crate::traits::{KeySource, ScannerPresence};
use kiosk_core::constants::EVENT_CHANNEL_CAPACITY;
use kiosk_core::{DiscountAmount, Error, Result, ScanResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Notification published by the monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Scanner presence changed.
    StatusChanged {
        connected: bool,
        device: Option<String>,
    },

    /// A valid discount code was scanned.
    CodeScanned(ScanResult),

    /// A completed code failed validation and was discarded.
    CodeRejected { raw: String, reason: String },
}

/// Copy of the monitor state at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub connected: bool,
    pub running: bool,
    pub device: Option<String>,
    pub detected_by: Option<&'static str>,
    pub last_scan: Option<ScanResult>,
    pub total_scans: u64,
    pub current_discount: Option<DiscountAmount>,

    /// Characters of a partially typed code.
    pub buffered_chars: usize,
}

#[derive(Debug)]
struct ScannerState {
    connected: bool,
    running: bool,
    device: Option<String>,
    detected_by: Option<&'static str>,
    assembler: CodeAssembler,
    pending: Option<ScanResult>,
    last_scan: Option<ScanResult>,
    total_scans: u64,
    current_discount: Option<DiscountAmount>,
}

impl ScannerState {
    fn new(assembler: CodeAssembler) -> Self {
        Self {
            connected: false,
            running: false,
            device: None,
            detected_by: None,
            assembler,
            pending: None,
            last_scan: None,
            total_scans: 0,
            current_discount: None,
        }
    }

    fn record(&mut self, scan: &ScanResult) {
        self.total_scans += 1;
        self.current_discount = Some(scan.amount);
        self.last_scan = Some(scan.clone());
        self.pending = Some(scan.clone());
    }

    fn snapshot(&self) -> MonitorStatus {
        MonitorStatus {
            connected: self.connected,
            running: self.running,
            device: self.device.clone(),
            detected_by: self.detected_by,
            last_scan: self.last_scan.clone(),
            total_scans: self.total_scans,
            current_discount: self.current_discount,
            buffered_chars: self.assembler.buffer().len(),
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ScannerState>,
    events: broadcast::Sender<MonitorEvent>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ScannerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: MonitorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Supervision ended: nothing is watching the scanner any more.
    fn mark_stopped(&self) {
        let was_connected = {
            let mut state = self.state();
            let was_connected = state.connected;
            state.running = false;
            state.connected = false;
            state.device = None;
            state.detected_by = None;
            state.assembler.reset();
            was_connected
        };

        if was_connected {
            self.publish(MonitorEvent::StatusChanged {
                connected: false,
                device: None,
            });
        }
    }

    fn apply_key(&self, event: &KeyEvent) {
        let completion = {
            let mut state = self.state();
            let completion = state.assembler.feed(event);
            if let Some(Completion::Accepted(scan)) = &completion {
                state.record(scan);
            }
            completion
        };

        match completion {
            Some(Completion::Accepted(scan)) => self.publish(MonitorEvent::CodeScanned(scan)),
            Some(Completion::Rejected { raw, reason }) => {
                self.publish(MonitorEvent::CodeRejected { raw, reason })
            }
            None => {}
        }
    }
}

#[derive(Debug)]
struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Watches for a scanner and turns its keystrokes into discount codes.
#[derive(Debug)]
pub struct DeviceMonitor {
    shared: Arc<Shared>,
    detector: Arc<PresenceDetector>,
    opener: KeySourceOpener,
    config: MonitorConfig,
    control: Mutex<Option<Running>>,
}

impl DeviceMonitor {
    /// Monitor using the system strategies and event nodes.
    pub fn new(config: MonitorConfig) -> Self {
        let detector = PresenceDetector::from_config(&config);
        let opener = KeySourceOpener::Evdev {
            input_dir: config.input_dir.clone(),
            name_patterns: config.name_patterns.clone(),
        };
        Self::with_parts(config, detector, opener)
    }

    /// Monitor with explicit detection and key source backends.
    pub fn with_parts(
        config: MonitorConfig,
        detector: PresenceDetector,
        opener: KeySourceOpener,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let assembler = CodeAssembler::new(config.charset.clone());

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ScannerState::new(assembler)),
                events,
            }),
            detector: Arc::new(detector),
            opener,
            config,
            control: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start supervision in the background. Calling it while already running
    /// does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut control = self.control();
        if control.as_ref().is_some_and(|running| !running.task.is_finished()) {
            debug!("Scanner monitor already running");
            return;
        }

        let cancel = CancellationToken::new();
        let worker = Worker {
            shared: Arc::clone(&self.shared),
            detector: Arc::clone(&self.detector),
            opener: self.opener.clone(),
            tick_interval: self.config.tick_interval,
            error_backoff: self.config.error_backoff,
            cancel: cancel.clone(),
            reader: None,
        };

        self.shared.state().running = true;

        let shared = Arc::clone(&self.shared);
        let supervisor_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = tokio::spawn(worker.run()).await
                && e.is_panic()
            {
                error!("Scanner monitor loop panicked: {}", e);
            }
            // Releases a reader orphaned by a panic.
            supervisor_cancel.cancel();
            shared.mark_stopped();
        });

        *control = Some(Running { cancel, task });
    }

    /// Stop supervision and wait until the reader released its device.
    pub async fn stop(&self) {
        let running = self.control().take();
        if let Some(Running { cancel, task }) = running {
            cancel.cancel();
            if let Err(e) = task.await {
                error!("Scanner monitor supervisor failed: {}", e);
            }
        }
        self.shared.state().running = false;
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().running
    }

    pub fn status(&self) -> MonitorStatus {
        self.shared.state().snapshot()
    }

    /// Receive future notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.shared.events.subscribe()
    }

    /// Take the last scanned code, if nobody took it yet.
    pub fn take_code(&self) -> Option<ScanResult> {
        self.shared.state().pending.take()
    }

    /// Forget the current discount and any untaken code.
    pub fn clear_discount(&self) {
        let mut state = self.shared.state();
        state.current_discount = None;
        state.pending = None;
    }

    /// Run the presence strategies once, outside the supervision loop.
    pub async fn detect_once(&self) -> ScannerPresence {
        self.detector.detect().await
    }

    /// Wait for the next scanned code.
    ///
    /// # Errors
    /// - `Error::ScannerNotConnected` if no scanner is (or remains) connected
    /// - `Error::ScanTimeout` if nothing was scanned within `timeout`
    pub async fn scan_once(&self, timeout: Duration) -> Result<ScanResult> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut state = self.shared.state();
                if !state.connected {
                    return Err(Error::ScannerNotConnected);
                }
                if let Some(scan) = state.pending.take() {
                    return Ok(scan);
                }
                if Instant::now() >= deadline {
                    return Err(Error::scan_timeout(timeout));
                }
            }
            sleep(self.config.scan_poll_interval).await;
        }
    }

    fn control(&self) -> MutexGuard<'_, Option<Running>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        let control = self.control.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = control.take() {
            running.cancel.cancel();
        }
    }
}

struct Reader {
    device: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// State owned by the supervision loop.
struct Worker {
    shared: Arc<Shared>,
    detector: Arc<PresenceDetector>,
    opener: KeySourceOpener,
    tick_interval: Duration,
    error_backoff: Duration,
    cancel: CancellationToken,
    reader: Option<Reader>,
}

impl Worker {
    async fn run(mut self) {
        info!("Scanner monitoring started");

        loop {
            let delay = match self.tick().await {
                Ok(()) => self.tick_interval,
                Err(e) => {
                    error!("Scanner monitor tick failed: {}", e);
                    self.error_backoff
                }
            };

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = sleep(delay) => {}
            }
        }

        self.stop_reader().await;
        info!("Scanner monitoring stopped");
    }

    async fn tick(&mut self) -> Result<()> {
        let presence = self.detector.detect().await;
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        if self.apply_presence(&presence) {
            if presence.present {
                self.start_reader(presence.device.as_deref()).await?;
            } else {
                self.stop_reader().await;
            }
        } else if presence.present && !self.reader_alive() {
            self.stop_reader().await;
            debug!("Scanner connected without reader, reopening input");
            self.start_reader(presence.device.as_deref()).await?;
        }

        Ok(())
    }

    /// Record the presence; returns whether it changed.
    fn apply_presence(&self, presence: &ScannerPresence) -> bool {
        {
            let mut state = self.shared.state();
            if state.connected == presence.present {
                return false;
            }
            state.connected = presence.present;
            state.detected_by = presence.strategy;
            if !presence.present {
                state.device = None;
            }
        }

        if presence.present {
            info!(
                "QR scanner connected (detected by {})",
                presence.strategy.unwrap_or("unknown")
            );
        } else {
            info!("QR scanner disconnected");
        }
        self.shared.publish(MonitorEvent::StatusChanged {
            connected: presence.present,
            device: presence.device.clone(),
        });
        true
    }

    fn reader_alive(&self) -> bool {
        self.reader
            .as_ref()
            .is_some_and(|reader| !reader.task.is_finished())
    }

    async fn start_reader(&mut self, hint: Option<&str>) -> Result<()> {
        let source = self.opener.open(hint).await?;
        let device = source.device().to_string();

        {
            let mut state = self.shared.state();
            state.assembler.reset();
            state.device = Some(device.clone());
        }

        let cancel = self.cancel.child_token();
        let task = tokio::spawn(read_keys(source, Arc::clone(&self.shared), cancel.clone()));
        info!("Reading scanner input from {}", device);

        self.reader = Some(Reader {
            device,
            cancel,
            task,
        });
        Ok(())
    }

    async fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.cancel.cancel();
            if let Err(e) = reader.task.await
                && e.is_panic()
            {
                error!("Scanner reader for {} panicked: {}", reader.device, e);
            }
            info!("Stopped reading scanner input from {}", reader.device);
        }
        self.shared.state().assembler.reset();
    }
}

async fn read_keys(mut source: AnyKeySource, shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = source.next_event() => event,
        };

        match event {
            Ok(event) => shared.apply_key(&event),
            Err(e) => {
                warn!("Scanner input from {} failed: {}", source.device(), e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{AnyPresenceStrategy, MockPresence, MockPresenceHandle};
    use crate::keys::codes::*;
    use crate::source::MockKeyboard;
    use kiosk_core::constants::{MONITOR_ERROR_BACKOFF, MONITOR_TICK_INTERVAL};
    use tokio::sync::broadcast::error::TryRecvError;

    const SETTLE: Duration = Duration::from_millis(10);

    fn monitor() -> (DeviceMonitor, MockPresenceHandle, MockKeyboard) {
        let (presence, handle) = MockPresence::new();
        let keyboard = MockKeyboard::new();
        let monitor = DeviceMonitor::with_parts(
            MonitorConfig::default(),
            PresenceDetector::new(vec![AnyPresenceStrategy::Mock(presence)]),
            KeySourceOpener::Mock(keyboard.clone()),
        );
        (monitor, handle, keyboard)
    }

    fn status_changes(events: &mut broadcast::Receiver<MonitorEvent>) -> Vec<bool> {
        let mut changes = Vec::new();
        loop {
            match events.try_recv() {
                Ok(MonitorEvent::StatusChanged { connected, .. }) => changes.push(connected),
                Ok(_) => {}
                Err(TryRecvError::Empty) => return changes,
                Err(e) => panic!("unexpected receive error: {e:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_notify_once() {
        let (monitor, presence, keyboard) = monitor();
        let mut events = monitor.subscribe();
        monitor.start();

        sleep(SETTLE).await;
        assert!(status_changes(&mut events).is_empty());
        assert_eq!(keyboard.opens(), 0);

        presence.set_present(true);
        sleep(MONITOR_TICK_INTERVAL).await;
        assert_eq!(status_changes(&mut events), vec![true]);
        assert_eq!(keyboard.opens(), 1);
        assert!(monitor.status().connected);
        assert_eq!(monitor.status().detected_by, Some("mock"));

        sleep(MONITOR_TICK_INTERVAL * 3).await;
        assert!(status_changes(&mut events).is_empty());
        assert_eq!(keyboard.opens(), 1);
        assert_eq!(keyboard.closes(), 0);

        presence.set_present(false);
        sleep(MONITOR_TICK_INTERVAL).await;
        assert_eq!(status_changes(&mut events), vec![false]);
        assert_eq!(keyboard.closes(), 1);
        assert!(!monitor.status().connected);

        sleep(MONITOR_TICK_INTERVAL * 2).await;
        assert!(status_changes(&mut events).is_empty());

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let (monitor, presence, keyboard) = monitor();
        presence.set_present(true);

        monitor.start();
        monitor.start();
        sleep(SETTLE).await;

        assert_eq!(presence.checks(), 1);
        assert_eq!(keyboard.opens(), 1);
        assert!(monitor.is_running());

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_reader() {
        let (monitor, presence, keyboard) = monitor();
        presence.set_present(true);
        monitor.start();
        sleep(SETTLE).await;

        keyboard.send(KeyEvent::down(KEY_MINUS)).await.unwrap();
        sleep(SETTLE).await;
        assert_eq!(monitor.status().buffered_chars, 1);

        monitor.stop().await;
        let status = monitor.status();
        assert!(!status.running);
        assert_eq!(status.buffered_chars, 0);
        assert_eq!(keyboard.closes(), 1);

        let checks = presence.checks();
        sleep(MONITOR_TICK_INTERVAL * 3).await;
        assert_eq!(presence.checks(), checks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_once_returns_code() {
        let (monitor, presence, keyboard) = monitor();
        presence.set_present(true);
        monitor.start();
        sleep(SETTLE).await;

        keyboard.type_code("-1.50").await.unwrap();
        let scan = monitor.scan_once(Duration::from_secs(1)).await.unwrap();
        assert_eq!(scan.code, "-1.50");
        assert_eq!(scan.amount.cents(), 150);

        let status = monitor.status();
        assert_eq!(status.total_scans, 1);
        assert_eq!(status.current_discount.map(|d| d.cents()), Some(150));
        assert_eq!(status.last_scan.map(|s| s.id), Some(scan.id));
        assert_eq!(status.buffered_chars, 0);
        assert!(monitor.take_code().is_none());

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_once_not_connected() {
        let (monitor, _presence, _keyboard) = monitor();
        let result = monitor.scan_once(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::ScannerNotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_once_timeout() {
        let (monitor, presence, _keyboard) = monitor();
        presence.set_present(true);
        monitor.start();
        sleep(SETTLE).await;

        let started = Instant::now();
        let result = monitor.scan_once(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::ScanTimeout { timeout_ms: 1000 })));
        assert!(started.elapsed() >= Duration::from_secs(1));

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_code_is_not_recorded() {
        let (monitor, presence, keyboard) = monitor();
        let mut events = monitor.subscribe();
        presence.set_present(true);
        monitor.start();
        sleep(SETTLE).await;

        keyboard.type_code("99").await.unwrap();
        sleep(SETTLE).await;

        let status = monitor.status();
        assert_eq!(status.total_scans, 0);
        assert!(status.current_discount.is_none());
        assert!(monitor.take_code().is_none());

        let rejected = std::iter::from_fn(|| events.try_recv().ok())
            .find(|e| matches!(e, MonitorEvent::CodeRejected { .. }));
        assert_eq!(
            rejected,
            Some(MonitorEvent::CodeRejected {
                raw: "99".to_string(),
                reason: "missing leading minus sign".to_string(),
            })
        );

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discount() {
        let (monitor, presence, keyboard) = monitor();
        presence.set_present(true);
        monitor.start();
        sleep(SETTLE).await;

        keyboard.type_code("-5").await.unwrap();
        sleep(SETTLE).await;
        assert!(monitor.status().current_discount.is_some());

        monitor.clear_discount();
        let status = monitor.status();
        assert!(status.current_discount.is_none());
        assert_eq!(status.total_scans, 1);
        assert!(monitor.take_code().is_none());

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_reader_reopened_without_notification() {
        let (monitor, presence, keyboard) = monitor();
        let mut events = monitor.subscribe();
        presence.set_present(true);
        monitor.start();
        sleep(SETTLE).await;
        assert_eq!(status_changes(&mut events), vec![true]);

        keyboard.unplug();
        sleep(MONITOR_TICK_INTERVAL).await;

        assert_eq!(keyboard.opens(), 2);
        assert_eq!(keyboard.closes(), 1);
        assert!(status_changes(&mut events).is_empty());

        keyboard.type_code("-2").await.unwrap();
        let scan = monitor.scan_once(Duration::from_secs(1)).await.unwrap();
        assert_eq!(scan.amount.cents(), 200);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_backs_off() {
        let (monitor, presence, keyboard) = monitor();
        let mut events = monitor.subscribe();
        presence.set_present(true);
        keyboard.set_fail_open(true);
        monitor.start();

        sleep(SETTLE).await;
        assert_eq!(status_changes(&mut events), vec![true]);
        assert_eq!(presence.checks(), 1);

        sleep(MONITOR_TICK_INTERVAL).await;
        assert_eq!(presence.checks(), 1);

        keyboard.set_fail_open(false);
        sleep(MONITOR_ERROR_BACKOFF - MONITOR_TICK_INTERVAL).await;
        assert_eq!(presence.checks(), 2);
        assert_eq!(keyboard.opens(), 1);
        assert!(status_changes(&mut events).is_empty());

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_panic_is_contained() {
        let (monitor, presence, keyboard) = monitor();
        let mut events = monitor.subscribe();
        presence.set_present(true);
        monitor.start();
        sleep(SETTLE).await;
        assert!(monitor.status().connected);
        assert_eq!(status_changes(&mut events), vec![true]);

        presence.set_panicking(true);
        sleep(MONITOR_TICK_INTERVAL + SETTLE).await;

        let status = monitor.status();
        assert!(!status.running);
        assert!(!status.connected);
        assert!(status.device.is_none());
        assert!(status.detected_by.is_none());
        assert_eq!(keyboard.closes(), 1);
        assert_eq!(status_changes(&mut events), vec![false]);

        let started = Instant::now();
        let result = monitor.scan_once(Duration::from_secs(2)).await;
        assert!(matches!(result, Err(Error::ScannerNotConnected)));
        assert_eq!(started.elapsed(), Duration::ZERO);

        monitor.stop().await;

        presence.set_panicking(false);
        monitor.start();
        sleep(SETTLE).await;
        assert!(monitor.is_running());

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_connection() {
        let (monitor, presence, _keyboard) = monitor();
        let mut events = monitor.subscribe();
        presence.set_present(true);
        monitor.start();
        sleep(SETTLE).await;
        assert_eq!(status_changes(&mut events), vec![true]);

        monitor.stop().await;
        let status = monitor.status();
        assert!(!status.connected);
        assert!(status.device.is_none());
        assert_eq!(status_changes(&mut events), vec![false]);

        let result = monitor.scan_once(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::ScannerNotConnected)));

        // Presence is picked up again on restart.
        monitor.start();
        sleep(SETTLE).await;
        assert!(monitor.status().connected);
        assert_eq!(status_changes(&mut events), vec![true]);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_detect_once() {
        let (monitor, presence, _keyboard) = monitor();
        assert!(!monitor.detect_once().await.present);

        presence.set_present(true);
        presence.set_device(Some("/dev/input/event3"));
        let found = monitor.detect_once().await;
        assert_eq!(found.device.as_deref(), Some("/dev/input/event3"));
    }
}
