//! Caller-facing scanner operations.
//!
//! Thin layer over a [`DeviceMonitor`] producing the serializable answers an
//! outer surface (HTTP, CLI) hands back to its callers.

use crate::config::MonitorConfig;
use crate::monitor::DeviceMonitor;
use chrono::{DateTime, Utc};
use kiosk_core::constants::DEFAULT_SCAN_TIMEOUT;
use kiosk_core::{DiscountAmount, Health, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Service name reported by [`ScannerService::health`].
pub const SERVICE_NAME: &str = "qr-scanner-agent";

/// Scanner and discount status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerStatus {
    pub scanner_connected: bool,
    pub last_qr_code: Option<String>,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub total_scans: u64,
    pub current_discount: Option<DiscountAmount>,
    pub monitoring: bool,
    pub scanner_device: Option<String>,
    pub detected_by: Option<&'static str>,
}

/// Result of an on-demand presence check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerCheck {
    pub connected: bool,
    pub device: Option<String>,
    pub detected_by: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountInfo {
    pub discount_amount: Option<DiscountAmount>,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// A code returned by [`ScannerService::scan`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub qr_code: String,
    pub discount_amount: DiscountAmount,
    pub timestamp: DateTime<Utc>,
}

/// Scanner agent operations. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ScannerService {
    monitor: Arc<DeviceMonitor>,
}

impl ScannerService {
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_monitor(DeviceMonitor::new(config))
    }

    pub fn with_monitor(monitor: DeviceMonitor) -> Self {
        Self {
            monitor: Arc::new(monitor),
        }
    }

    pub fn monitor(&self) -> &DeviceMonitor {
        &self.monitor
    }

    pub fn status(&self) -> ScannerStatus {
        let status = self.monitor.status();
        let last_scan = status.last_scan;

        ScannerStatus {
            scanner_connected: status.connected,
            last_qr_code: last_scan.as_ref().map(|scan| scan.code.clone()),
            last_scan_time: last_scan.as_ref().map(|scan| scan.scanned_at),
            total_scans: status.total_scans,
            current_discount: status.current_discount,
            monitoring: status.running,
            scanner_device: status.device,
            detected_by: status.detected_by,
        }
    }

    /// Run one presence pass now, independent of the monitor loop.
    pub async fn check_scanner(&self) -> ScannerCheck {
        let presence = self.monitor.detect_once().await;
        ScannerCheck {
            connected: presence.present,
            device: presence.device,
            detected_by: presence.strategy,
        }
    }

    pub fn current_discount(&self) -> DiscountInfo {
        let status = self.monitor.status();
        DiscountInfo {
            discount_amount: status.current_discount,
            last_scan_time: status.last_scan.map(|scan| scan.scanned_at),
            timestamp: Utc::now(),
        }
    }

    pub fn clear_discount(&self) {
        self.monitor.clear_discount();
        info!("Discount cleared");
    }

    /// Wait for one code, up to `timeout` (30 s when `None`).
    ///
    /// # Errors
    /// - `Error::ScannerNotConnected` if no scanner is connected
    /// - `Error::ScanTimeout` if nothing was scanned in time
    pub async fn scan(&self, timeout: Option<Duration>) -> Result<ScanOutcome> {
        let scan = self
            .monitor
            .scan_once(timeout.unwrap_or(DEFAULT_SCAN_TIMEOUT))
            .await?;

        Ok(ScanOutcome {
            qr_code: scan.code,
            discount_amount: scan.amount,
            timestamp: scan.scanned_at,
        })
    }

    pub fn start_monitoring(&self) {
        self.monitor.start();
    }

    pub async fn stop_monitoring(&self) {
        self.monitor.stop().await;
    }

    pub fn health(&self) -> Health {
        Health::ok(SERVICE_NAME)
    }
}
