//! Last-resort presence check: `lsusb` output and the `/dev/input` listing.
//!
//! Works on minimal systems without hidapi access or a udev database, at the price of
//! false positives: any machine with a few input nodes counts as "present".

use super::match_pattern;
use crate::traits::{PresenceStrategy, ScannerPresence};
use kiosk_core::constants::BASELINE_INPUT_ENTRIES;
use kiosk_core::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

pub const NAME: &str = "basic";

/// Default upper bound for the `lsusb` invocation.
pub const LSUSB_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct BasicStrategy {
    /// Program and arguments listing USB devices.
    lsusb: Vec<String>,
    timeout: Duration,
    input_dir: PathBuf,
    patterns: Vec<String>,
}

impl BasicStrategy {
    pub fn new(lsusb: Vec<String>, input_dir: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            lsusb,
            timeout: LSUSB_TIMEOUT,
            input_dir: input_dir.into(),
            patterns,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn usb_listing(&self) -> Result<String> {
        let (program, args) = self
            .lsusb
            .split_first()
            .ok_or_else(|| Error::detection(NAME, "empty lsusb command"))?;

        // A timed-out lsusb is killed when the output future is dropped.
        let listing = Command::new(program).args(args).kill_on_drop(true).output();
        let output = tokio::time::timeout(self.timeout, listing)
            .await
            .map_err(|_| Error::detection(NAME, format!("{program} timed out")))?
            .map_err(|e| Error::detection(NAME, format!("{program}: {e}")))?;

        if !output.status.success() {
            return Err(Error::detection(
                NAME,
                format!("{program} exited with {}", output.status),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn input_entries(&self) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.input_dir)
            .await
            .map_err(|e| Error::detection(NAME, format!("{}: {e}", self.input_dir.display())))?;

        let mut count = 0;
        while entries
            .next_entry()
            .await
            .map_err(|e| Error::detection(NAME, e.to_string()))?
            .is_some()
        {
            count += 1;
        }
        Ok(count)
    }
}

impl PresenceStrategy for BasicStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn detect(&self) -> Result<ScannerPresence> {
        let usb = self.usb_listing().await;
        match &usb {
            Ok(listing) => {
                if let Some(line) = listing
                    .lines()
                    .find(|line| match_pattern(line, &self.patterns).is_some())
                {
                    info!("QR scanner detected via lsusb: {}", line.trim());
                    return Ok(ScannerPresence::found(NAME, None));
                }
            }
            Err(e) => debug!("USB listing unavailable: {}", e),
        }

        match self.input_entries().await {
            Ok(count) if count > BASELINE_INPUT_ENTRIES => {
                info!("{} entries under {}", count, self.input_dir.display());
                Ok(ScannerPresence::found(NAME, None))
            }
            Ok(_) => Ok(ScannerPresence::absent()),
            // Only an error if neither source could be read.
            Err(e) => usb.map(|_| ScannerPresence::absent()).map_err(|_| e),
        }
    }
}
