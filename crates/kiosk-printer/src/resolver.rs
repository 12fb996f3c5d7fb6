//! Ordered discovery of a working printer transport.
//!
//! # Resolution order
//!
//! Candidates are tried in a fixed priority order, mirroring how kiosks are
//! actually wired:
//!
//! ```text
//! 1. explicit serial device      (ESC_POS_SERIAL_DEVICE)
//! 2. USB sweep                   (ESC_POS_USB_VID/PID override, then known chipsets)
//! 3. common serial paths         (/dev/ttyUSB*, /dev/ttyACM*, /dev/ttyS*)
//! 4. explicit network host       (ESC_POS_NETWORK_HOST)
//! 5. subnet sweep                (ESC_POS_NETWORK_SCAN_PREFIX + 1..=254)
//! ```
//!
//! The first candidate that opens wins; later candidates are never touched.
//! A failing candidate is logged and remembered as the last error, and the
//! sweep moves on. Only when every candidate failed does the caller see
//! `Error::NoTransportFound`.
//!
//! An explicitly configured serial device that fails to open does not abort
//! resolution: it is treated like any other candidate.
//!
//! # Examples
//!
//! ```no_run
//! use kiosk_core::PrinterConfig;
//! use kiosk_printer::TransportResolver;
//! use std::io::Write;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = TransportResolver::new(PrinterConfig::default());
//! let mut printer = resolver.resolve()?;
//! printer.write_all(b"\x1b@Hello\n")?;
//! # Ok(())
//! # }
//! ```

use crate::opener::{SystemOpener, TransportOpener};
use crate::transport::TransportSpec;
use kiosk_core::constants::{
    COMMON_SERIAL_PATHS, KNOWN_USB_PRINTERS, SUBNET_HOSTS, SUBNET_CONNECT_TIMEOUT,
};
use kiosk_core::{Error, PrinterConfig, Result};
use tracing::{debug, info, warn};

/// One step of the resolution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Open this transport directly.
    Direct(TransportSpec),

    /// Connect to `prefix + i` for `i` in 1..=254 and open the first host that
    /// accepts a connection on `port`.
    SubnetScan { prefix: String, port: u16 },
}

/// Resolves printer hints into one open transport.
#[derive(Debug, Clone)]
pub struct TransportResolver<O = SystemOpener> {
    config: PrinterConfig,
    opener: O,
}

impl TransportResolver<SystemOpener> {
    /// Resolver using real hardware.
    pub fn new(config: PrinterConfig) -> Self {
        Self::with_opener(config, SystemOpener)
    }
}

impl<O: TransportOpener> TransportResolver<O> {
    pub fn with_opener(config: PrinterConfig, opener: O) -> Self {
        Self { config, opener }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    /// The ordered list of candidates `resolve` will walk through.
    pub fn candidates(&self) -> Vec<Candidate> {
        let config = &self.config;
        let mut plan = Vec::new();

        if let Some(device) = &config.serial_device {
            plan.push(Candidate::Direct(TransportSpec::serial(
                device.clone(),
                config.serial_baud,
            )));
        }

        if let Some(id) = config.usb_override {
            plan.push(Candidate::Direct(TransportSpec::usb(id.vendor_id, id.product_id)));
        }
        plan.extend(
            KNOWN_USB_PRINTERS
                .iter()
                .filter(|(vid, pid)| {
                    config
                        .usb_override
                        .is_none_or(|id| (id.vendor_id, id.product_id) != (*vid, *pid))
                })
                .map(|&(vid, pid)| Candidate::Direct(TransportSpec::usb(vid, pid))),
        );

        plan.extend(
            COMMON_SERIAL_PATHS
                .iter()
                .filter(|path| {
                    config
                        .serial_device
                        .as_deref()
                        .is_none_or(|configured| configured != std::path::Path::new(path))
                })
                .map(|path| Candidate::Direct(TransportSpec::serial(*path, config.serial_baud))),
        );

        if let Some(host) = &config.network_host {
            plan.push(Candidate::Direct(TransportSpec::network(
                host.clone(),
                config.network_port,
            )));
        }

        if let Some(prefix) = &config.network_scan_prefix {
            plan.push(Candidate::SubnetScan {
                prefix: prefix.clone(),
                port: config.network_port,
            });
        }

        plan
    }

    /// Walk the candidates in order and return the first transport that opens.
    ///
    /// # Errors
    /// Returns `Error::NoTransportFound` carrying the number of attempts and
    /// the last underlying error when nothing opened.
    pub fn resolve(&self) -> Result<O::Handle> {
        let mut attempts = 0;
        let mut last_error: Option<String> = None;

        for candidate in self.candidates() {
            match candidate {
                Candidate::Direct(spec) => {
                    attempts += 1;
                    if let Some(handle) = self.try_open(&spec, &mut last_error) {
                        return Ok(handle);
                    }
                }
                Candidate::SubnetScan { prefix, port } => {
                    debug!("Sweeping {}1-254 for printers on port {}", prefix, port);
                    for i in SUBNET_HOSTS {
                        let host = format!("{prefix}{i}");
                        attempts += 1;
                        if let Err(e) = self.opener.check_port(&host, port, SUBNET_CONNECT_TIMEOUT) {
                            last_error = Some(e.to_string());
                            continue;
                        }
                        info!("Printer port open on {}:{}", host, port);
                        let spec = TransportSpec::network(host, port);
                        if let Some(handle) = self.try_open(&spec, &mut last_error) {
                            return Ok(handle);
                        }
                    }
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| "no transport candidates".to_string());
        warn!("No printer found after {} attempts: {}", attempts, last_error);
        Err(Error::NoTransportFound {
            attempts,
            last_error,
        })
    }

    fn try_open(&self, spec: &TransportSpec, last_error: &mut Option<String>) -> Option<O::Handle> {
        debug!("Trying printer transport {}", spec);
        match self.opener.open(spec) {
            Ok(handle) => {
                info!("Using printer transport {}", spec);
                Some(handle)
            }
            Err(e) => {
                if self.is_explicit(spec) {
                    warn!("Configured printer transport {} failed: {}", spec, e);
                } else {
                    debug!("Printer transport {} unavailable: {}", spec, e);
                }
                *last_error = Some(e.to_string());
                None
            }
        }
    }

    fn is_explicit(&self, spec: &TransportSpec) -> bool {
        match spec {
            TransportSpec::Serial(s) => self.config.serial_device.as_deref() == Some(s.path.as_path()),
            TransportSpec::Usb(u) => self
                .config
                .usb_override
                .is_some_and(|id| id.vendor_id == u.vendor_id && id.product_id == u.product_id),
            TransportSpec::Network(n) => self.config.network_host.as_deref() == Some(n.host.as_str()),
        }
    }
}
