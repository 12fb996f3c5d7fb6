//! The seam between transport resolution and the operating system.

use crate::error::TransportError;
use crate::handle::{self, TransportHandle};
use crate::transport::TransportSpec;
use std::time::Duration;

/// Opens transports and checks network hosts for an open port.
///
/// The resolver only decides *which* candidate to try next; everything that
/// touches hardware goes through this trait so the ordering logic can be
/// exercised without printers attached.
pub trait TransportOpener {
    /// Connection type handed back to the caller.
    type Handle;

    /// Open the transport described by `spec`.
    fn open(&self, spec: &TransportSpec) -> Result<Self::Handle, TransportError>;

    /// Check whether something accepts TCP connections at `host:port`.
    fn check_port(&self, host: &str, port: u16, timeout: Duration) -> Result<(), TransportError>;
}

/// Opener backed by real serial ports, libusb and TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl TransportOpener for SystemOpener {
    type Handle = TransportHandle;

    fn open(&self, spec: &TransportSpec) -> Result<TransportHandle, TransportError> {
        TransportHandle::open(spec)
    }

    fn check_port(&self, host: &str, port: u16, timeout: Duration) -> Result<(), TransportError> {
        handle::connect(host, port, timeout).map(drop)
    }
}
