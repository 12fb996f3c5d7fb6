//! Open printer connections.
//!
//! A [`TransportHandle`] owns whatever OS resource the transport needs (a
//! serial port, a claimed USB interface, a TCP socket) and releases it on
//! drop. Handles are never pooled: each print job resolves and opens its own.

use crate::error::TransportError;
use crate::transport::{NetworkSpec, SerialSpec, TransportSpec, UsbSpec};
use rusb::{DeviceHandle, Direction, GlobalContext, TransferType};
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// USB printer bound to its bulk OUT endpoint.
pub struct UsbPrinter {
    handle: DeviceHandle<GlobalContext>,
    interface: u8,
    endpoint: u8,
    timeout: Duration,
}

impl UsbPrinter {
    /// Open the first device matching the spec and claim the interface that
    /// carries a bulk OUT endpoint.
    pub fn open(spec: &UsbSpec) -> Result<Self, TransportError> {
        let (vid, pid) = (spec.vendor_id, spec.product_id);

        let mut handle = rusb::open_device_with_vid_pid(vid, pid).ok_or(
            TransportError::UsbNotFound {
                vendor_id: vid,
                product_id: pid,
            },
        )?;

        let config = handle
            .device()
            .active_config_descriptor()
            .map_err(|e| TransportError::usb(vid, pid, e))?;

        let (interface, endpoint) = config
            .interfaces()
            .flat_map(|interface| interface.descriptors())
            .find_map(|descriptor| {
                descriptor
                    .endpoint_descriptors()
                    .find(|ep| {
                        ep.direction() == Direction::Out && ep.transfer_type() == TransferType::Bulk
                    })
                    .map(|ep| (descriptor.interface_number(), ep.address()))
            })
            .ok_or(TransportError::NoBulkEndpoint {
                vendor_id: vid,
                product_id: pid,
            })?;

        // Not supported on every platform; claiming will tell us if it mattered.
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Auto-detach of kernel driver unavailable: {}", e);
        }

        handle
            .claim_interface(interface)
            .map_err(|e| TransportError::usb(vid, pid, e))?;

        debug!(
            "Claimed interface {} (endpoint {:#04x}) on {:04x}:{:04x}",
            interface, endpoint, vid, pid
        );

        Ok(Self {
            handle,
            interface,
            endpoint,
            timeout: spec.timeout,
        })
    }
}

impl Write for UsbPrinter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle
            .write_bulk(self.endpoint, buf, self.timeout)
            .map_err(|e| match e {
                rusb::Error::Timeout => io::Error::new(io::ErrorKind::TimedOut, e),
                rusb::Error::NoDevice => io::Error::new(io::ErrorKind::NotConnected, e),
                other => io::Error::other(other),
            })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for UsbPrinter {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            debug!("Failed to release USB interface {}: {}", self.interface, e);
        }
    }
}

enum Link {
    Serial(Box<dyn serialport::SerialPort>),
    Usb(UsbPrinter),
    Network(TcpStream),
}

/// Write-capable connection to exactly one printer transport.
pub struct TransportHandle {
    spec: TransportSpec,
    link: Link,
}

impl TransportHandle {
    /// Open the transport described by `spec`.
    pub fn open(spec: &TransportSpec) -> Result<Self, TransportError> {
        let link = match spec {
            TransportSpec::Serial(serial) => Link::Serial(open_serial(serial)?),
            TransportSpec::Usb(usb) => Link::Usb(UsbPrinter::open(usb)?),
            TransportSpec::Network(network) => Link::Network(open_network(network)?),
        };

        Ok(Self {
            spec: spec.clone(),
            link,
        })
    }

    /// The spec this handle was opened from.
    pub fn spec(&self) -> &TransportSpec {
        &self.spec
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl Write for TransportHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.link {
            Link::Serial(port) => port.write(buf),
            Link::Usb(printer) => printer.write(buf),
            Link::Network(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.link {
            Link::Serial(port) => port.flush(),
            Link::Usb(printer) => printer.flush(),
            Link::Network(stream) => stream.flush(),
        }
    }
}

fn open_serial(spec: &SerialSpec) -> Result<Box<dyn serialport::SerialPort>, TransportError> {
    let path = spec.path.to_string_lossy().into_owned();
    serialport::new(path.as_str(), spec.baud_rate)
        .data_bits(spec.data_bits)
        .parity(spec.parity)
        .stop_bits(spec.stop_bits)
        .timeout(spec.timeout)
        .open()
        .map_err(|source| TransportError::Serial { path, source })
}

fn open_network(spec: &NetworkSpec) -> Result<TcpStream, TransportError> {
    let stream = connect(&spec.host, spec.port, spec.timeout)?;
    let address = spec.address();
    stream
        .set_write_timeout(Some(spec.timeout))
        .map_err(|source| TransportError::Network { address, source })?;
    Ok(stream)
}

/// Connect to `host:port` trying every resolved address within `timeout`.
pub(crate) fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TransportError> {
    let address = format!("{host}:{port}");
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| TransportError::Unresolvable(address.clone()))?;

    let mut last = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last = Some(e),
        }
    }

    Err(match last {
        Some(source) => TransportError::Network { address, source },
        None => TransportError::Unresolvable(address),
    })
}
