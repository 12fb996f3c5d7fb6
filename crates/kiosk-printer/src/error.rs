//! Errors raised while trying a single printer transport.
//!
//! A `TransportError` never reaches the caller of the resolver directly: it is
//! logged, kept as the "last error" and the next candidate is tried. Only its
//! rendered message survives inside `kiosk_core::Error::NoTransportFound`.

/// Failure of one transport attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Serial device could not be opened or configured.
    #[error("Serial port {path}: {source}")]
    Serial {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// No USB device with the requested ids is attached (or accessible).
    #[error("USB device {vendor_id:04x}:{product_id:04x} not found")]
    UsbNotFound { vendor_id: u16, product_id: u16 },

    /// USB device present but unusable.
    #[error("USB device {vendor_id:04x}:{product_id:04x}: {source}")]
    Usb {
        vendor_id: u16,
        product_id: u16,
        #[source]
        source: rusb::Error,
    },

    /// USB device has no bulk OUT endpoint to print through.
    #[error("USB device {vendor_id:04x}:{product_id:04x} has no bulk OUT endpoint")]
    NoBulkEndpoint { vendor_id: u16, product_id: u16 },

    /// TCP connection failed.
    #[error("Network printer {address}: {source}")]
    Network {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Host name did not resolve to any address.
    #[error("Cannot resolve printer address {0}")]
    Unresolvable(String),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    pub(crate) fn usb(vendor_id: u16, product_id: u16, source: rusb::Error) -> Self {
        Self::Usb {
            vendor_id,
            product_id,
            source,
        }
    }
}
