//! Error taxonomy shared by the printer and scanner engines.
//!
//! Only a handful of these ever reach a caller. Per-candidate transport
//! failures and per-strategy detection failures are absorbed where they
//! happen and only survive as diagnostic context (see `NoTransportFound`).

use thiserror::Error;

/// Coarse classification used at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The requested hardware is not there (no printer, no scanner).
    NotFound,
    /// The request itself was unusable.
    BadRequest,
    /// A caller-supplied deadline elapsed.
    Timeout,
    /// Anything else.
    Internal,
}

impl ErrorClass {
    /// Status code a thin HTTP front-end should answer with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 400,
            Self::BadRequest => 400,
            Self::Timeout => 408,
            Self::Internal => 500,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Printer errors
    #[error("No printer found after {attempts} attempts ({last_error})")]
    NoTransportFound { attempts: usize, last_error: String },

    #[error("Printer I/O error: {0}")]
    PrinterIo(String),

    // Scanner errors
    #[error("No QR scanner connected")]
    ScannerNotConnected,

    #[error("Timeout: no QR code scanned within {timeout_ms}ms")]
    ScanTimeout { timeout_ms: u64 },

    #[error("Invalid discount code: {code:?} ({reason})")]
    InvalidCodeFormat { code: String, reason: String },

    #[error("Detection strategy {strategy} failed: {message}")]
    Detection { strategy: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Device error: {0}")]
    Device(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_code(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCodeFormat {
            code: code.into(),
            reason: reason.into(),
        }
    }

    pub fn detection(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Detection {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn printer_io(message: impl Into<String>) -> Self {
        Self::PrinterIo(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::Device(message.into())
    }

    pub fn scan_timeout(timeout: std::time::Duration) -> Self {
        Self::ScanTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Classify the error for the caller-facing boundary.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NoTransportFound { .. } | Self::ScannerNotConnected => ErrorClass::NotFound,
            Self::ScanTimeout { .. } => ErrorClass::Timeout,
            Self::InvalidRequest(_) => ErrorClass::BadRequest,
            _ => ErrorClass::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[test]
    fn test_no_transport_found_message() {
        let error = Error::NoTransportFound {
            attempts: 13,
            last_error: "Permission denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "No printer found after 13 attempts (Permission denied)"
        );
    }

    #[test]
    fn test_scan_timeout_from_duration() {
        let error = Error::scan_timeout(Duration::from_secs(30));
        assert!(matches!(error, Error::ScanTimeout { timeout_ms: 30000 }));
    }

    #[rstest]
    #[case(Error::ScannerNotConnected, ErrorClass::NotFound, 400)]
    #[case(Error::NoTransportFound { attempts: 1, last_error: "x".into() }, ErrorClass::NotFound, 400)]
    #[case(Error::scan_timeout(Duration::from_secs(1)), ErrorClass::Timeout, 408)]
    #[case(Error::invalid_request("QR payload too long"), ErrorClass::BadRequest, 400)]
    #[case(Error::printer_io("broken pipe"), ErrorClass::Internal, 500)]
    #[case(Error::config("bad port"), ErrorClass::Internal, 500)]
    fn test_error_class(#[case] error: Error, #[case] class: ErrorClass, #[case] status: u16) {
        assert_eq!(error.class(), class);
        assert_eq!(error.class().http_status(), status);
    }
}
