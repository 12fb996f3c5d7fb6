//! Minimal ESC/POS command encoder.
//!
//! Only the handful of commands a parking ticket needs: alignment, emphasis,
//! character size, text lines, the native QR code symbol, feed and cut.

use bytes::{BufMut, Bytes, BytesMut};
use kiosk_core::{Error, Result};

const ESC: u8 = 0x1b;
const GS: u8 = 0x1d;
const LF: u8 = b'\n';

/// Largest payload the QR store command can carry (model 2, level L).
pub const MAX_QR_DATA: usize = 7089;

/// Horizontal alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Builder for an ESC/POS byte stream.
///
/// # Examples
///
/// ```
/// use kiosk_printer::escpos::{Align, EscPos};
///
/// let bytes = EscPos::new()
///     .align(Align::Center)
///     .text_line("Ticket")
///     .cut()
///     .into_bytes();
///
/// assert!(bytes.starts_with(b"\x1b@"));
/// ```
#[derive(Debug, Clone)]
pub struct EscPos {
    buf: BytesMut,
}

impl EscPos {
    /// Start a new stream with the printer initialize command.
    pub fn new() -> Self {
        let mut buf = BytesMut::with_capacity(512);
        buf.put_slice(&[ESC, b'@']);
        Self { buf }
    }

    pub fn align(mut self, align: Align) -> Self {
        let n = match align {
            Align::Left => 0,
            Align::Center => 1,
            Align::Right => 2,
        };
        self.buf.put_slice(&[ESC, b'a', n]);
        self
    }

    pub fn bold(mut self, enabled: bool) -> Self {
        self.buf.put_slice(&[ESC, b'E', u8::from(enabled)]);
        self
    }

    /// Character magnification, 1..=8 in each direction.
    pub fn size(mut self, width: u8, height: u8) -> Self {
        let w = width.clamp(1, 8) - 1;
        let h = height.clamp(1, 8) - 1;
        self.buf.put_slice(&[GS, b'!', (w << 4) | h]);
        self
    }

    /// Print `text` followed by a line feed.
    ///
    /// Printers run a single-byte code page, so anything outside ASCII is
    /// replaced by `?`.
    pub fn text_line(mut self, text: &str) -> Self {
        self.buf.extend(
            text.chars()
                .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' }),
        );
        self.buf.put_u8(LF);
        self
    }

    /// Feed `lines` blank lines.
    pub fn feed(mut self, lines: u8) -> Self {
        self.buf.put_slice(&[ESC, b'd', lines]);
        self
    }

    /// Print `data` as a native QR code symbol.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` when the payload is empty or larger
    /// than [`MAX_QR_DATA`].
    pub fn qr_code(mut self, data: &str, module_size: u8) -> Result<Self> {
        let payload = data.as_bytes();
        if payload.is_empty() || payload.len() > MAX_QR_DATA {
            return Err(Error::invalid_request(format!(
                "QR payload must be 1-{MAX_QR_DATA} bytes, got {}",
                payload.len()
            )));
        }

        // Model 2
        self.buf.put_slice(&[GS, b'(', b'k', 4, 0, 49, 65, 50, 0]);
        // Module size
        self.buf
            .put_slice(&[GS, b'(', b'k', 3, 0, 49, 67, module_size.clamp(1, 16)]);
        // Error correction level L
        self.buf.put_slice(&[GS, b'(', b'k', 3, 0, 49, 69, 48]);
        // Store symbol data
        let len = (payload.len() + 3) as u16;
        self.buf.put_slice(&[GS, b'(', b'k']);
        self.buf.put_u16_le(len);
        self.buf.put_slice(&[49, 80, 48]);
        self.buf.put_slice(payload);
        // Print symbol
        self.buf.put_slice(&[GS, b'(', b'k', 3, 0, 49, 81, 48]);
        self.buf.put_u8(LF);

        Ok(self)
    }

    /// Full paper cut.
    pub fn cut(mut self) -> Self {
        self.buf.put_slice(&[GS, b'V', 0]);
        self
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Default for EscPos {
    fn default() -> Self {
        Self::new()
    }
}
