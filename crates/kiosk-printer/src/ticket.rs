//! Parking ticket layout.

use crate::escpos::{Align, EscPos};
use bytes::Bytes;
use kiosk_core::Result;
use kiosk_core::constants::TICKET_WIDTH;
use serde::Deserialize;

/// Module size used for the ticket QR code on 58mm paper.
const QR_MODULE_SIZE: u8 = 3;

/// A ticket to print.
///
/// Deserializes from the JSON body the kiosk front-end sends:
/// `{"title": "...", "lines": ["..."], "qrData": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub lines: Vec<String>,

    #[serde(default, rename = "qrData")]
    pub qr_data: Option<String>,
}

impl Ticket {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn qr(mut self, data: impl Into<String>) -> Self {
        self.qr_data = Some(data.into());
        self
    }

    /// Title, falling back to `Ticket` when none (or an empty one) was given.
    pub fn title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Ticket")
    }

    /// Render the ticket as ESC/POS bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` when the QR payload cannot be encoded.
    pub fn encode(&self) -> Result<Bytes> {
        let separator = "-".repeat(TICKET_WIDTH);

        let mut out = EscPos::new()
            .align(Align::Center)
            .bold(true)
            .size(2, 2)
            .text_line(self.title())
            .align(Align::Left)
            .bold(false)
            .size(1, 1)
            .text_line(&separator);

        for line in &self.lines {
            out = out.text_line(line);
        }
        out = out.text_line(&separator);

        if let Some(data) = self.qr_data.as_deref().filter(|d| !d.is_empty()) {
            out = out
                .align(Align::Center)
                .qr_code(data, QR_MODULE_SIZE)?
                .align(Align::Left);
        }

        Ok(out.feed(2).cut().into_bytes())
    }
}
