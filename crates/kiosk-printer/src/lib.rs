//! Receipt printer side of the kiosk agents.
//!
//! [`TransportResolver`] walks a fixed list of serial, USB and network
//! candidates and hands back the first printer connection that opens;
//! [`PrinterService`] encodes a [`Ticket`] as ESC/POS and writes it through
//! that connection.

pub mod error;
pub mod escpos;
pub mod handle;
pub mod opener;
pub mod resolver;
pub mod service;
pub mod ticket;
pub mod transport;

pub use error::TransportError;
pub use handle::TransportHandle;
pub use opener::{SystemOpener, TransportOpener};
pub use resolver::{Candidate, TransportResolver};
pub use service::PrinterService;
pub use ticket::Ticket;
pub use transport::{TransportKind, TransportSpec};
