//! Caller-facing printer operations.

use crate::opener::{SystemOpener, TransportOpener};
use crate::resolver::TransportResolver;
use crate::ticket::Ticket;
use kiosk_core::{Error, Health, PrinterConfig, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info};

/// Service name reported by [`PrinterService::health`].
pub const SERVICE_NAME: &str = "printer-agent";

/// Prints tickets on whatever printer the resolver finds.
///
/// Every job resolves its own transport and drops it when done, so a printer
/// that was unplugged and replugged (or swapped for a different model) between
/// jobs is picked up without restarting anything.
#[derive(Debug)]
pub struct PrinterService<O = SystemOpener> {
    resolver: Arc<TransportResolver<O>>,
}

impl<O> Clone for PrinterService<O> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
        }
    }
}

impl PrinterService<SystemOpener> {
    pub fn new(config: PrinterConfig) -> Self {
        Self::with_resolver(TransportResolver::new(config))
    }
}

impl<O> PrinterService<O>
where
    O: TransportOpener,
    O::Handle: Write,
{
    pub fn with_resolver(resolver: TransportResolver<O>) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    pub fn resolver(&self) -> &TransportResolver<O> {
        &self.resolver
    }

    /// Resolve a transport and print `ticket` on the calling thread.
    ///
    /// # Errors
    /// - `Error::InvalidRequest` if the ticket cannot be encoded
    /// - `Error::NoTransportFound` if no printer could be opened
    /// - `Error::PrinterIo` if writing to the opened printer failed
    pub fn print_blocking(&self, ticket: &Ticket) -> Result<()> {
        print_with(&self.resolver, ticket)
    }

    pub fn health(&self) -> Health {
        Health::ok(SERVICE_NAME)
    }
}

impl<O> PrinterService<O>
where
    O: TransportOpener + Send + Sync + 'static,
    O::Handle: Write,
{
    /// Print `ticket` without blocking the async runtime.
    ///
    /// Resolution and device writes are synchronous and can take seconds
    /// (a subnet sweep especially), so the job runs on the blocking pool.
    pub async fn print_ticket(&self, ticket: Ticket) -> Result<()> {
        let resolver = Arc::clone(&self.resolver);
        tokio::task::spawn_blocking(move || print_with(&resolver, &ticket))
            .await
            .map_err(|e| Error::printer_io(format!("print job aborted: {e}")))?
    }
}

fn print_with<O>(resolver: &TransportResolver<O>, ticket: &Ticket) -> Result<()>
where
    O: TransportOpener,
    O::Handle: Write,
{
    let bytes = ticket.encode()?;
    let mut printer = resolver.resolve()?;

    printer
        .write_all(&bytes)
        .and_then(|()| printer.flush())
        .map_err(|e| {
            error!("Failed to write ticket to printer: {}", e);
            Error::printer_io(e.to_string())
        })?;

    info!(
        "Printed ticket {:?} ({} lines, {} bytes)",
        ticket.title(),
        ticket.lines.len(),
        bytes.len()
    );
    Ok(())
}
