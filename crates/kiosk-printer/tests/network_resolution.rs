//! Resolution against real sockets on the loopback interface.

use kiosk_core::{Error, PrinterConfig};
use kiosk_printer::{
    PrinterService, SystemOpener, Ticket, TransportError, TransportHandle, TransportKind,
    TransportOpener, TransportResolver, TransportSpec,
};
use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

/// Real sockets, but serial and USB candidates are refused so a printer
/// attached to the test machine cannot win the sweep.
struct NetworkOnly;

impl TransportOpener for NetworkOnly {
    type Handle = TransportHandle;

    fn open(&self, spec: &TransportSpec) -> Result<TransportHandle, TransportError> {
        match spec.kind() {
            TransportKind::Network => SystemOpener.open(spec),
            _ => Err(TransportError::other(format!("{spec} skipped in tests"))),
        }
    }

    fn check_port(&self, host: &str, port: u16, timeout: Duration) -> Result<(), TransportError> {
        SystemOpener.check_port(host, port, timeout)
    }
}

fn resolver(config: PrinterConfig) -> TransportResolver<NetworkOnly> {
    TransportResolver::with_opener(config, NetworkOnly)
}

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn closed_port() -> u16 {
    listener().1
}

#[test]
fn test_resolves_configured_network_host() {
    let (_listener, port) = listener();
    let config = PrinterConfig {
        network_host: Some("127.0.0.1".to_string()),
        network_port: port,
        ..PrinterConfig::default()
    };

    let handle = resolver(config).resolve().unwrap();
    assert_eq!(handle.spec().kind(), TransportKind::Network);
    assert_eq!(handle.spec(), &TransportSpec::network("127.0.0.1", port));
}

#[test]
fn test_subnet_scan_finds_loopback_printer() {
    let (_listener, port) = listener();
    let config = PrinterConfig {
        network_scan_prefix: Some("127.0.0.".to_string()),
        network_port: port,
        ..PrinterConfig::default()
    };

    let handle = resolver(config).resolve().unwrap();
    assert_eq!(handle.spec(), &TransportSpec::network("127.0.0.1", port));
}

#[test]
fn test_unreachable_host_is_exhaustion() {
    let config = PrinterConfig {
        network_host: Some("127.0.0.1".to_string()),
        network_port: closed_port(),
        ..PrinterConfig::default()
    };

    match resolver(config).resolve() {
        Err(Error::NoTransportFound {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 12);
            assert!(last_error.starts_with("Network printer 127.0.0.1:"), "{last_error}");
        }
        other => panic!("expected NoTransportFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_print_ticket_over_network() {
    let (listener, port) = listener();
    let receiver = thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        peer.read_to_end(&mut received).unwrap();
        received
    });

    let service = PrinterService::with_resolver(resolver(PrinterConfig {
        network_host: Some("127.0.0.1".to_string()),
        network_port: port,
        ..PrinterConfig::default()
    }));
    let ticket = Ticket::new("Parking").line("Entry 09:30").qr("T-7");
    service.print_ticket(ticket.clone()).await.unwrap();

    let received = receiver.join().unwrap();
    assert_eq!(received, ticket.encode().unwrap().to_vec());
}
