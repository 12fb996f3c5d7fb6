//! kiosk
//!
//! Command line front-end for the kiosk peripherals: print tickets on the
//! receipt printer and read discount codes from the QR scanner.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kiosk_core::{KioskConfig, PrinterConfig};
use kiosk_printer::{Candidate, PrinterService, Ticket, TransportResolver};
use kiosk_scanner::keys::Charset;
use kiosk_scanner::{MonitorConfig, MonitorEvent, ScannerService};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How long `scan` waits for the scanner to show up.
const CONNECT_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "kiosk")]
#[command(author, version, about = "Kiosk receipt printer and QR scanner tool")]
#[command(long_about = "
Drives the peripherals of a self-service kiosk.

Printer discovery reads ESC_POS_SERIAL_DEVICE, ESC_POS_SERIAL_BAUD,
ESC_POS_USB_VID, ESC_POS_USB_PID, ESC_POS_NETWORK_HOST, ESC_POS_NETWORK_PORT
and ESC_POS_NETWORK_SCAN_PREFIX; flags below take precedence.

EXAMPLES:
    # Print a ticket with a QR code
    kiosk print --title 'Parking' --line 'Plate: ABC-1234' --qr 'T-000123'

    # Show which printer would be used
    kiosk resolve

    # Wait up to 20 seconds for a discount code
    kiosk scan --timeout 20

    # Show where the agents listen (PRINTER_BIND, QR_SCANNER_BIND, ...)
    kiosk config
")]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    #[command(flatten)]
    printer: PrinterArgs,

    #[command(flatten)]
    scanner: ScannerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct PrinterArgs {
    /// Serial device of the printer
    #[arg(long, global = true, value_name = "PATH")]
    serial_device: Option<PathBuf>,

    /// Host of a network printer
    #[arg(long, global = true, value_name = "HOST")]
    network_host: Option<String>,

    /// Subnet prefix to sweep for network printers (e.g. 192.168.1.)
    #[arg(long, global = true, value_name = "PREFIX")]
    scan_prefix: Option<String>,
}

impl PrinterArgs {
    fn apply(self, config: &mut PrinterConfig) {
        if let Some(device) = self.serial_device {
            config.serial_device = Some(device);
        }
        if let Some(host) = self.network_host {
            config.network_host = Some(host);
        }
        if let Some(prefix) = self.scan_prefix {
            config.network_scan_prefix = Some(prefix);
        }
    }
}

#[derive(clap::Args, Debug)]
struct ScannerArgs {
    /// Seconds between scanner presence checks
    #[arg(long, global = true, value_name = "SECS", env = "KIOSK_SCANNER_TICK")]
    tick: Option<u64>,

    /// Also accept numeric keypad keys as code characters
    #[arg(long, global = true, env = "KIOSK_SCANNER_KEYPAD")]
    keypad: bool,

    /// Extra scanner name fragment (repeatable)
    #[arg(long = "scanner-name", global = true, value_name = "NAME")]
    names: Vec<String>,
}

impl ScannerArgs {
    fn into_config(self) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        if let Some(secs) = self.tick {
            config.tick_interval = Duration::from_secs(secs.max(1));
        }
        if self.keypad {
            config.charset = Charset::standard().with_keypad();
        }
        config
            .name_patterns
            .extend(self.names.into_iter().map(|name| name.to_lowercase()));
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a ticket
    Print {
        /// Ticket title
        #[arg(short, long)]
        title: Option<String>,

        /// Body line (repeatable)
        #[arg(short = 'L', long = "line", value_name = "TEXT")]
        lines: Vec<String>,

        /// Payload of the QR code printed under the body
        #[arg(long, value_name = "DATA")]
        qr: Option<String>,

        /// Read the ticket from a JSON file instead
        #[arg(long, value_name = "PATH", conflicts_with_all = ["title", "lines", "qr"])]
        file: Option<PathBuf>,
    },

    /// Show the printer resolution plan and open the first printer found
    Resolve {
        /// Only list the candidates
        #[arg(long)]
        dry_run: bool,
    },

    /// Run scanner presence detection once
    Detect,

    /// Wait for one discount code
    Scan {
        /// Seconds to wait for a code
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,
    },

    /// Log scanner events until Ctrl-C
    Monitor,

    /// Show the effective configuration, including the agent addresses
    Config,
}

fn setup_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level).context("Failed to setup logging")?;

    let mut config = KioskConfig::from_env().context("Failed to load configuration")?;
    cli.printer.apply(&mut config.printer);
    let monitor_config = cli.scanner.into_config();

    match cli.command {
        Command::Print {
            title,
            lines,
            qr,
            file,
        } => {
            let ticket = match file {
                Some(path) => read_ticket(&path)?,
                None => Ticket {
                    title,
                    lines,
                    qr_data: qr,
                },
            };
            print_ticket(config.printer, ticket).await
        }
        Command::Resolve { dry_run } => resolve(config.printer, dry_run).await,
        Command::Detect => detect(monitor_config).await,
        Command::Scan { timeout } => scan(monitor_config, Duration::from_secs(timeout)).await,
        Command::Monitor => monitor(monitor_config).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config_report(&config))?);
            Ok(())
        }
    }
}

fn config_report(config: &KioskConfig) -> serde_json::Value {
    serde_json::json!({
        "printer": config.printer,
        "printer_agent": config.printer_bind.address(),
        "scanner_agent": config.scanner_bind.address(),
    })
}

fn read_ticket(path: &Path) -> Result<Ticket> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid ticket in {}", path.display()))
}

async fn print_ticket(config: PrinterConfig, ticket: Ticket) -> Result<()> {
    let service = PrinterService::new(config);
    service
        .print_ticket(ticket)
        .await
        .context("Failed to print ticket")?;
    println!("Ticket printed");
    Ok(())
}

async fn resolve(config: PrinterConfig, dry_run: bool) -> Result<()> {
    let resolver = TransportResolver::new(config);

    println!("Resolution plan:");
    for (i, candidate) in resolver.candidates().iter().enumerate() {
        match candidate {
            Candidate::Direct(spec) => println!("  {:>2}. {}", i + 1, spec),
            Candidate::SubnetScan { prefix, port } => {
                println!("  {:>2}. sweep {}1-254 port {}", i + 1, prefix, port)
            }
        }
    }

    if dry_run {
        return Ok(());
    }

    let handle = tokio::task::spawn_blocking(move || resolver.resolve())
        .await
        .context("Resolution task failed")?
        .context("No printer found")?;
    println!("Selected: {}", handle.spec());
    Ok(())
}

async fn detect(config: MonitorConfig) -> Result<()> {
    let service = ScannerService::new(config);
    let check = service.check_scanner().await;
    println!("{}", serde_json::to_string_pretty(&check)?);
    Ok(())
}

async fn scan(config: MonitorConfig, timeout: Duration) -> Result<()> {
    let service = ScannerService::new(config);
    let mut events = service.monitor().subscribe();
    service.start_monitoring();

    if !wait_connected(&mut events, CONNECT_GRACE).await {
        service.stop_monitoring().await;
        bail!("No QR scanner detected");
    }

    info!("Waiting up to {}s for a code", timeout.as_secs());
    let result = service.scan(Some(timeout)).await;
    service.stop_monitoring().await;

    let outcome = result.context("Scan failed")?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn wait_connected(events: &mut broadcast::Receiver<MonitorEvent>, limit: Duration) -> bool {
    let connected = async {
        loop {
            match events.recv().await {
                Ok(MonitorEvent::StatusChanged {
                    connected: true, ..
                }) => return true,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return false,
            }
        }
    };
    tokio::time::timeout(limit, connected).await.unwrap_or(false)
}

async fn monitor(config: MonitorConfig) -> Result<()> {
    let service = ScannerService::new(config);
    let mut events = service.monitor().subscribe();
    service.start_monitoring();
    info!("Monitoring scanner, press Ctrl-C to stop");

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            event = events.recv() => match event {
                Ok(MonitorEvent::StatusChanged { connected, device }) => {
                    let device = device.as_deref().unwrap_or("unknown device");
                    if connected {
                        println!("connected ({device})");
                    } else {
                        println!("disconnected");
                    }
                }
                Ok(MonitorEvent::CodeScanned(scan)) => {
                    println!("{}", serde_json::to_string(&scan)?);
                }
                Ok(MonitorEvent::CodeRejected { raw, reason }) => {
                    println!("rejected {raw:?}: {reason}");
                }
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} scanner events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("Shutting down");
    service.stop_monitoring().await;
    println!("{}", serde_json::to_string_pretty(&service.status())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_print_arguments() {
        let cli = Cli::parse_from([
            "kiosk", "print", "--title", "Parking", "-L", "Plate: ABC", "-L", "In: 10:42", "--qr",
            "T-1",
        ]);
        match cli.command {
            Command::Print {
                title, lines, qr, ..
            } => {
                assert_eq!(title.as_deref(), Some("Parking"));
                assert_eq!(lines, vec!["Plate: ABC", "In: 10:42"]);
                assert_eq!(qr.as_deref(), Some("T-1"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_scanner_overrides() {
        let cli = Cli::parse_from(["kiosk", "detect", "--keypad", "--scanner-name", "Opticon"]);
        let config = cli.scanner.into_config();
        assert!(config.name_patterns.contains(&"opticon".to_string()));
        assert_ne!(config.charset, Charset::standard());
    }

    #[test]
    fn test_printer_overrides() {
        let cli = Cli::parse_from(["kiosk", "resolve", "--network-host", "10.0.0.9"]);
        let mut config = PrinterConfig::default();
        cli.printer.apply(&mut config);
        assert_eq!(config.network_host.as_deref(), Some("10.0.0.9"));
        assert!(config.serial_device.is_none());
    }

    #[test]
    fn test_config_report() {
        let cli = Cli::parse_from(["kiosk", "config", "--network-host", "10.0.0.9"]);
        assert!(matches!(cli.command, Command::Config));

        let mut config = KioskConfig::from_lookup(|key| match key {
            "PRINTER_PORT" => Some("9201".to_string()),
            "QR_SCANNER_BIND" => Some("0.0.0.0".to_string()),
            _ => None,
        })
        .unwrap();
        cli.printer.apply(&mut config.printer);

        let report = config_report(&config);
        assert_eq!(report["printer_agent"], "127.0.0.1:9201");
        assert_eq!(report["scanner_agent"], "0.0.0.0:9102");
        assert_eq!(report["printer"]["network_host"], "10.0.0.9");
        assert_eq!(report["printer"]["network_port"], 9100);
    }
}
