//! Key sources and how the monitor opens them.

pub mod evdev;
pub mod mock;

pub use evdev::EvdevSource;
pub use mock::{MockKeySource, MockKeyboard};

use crate::detection::input;
use crate::keys::KeyEvent;
use crate::traits::KeySource;
use kiosk_core::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Enum wrapper for key source dispatch.
#[derive(Debug)]
pub enum AnyKeySource {
    Evdev(EvdevSource),
    Mock(MockKeySource),
}

impl KeySource for AnyKeySource {
    async fn next_event(&mut self) -> Result<KeyEvent> {
        match self {
            Self::Evdev(source) => source.next_event().await,
            Self::Mock(source) => source.next_event().await,
        }
    }

    fn device(&self) -> &str {
        match self {
            Self::Evdev(source) => source.device(),
            Self::Mock(source) => source.device(),
        }
    }
}

/// Opens the key source for a detected scanner.
#[derive(Debug, Clone)]
pub enum KeySourceOpener {
    /// Real event nodes under `input_dir`.
    ///
    /// When detection did not name an event node, udev is asked for the
    /// key-capable devices and a scanner-looking one is preferred.
    Evdev {
        input_dir: PathBuf,
        name_patterns: Vec<String>,
    },

    /// Sources handed out by a [`MockKeyboard`].
    Mock(MockKeyboard),
}

impl KeySourceOpener {
    /// Open a source, preferring the device `hint` when one is given.
    ///
    /// # Errors
    /// - `Error::Detection` if udev cannot be queried
    /// - `Error::Device` when no key-capable device exists or the chosen
    ///   node cannot be opened
    pub async fn open(&self, hint: Option<&str>) -> Result<AnyKeySource> {
        match self {
            Self::Evdev {
                input_dir,
                name_patterns,
            } => {
                let node = match hint {
                    Some(node) => PathBuf::from(node),
                    None => {
                        let devices = input::scan(input_dir).await?;
                        input::pick_key_device(&devices, name_patterns)
                            .map(|device| device.node.clone())
                            .ok_or_else(|| Error::device("no key-capable input device"))?
                    }
                };
                debug!("Opening key source {}", node.display());
                EvdevSource::open(&node).map(AnyKeySource::Evdev)
            }
            Self::Mock(keyboard) => keyboard.open().map(AnyKeySource::Mock),
        }
    }
}
