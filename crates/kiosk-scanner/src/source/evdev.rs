//! Key events straight from a Linux event node (`/dev/input/eventN`).
//!
//! The node is opened non-blocking and registered with the tokio reactor, so
//! a reader waiting for the next keystroke holds no thread. Records are the
//! kernel's `struct input_event`; only `EV_KEY` records are kept.

use crate::keys::{KeyEvent, KeyState};
use crate::traits::KeySource;
use kiosk_core::{Error, Result};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tokio::io::unix::AsyncFd;

pub const EV_KEY: u16 = 0x01;

/// Size of one `struct input_event` on this platform.
pub const EVENT_SIZE: usize = std::mem::size_of::<libc::input_event>();

/// Records read per syscall.
const READ_BATCH: usize = 64;

/// Reader over one event node.
#[derive(Debug)]
pub struct EvdevSource {
    fd: AsyncFd<File>,
    device: String,
    pending: VecDeque<KeyEvent>,
    buf: Vec<u8>,
}

impl EvdevSource {
    /// Open `path` for non-blocking reads.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `Error::Device` when the node cannot be opened (missing,
    /// permission denied) or cannot be registered with the reactor.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = path.display().to_string();

        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| Error::device(format!("{device}: {e}")))?;
        let fd = AsyncFd::new(file).map_err(|e| Error::device(format!("{device}: {e}")))?;

        Ok(Self {
            fd,
            device,
            pending: VecDeque::new(),
            buf: vec![0; EVENT_SIZE * READ_BATCH],
        })
    }

    async fn fill(&mut self) -> Result<()> {
        loop {
            let mut guard = self
                .fd
                .readable()
                .await
                .map_err(|e| Error::device(format!("{}: {e}", self.device)))?;

            let buf = &mut self.buf;
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(buf)
            }) {
                Ok(Ok(0)) => {
                    return Err(Error::device(format!("{}: device closed", self.device)));
                }
                Ok(Ok(n)) => {
                    self.pending.extend(decode_key_events(&self.buf[..n]));
                    return Ok(());
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(Error::device(format!("{}: {e}", self.device))),
                Err(_would_block) => continue,
            }
        }
    }
}

impl KeySource for EvdevSource {
    async fn next_event(&mut self) -> Result<KeyEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            self.fill().await?;
        }
    }

    fn device(&self) -> &str {
        &self.device
    }
}

/// Decode the key events in a buffer of raw `input_event` records.
///
/// Trailing bytes that do not form a whole record are ignored.
pub fn decode_key_events(bytes: &[u8]) -> impl Iterator<Item = KeyEvent> + '_ {
    bytes.chunks_exact(EVENT_SIZE).filter_map(|record| {
        // type, code and value are the last 8 bytes; the timestamp before
        // them differs in size between 32 and 64 bit targets.
        let tail = &record[EVENT_SIZE - 8..];
        let kind = u16::from_ne_bytes([tail[0], tail[1]]);
        let code = u16::from_ne_bytes([tail[2], tail[3]]);
        let value = i32::from_ne_bytes([tail[4], tail[5], tail[6], tail[7]]);

        if kind != EV_KEY {
            return None;
        }
        KeyState::from_value(value).map(|state| KeyEvent::new(code, state))
    })
}

/// Encode one record the way the kernel would. Timestamp is left zeroed.
pub fn encode_record(kind: u16, code: u16, value: i32) -> Vec<u8> {
    let mut record = vec![0u8; EVENT_SIZE];
    let tail = &mut record[EVENT_SIZE - 8..];
    tail[0..2].copy_from_slice(&kind.to_ne_bytes());
    tail[2..4].copy_from_slice(&code.to_ne_bytes());
    tail[4..8].copy_from_slice(&value.to_ne_bytes());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::codes::*;
    use std::io::Write;
    use std::os::fd::AsRawFd;

    const EV_SYN: u16 = 0x00;
    const EV_MSC: u16 = 0x04;

    fn keystroke(code: u16) -> Vec<u8> {
        [
            encode_record(EV_MSC, 4, 0x7001e),
            encode_record(EV_KEY, code, 1),
            encode_record(EV_SYN, 0, 0),
            encode_record(EV_KEY, code, 0),
            encode_record(EV_SYN, 0, 0),
        ]
        .concat()
    }

    #[test]
    fn test_decode_keeps_only_key_records() {
        let bytes = keystroke(KEY_5);
        let events: Vec<_> = decode_key_events(&bytes).collect();
        assert_eq!(events, vec![KeyEvent::down(KEY_5), KeyEvent::up(KEY_5)]);
    }

    #[test]
    fn test_decode_ignores_partial_record() {
        let mut bytes = encode_record(EV_KEY, KEY_ENTER, 1);
        bytes.extend_from_slice(&[0xff; 5]);
        assert_eq!(decode_key_events(&bytes).count(), 1);
    }

    #[test]
    fn test_decode_skips_unknown_values() {
        let bytes = encode_record(EV_KEY, KEY_1, 9);
        assert_eq!(decode_key_events(&bytes).count(), 0);
    }

    #[tokio::test]
    async fn test_open_missing_node() {
        let result = EvdevSource::open("/dev/input/event-kiosk-missing");
        assert!(matches!(result, Err(Error::Device(_))));
    }

    #[tokio::test]
    async fn test_reads_events_from_pipe() {
        let (reader, mut writer) = io::pipe().unwrap();
        let node = format!("/proc/self/fd/{}", reader.as_raw_fd());

        let mut source = EvdevSource::open(&node).unwrap();
        assert_eq!(source.device(), node);

        writer
            .write_all(&[keystroke(KEY_MINUS), keystroke(KEY_ENTER)].concat())
            .unwrap();

        assert_eq!(source.next_event().await.unwrap(), KeyEvent::down(KEY_MINUS));
        assert_eq!(source.next_event().await.unwrap(), KeyEvent::up(KEY_MINUS));
        assert_eq!(source.next_event().await.unwrap(), KeyEvent::down(KEY_ENTER));
        assert_eq!(source.next_event().await.unwrap(), KeyEvent::up(KEY_ENTER));

        drop(writer);
        drop(reader);
        assert!(matches!(source.next_event().await, Err(Error::Device(_))));
    }
}
