//! Turns a stream of key presses into discount codes.
//!
//! # State machine
//!
//! ```text
//!            char key                     char key
//!   Idle ─────────────────► Accumulating ◄────────┐
//!    ▲                           │ ───────────────┘
//!    │        terminator         │
//!    └───────────────────────────┘  validate, emit or reject, clear
//! ```
//!
//! A terminator on an empty buffer is a no-op. Keys outside the charset never
//! touch the buffer. The assembler owns no I/O and no clock besides the
//! timestamp it stamps on accepted codes.

use crate::keys::{Charset, KeyAction, KeyEvent};
use kiosk_core::{Error, ScanResult};
use tracing::{info, warn};

/// Whether a partial code is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Idle,
    Accumulating,
}

/// Outcome of a terminator key on a non-empty buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The buffer was a valid discount code.
    Accepted(ScanResult),

    /// The buffer did not match the discount grammar and was discarded.
    Rejected { raw: String, reason: String },
}

/// Buffers scanner keystrokes until a terminator arrives.
///
/// # Examples
///
/// ```
/// use kiosk_scanner::assembler::{CodeAssembler, Completion};
/// use kiosk_scanner::keys::{Charset, KeyEvent, codes};
///
/// let mut assembler = CodeAssembler::new(Charset::default());
/// for code in [codes::KEY_MINUS, codes::KEY_2, codes::KEY_ENTER] {
///     if let Some(Completion::Accepted(scan)) = assembler.feed(&KeyEvent::down(code)) {
///         assert_eq!(scan.amount.cents(), 200);
///     }
/// }
/// assert!(assembler.buffer().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct CodeAssembler {
    charset: Charset,
    buffer: String,
}

impl CodeAssembler {
    pub fn new(charset: Charset) -> Self {
        Self {
            charset,
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> AssemblerState {
        if self.buffer.is_empty() {
            AssemblerState::Idle
        } else {
            AssemblerState::Accumulating
        }
    }

    /// Characters typed since the last terminator.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn charset(&self) -> &Charset {
        &self.charset
    }

    /// Apply one key event.
    ///
    /// Returns a completion only when a terminator ends a non-empty buffer;
    /// the buffer is already cleared when this returns.
    pub fn feed(&mut self, event: &KeyEvent) -> Option<Completion> {
        match self.charset.classify(event) {
            KeyAction::Char(c) => {
                self.buffer.push(c);
                None
            }
            KeyAction::Terminate if !self.buffer.is_empty() => {
                let raw = std::mem::take(&mut self.buffer);
                Some(Self::complete(raw))
            }
            KeyAction::Terminate | KeyAction::Ignore => None,
        }
    }

    /// Drop any partial code.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    fn complete(raw: String) -> Completion {
        match ScanResult::from_code(&raw) {
            Ok(scan) => {
                info!("Discount code scanned: {} (amount {})", scan.code, scan.amount);
                Completion::Accepted(scan)
            }
            Err(Error::InvalidCodeFormat { reason, .. }) => {
                warn!("Discarding invalid discount code {:?}: {}", raw, reason);
                Completion::Rejected { raw, reason }
            }
            Err(e) => {
                warn!("Discarding discount code {:?}: {}", raw, e);
                Completion::Rejected {
                    raw,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::codes::*;

    fn press(assembler: &mut CodeAssembler, keys: &[u16]) -> Vec<Completion> {
        keys.iter()
            .filter_map(|&code| assembler.feed(&KeyEvent::down(code)))
            .collect()
    }

    #[test]
    fn test_valid_code_emits_once() {
        let mut assembler = CodeAssembler::new(Charset::default());
        let completions = press(
            &mut assembler,
            &[KEY_MINUS, KEY_1, KEY_DOT, KEY_5, KEY_0, KEY_ENTER],
        );

        assert_eq!(completions.len(), 1);
        match &completions[0] {
            Completion::Accepted(scan) => {
                assert_eq!(scan.code, "-1.50");
                assert_eq!(scan.amount.as_f64(), 1.5);
            }
            other => panic!("expected accepted code, got {other:?}"),
        }
        assert_eq!(assembler.buffer(), "");
        assert_eq!(assembler.state(), AssemblerState::Idle);
    }

    #[test]
    fn test_missing_minus_is_rejected() {
        let mut assembler = CodeAssembler::new(Charset::default());
        let completions = press(&mut assembler, &[KEY_9, KEY_9, KEY_ENTER]);

        assert!(matches!(&completions[..], [Completion::Rejected { raw, .. }] if raw == "99"));
        assert_eq!(assembler.buffer(), "");
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut assembler = CodeAssembler::new(Charset::default());
        let completions = press(&mut assembler, &[KEY_MINUS, KEY_5, KEY_0, KEY_0, KEY_ENTER]);

        assert!(matches!(&completions[..], [Completion::Rejected { raw, .. }] if raw == "-500"));
        assert_eq!(assembler.state(), AssemblerState::Idle);
    }

    #[test]
    fn test_comma_is_collected_but_not_valid() {
        let mut assembler = CodeAssembler::new(Charset::default());
        let completions = press(&mut assembler, &[KEY_MINUS, KEY_1, KEY_COMMA, KEY_5, KEY_ENTER]);
        assert!(matches!(&completions[..], [Completion::Rejected { raw, .. }] if raw == "-1,5"));
    }

    #[test]
    fn test_two_cycles_do_not_leak() {
        let mut assembler = CodeAssembler::new(Charset::default());
        let first = press(&mut assembler, &[KEY_MINUS, KEY_2, KEY_ENTER]);
        let second = press(&mut assembler, &[KEY_MINUS, KEY_3, KEY_KPENTER]);

        let codes: Vec<_> = first
            .iter()
            .chain(&second)
            .map(|c| match c {
                Completion::Accepted(scan) => scan.code.clone(),
                Completion::Rejected { raw, .. } => raw.clone(),
            })
            .collect();
        assert_eq!(codes, vec!["-2", "-3"]);
    }

    #[test]
    fn test_terminator_on_empty_buffer() {
        let mut assembler = CodeAssembler::new(Charset::default());
        assert!(press(&mut assembler, &[KEY_ENTER, KEY_KPENTER]).is_empty());
    }

    #[test]
    fn test_unknown_keys_and_releases_ignored() {
        let mut assembler = CodeAssembler::new(Charset::default());
        assembler.feed(&KeyEvent::down(KEY_LEFTSHIFT));
        assembler.feed(&KeyEvent::down(KEY_MINUS));
        assembler.feed(&KeyEvent::up(KEY_MINUS));
        assembler.feed(&KeyEvent::down(KEY_KP7));
        assembler.feed(&KeyEvent::down(KEY_7));

        assert_eq!(assembler.buffer(), "-7");
        assert_eq!(assembler.state(), AssemblerState::Accumulating);
    }

    #[test]
    fn test_reset_discards_partial_code() {
        let mut assembler = CodeAssembler::new(Charset::default());
        press(&mut assembler, &[KEY_MINUS, KEY_4]);
        assembler.reset();

        let completions = press(&mut assembler, &[KEY_5, KEY_ENTER]);
        assert!(matches!(&completions[..], [Completion::Rejected { raw, .. }] if raw == "5"));
    }
}
