//! Key events and the character set a scanner is allowed to type.
//!
//! Keyboard-emulating scanners report one key event per character. Codes are
//! Linux input event codes (`linux/input-event-codes.h`), which is also what
//! `/dev/input/event*` delivers.

use std::collections::{BTreeMap, BTreeSet};

/// Linux key codes used by discount codes.
pub mod codes {
    pub const KEY_1: u16 = 2;
    pub const KEY_2: u16 = 3;
    pub const KEY_3: u16 = 4;
    pub const KEY_4: u16 = 5;
    pub const KEY_5: u16 = 6;
    pub const KEY_6: u16 = 7;
    pub const KEY_7: u16 = 8;
    pub const KEY_8: u16 = 9;
    pub const KEY_9: u16 = 10;
    pub const KEY_0: u16 = 11;
    pub const KEY_MINUS: u16 = 12;
    pub const KEY_ENTER: u16 = 28;
    pub const KEY_COMMA: u16 = 51;
    pub const KEY_DOT: u16 = 52;
    pub const KEY_LEFTSHIFT: u16 = 42;

    pub const KEY_KP7: u16 = 71;
    pub const KEY_KP8: u16 = 72;
    pub const KEY_KP9: u16 = 73;
    pub const KEY_KPMINUS: u16 = 74;
    pub const KEY_KP4: u16 = 75;
    pub const KEY_KP5: u16 = 76;
    pub const KEY_KP6: u16 = 77;
    pub const KEY_KP1: u16 = 79;
    pub const KEY_KP2: u16 = 80;
    pub const KEY_KP3: u16 = 81;
    pub const KEY_KP0: u16 = 82;
    pub const KEY_KPDOT: u16 = 83;
    pub const KEY_KPENTER: u16 = 96;
}

use codes::*;

/// Transition reported for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Up,
    Down,
    Repeat,
}

impl KeyState {
    /// Map the `value` field of an `EV_KEY` input event.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// A single key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn new(code: u16, state: KeyState) -> Self {
        Self { code, state }
    }

    pub fn down(code: u16) -> Self {
        Self::new(code, KeyState::Down)
    }

    pub fn up(code: u16) -> Self {
        Self::new(code, KeyState::Up)
    }
}

/// What a key event means to the code assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Append this character to the buffer.
    Char(char),
    /// End of code.
    Terminate,
    /// Not part of any code; leaves the buffer untouched.
    Ignore,
}

/// Mapping from key codes to data characters, plus the terminator keys.
///
/// # Examples
///
/// ```
/// use kiosk_scanner::keys::{Charset, KeyAction, KeyEvent, codes};
///
/// let charset = Charset::default();
/// assert_eq!(charset.classify(&KeyEvent::down(codes::KEY_MINUS)), KeyAction::Char('-'));
/// assert_eq!(charset.classify(&KeyEvent::down(codes::KEY_KP5)), KeyAction::Ignore);
///
/// let charset = Charset::default().with_keypad();
/// assert_eq!(charset.classify(&KeyEvent::down(codes::KEY_KP5)), KeyAction::Char('5'));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset {
    chars: BTreeMap<u16, char>,
    terminators: BTreeSet<u16>,
}

impl Charset {
    /// Digits, minus sign, decimal point and comma on the main keyboard block,
    /// terminated by Enter or keypad Enter.
    pub fn standard() -> Self {
        let chars = [
            (KEY_0, '0'),
            (KEY_1, '1'),
            (KEY_2, '2'),
            (KEY_3, '3'),
            (KEY_4, '4'),
            (KEY_5, '5'),
            (KEY_6, '6'),
            (KEY_7, '7'),
            (KEY_8, '8'),
            (KEY_9, '9'),
            (KEY_MINUS, '-'),
            (KEY_DOT, '.'),
            (KEY_COMMA, ','),
        ]
        .into_iter()
        .collect();

        Self {
            chars,
            terminators: [KEY_ENTER, KEY_KPENTER].into_iter().collect(),
        }
    }

    /// Also accept the numeric keypad block, which some scanners use when
    /// configured for "keypad emulation".
    pub fn with_keypad(self) -> Self {
        [
            (KEY_KP0, '0'),
            (KEY_KP1, '1'),
            (KEY_KP2, '2'),
            (KEY_KP3, '3'),
            (KEY_KP4, '4'),
            (KEY_KP5, '5'),
            (KEY_KP6, '6'),
            (KEY_KP7, '7'),
            (KEY_KP8, '8'),
            (KEY_KP9, '9'),
            (KEY_KPMINUS, '-'),
            (KEY_KPDOT, '.'),
        ]
        .into_iter()
        .fold(self, |charset, (code, c)| charset.with_key(code, c))
    }

    /// Map one more key to a data character.
    pub fn with_key(mut self, code: u16, c: char) -> Self {
        self.chars.insert(code, c);
        self
    }

    /// Treat one more key as a terminator.
    pub fn with_terminator(mut self, code: u16) -> Self {
        self.chars.remove(&code);
        self.terminators.insert(code);
        self
    }

    /// Classify an event. Anything but a key press is ignored.
    pub fn classify(&self, event: &KeyEvent) -> KeyAction {
        if event.state != KeyState::Down {
            return KeyAction::Ignore;
        }
        if self.terminators.contains(&event.code) {
            return KeyAction::Terminate;
        }
        self.chars
            .get(&event.code)
            .map_or(KeyAction::Ignore, |&c| KeyAction::Char(c))
    }

    /// Key code that types `c`, preferring the main keyboard block.
    pub fn code_for(&self, c: char) -> Option<u16> {
        self.chars
            .iter()
            .find(|&(_, &mapped)| mapped == c)
            .map(|(&code, _)| code)
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::standard()
    }
}
