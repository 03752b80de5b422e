//! Key mnemonics and 5250 attention identifiers

use std::fmt;

/// Attention identifier bytes (AID) sent by submit keys
pub mod aid {
    /// Enter / Record Advance
    pub const ENTER: u8 = 0xF1;
    /// F1; F2..F12 follow consecutively
    pub const F1: u8 = 0x31;
    /// F13; F14..F24 follow consecutively
    pub const F13: u8 = 0xB1;
    /// PA1
    pub const PA1: u8 = 0x6C;
    /// PA2
    pub const PA2: u8 = 0x6E;
    /// PA3
    pub const PA3: u8 = 0x6B;
    /// Clear
    pub const CLEAR: u8 = 0xBD;
    /// Help
    pub const HELP: u8 = 0xF3;
    /// Roll Down (page up)
    pub const ROLL_DOWN: u8 = 0xF4;
    /// Roll Up (page down)
    pub const ROLL_UP: u8 = 0xF5;
    /// Print
    pub const PRINT: u8 = 0xF6;
}

/// A named key that can appear in brackets inside a key sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMnemonic {
    /// Enter
    Enter,
    /// Next field
    Tab,
    /// Previous field
    BackTab,
    /// Home
    Home,
    /// End of field
    End,
    /// Cursor up
    Up,
    /// Cursor down
    Down,
    /// Cursor left
    Left,
    /// Cursor right
    Right,
    /// Escape
    Escape,
    /// Backspace
    Backspace,
    /// Delete character
    Delete,
    /// Toggle insert mode
    Insert,
    /// Erase to end of field
    EraseEof,
    /// Erase all input fields
    EraseInput,
    /// Field exit
    FieldExit,
    /// Field plus
    FieldPlus,
    /// Field minus
    FieldMinus,
    /// Duplicate field
    Dup,
    /// New line
    NewLine,
    /// Error reset
    Reset,
    /// System request
    SysReq,
    /// Attention
    Attention,
    /// Clear
    Clear,
    /// Help
    Help,
    /// Page up (Roll Down)
    PageUp,
    /// Page down (Roll Up)
    PageDown,
    /// Print
    Print,
    /// Function key 1..=24
    Function(u8),
    /// Program attention 1..=3
    ProgramAttention(u8),
}

const NAMED: &[(&str, KeyMnemonic)] = &[
    ("enter", KeyMnemonic::Enter),
    ("tab", KeyMnemonic::Tab),
    ("backtab", KeyMnemonic::BackTab),
    ("home", KeyMnemonic::Home),
    ("end", KeyMnemonic::End),
    ("up", KeyMnemonic::Up),
    ("down", KeyMnemonic::Down),
    ("left", KeyMnemonic::Left),
    ("right", KeyMnemonic::Right),
    ("esc", KeyMnemonic::Escape),
    ("escape", KeyMnemonic::Escape),
    ("backspace", KeyMnemonic::Backspace),
    ("delete", KeyMnemonic::Delete),
    ("insert", KeyMnemonic::Insert),
    ("eof", KeyMnemonic::EraseEof),
    ("erase", KeyMnemonic::EraseInput),
    ("fieldexit", KeyMnemonic::FieldExit),
    ("fldext", KeyMnemonic::FieldExit),
    ("field+", KeyMnemonic::FieldPlus),
    ("field-", KeyMnemonic::FieldMinus),
    ("dup", KeyMnemonic::Dup),
    ("dupfield", KeyMnemonic::Dup),
    ("newline", KeyMnemonic::NewLine),
    ("reset", KeyMnemonic::Reset),
    ("sysreq", KeyMnemonic::SysReq),
    ("attn", KeyMnemonic::Attention),
    ("clear", KeyMnemonic::Clear),
    ("help", KeyMnemonic::Help),
    ("pgup", KeyMnemonic::PageUp),
    ("rolldown", KeyMnemonic::PageUp),
    ("pgdown", KeyMnemonic::PageDown),
    ("rollup", KeyMnemonic::PageDown),
    ("print", KeyMnemonic::Print),
];

impl KeyMnemonic {
    /// Look up a bracket name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if let Some(&(_, key)) = NAMED.iter().find(|(n, _)| *n == lower) {
            return Some(key);
        }

        let numbered = |prefix: &str, max: u8| {
            lower
                .strip_prefix(prefix)
                .filter(|digits| !digits.starts_with('0'))
                .and_then(|digits| digits.parse::<u8>().ok())
                .filter(|n| (1..=max).contains(n))
        };
        numbered("pf", 24)
            .or_else(|| numbered("f", 24))
            .map(Self::Function)
            .or_else(|| numbered("pa", 3).map(Self::ProgramAttention))
    }

    /// Attention identifier, for keys that hand control to the host
    pub fn aid(&self) -> Option<u8> {
        match *self {
            Self::Enter => Some(aid::ENTER),
            Self::Function(n @ 1..=12) => Some(aid::F1 + n - 1),
            Self::Function(n @ 13..=24) => Some(aid::F13 + n - 13),
            Self::ProgramAttention(1) => Some(aid::PA1),
            Self::ProgramAttention(2) => Some(aid::PA2),
            Self::ProgramAttention(3) => Some(aid::PA3),
            Self::Clear => Some(aid::CLEAR),
            Self::Help => Some(aid::HELP),
            Self::PageUp => Some(aid::ROLL_DOWN),
            Self::PageDown => Some(aid::ROLL_UP),
            Self::Print => Some(aid::PRINT),
            _ => None,
        }
    }

    /// Whether the key starts a host round trip (and so a lock/unlock cycle)
    pub fn is_submit(&self) -> bool {
        self.aid().is_some() || matches!(self, Self::SysReq | Self::Attention)
    }

    /// Whether the host reads the modified fields along with the AID
    pub fn sends_fields(&self) -> bool {
        matches!(self, Self::Enter | Self::Function(_) | Self::PageUp | Self::PageDown)
    }

    /// Code written after the key escape byte. Submit keys use their AID;
    /// local editing keys use codes below the AID range.
    pub fn key_code(&self) -> u8 {
        if let Some(aid) = self.aid() {
            return aid;
        }
        match self {
            Self::Tab => 0x01,
            Self::BackTab => 0x02,
            Self::Home => 0x03,
            Self::End => 0x05,
            Self::Up => 0x06,
            Self::Down => 0x07,
            Self::Left => 0x08,
            Self::Right => 0x09,
            Self::Escape => 0x0A,
            Self::Backspace => 0x0B,
            Self::Delete => 0x0C,
            Self::Insert => 0x0D,
            Self::EraseEof => 0x10,
            Self::EraseInput => 0x11,
            Self::FieldExit => 0x12,
            Self::FieldPlus => 0x13,
            Self::FieldMinus => 0x14,
            Self::Dup => 0x15,
            Self::NewLine => 0x16,
            Self::Reset => 0x17,
            Self::SysReq => 0x18,
            Self::Attention => 0x19,
            // Every remaining key has an AID
            _ => 0x00,
        }
    }
}

impl fmt::Display for KeyMnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(n) => write!(f, "pf{n}"),
            Self::ProgramAttention(n) => write!(f, "pa{n}"),
            key => {
                let name = NAMED
                    .iter()
                    .find(|(_, k)| k == key)
                    .map_or("?", |(n, _)| n);
                f.write_str(name)
            }
        }
    }
}
