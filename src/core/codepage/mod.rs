//! EBCDIC code-page conversion
//!
//! Provides:
//! - Declarative descriptors (one JSON record per code page)
//! - A registry that validates descriptors on load and builds each table once
//! - One table-driven converter type for every page, single- or double-byte
//!
//! Converters own their shift state, so each decode stream (one per session)
//! gets its own converter while all of them share the same immutable table.

mod descriptor;
mod registry;
mod table;

pub use descriptor::{CodepageDescriptor, DEFAULT_SHIFT_IN, DEFAULT_SHIFT_OUT};
pub use registry::{normalize_id, CodepageRegistry};
pub use table::{CodepageTable, DoubleByteTable, REPLACEMENT};

use std::sync::Arc;
use thiserror::Error;

use crate::core::error::Error;

/// Character with no encoding in the active code page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("U+{:04X} cannot be represented in CCSID-{codepage}", u32::from(*ch))]
pub struct EncodeError {
    /// Offending character
    pub ch: char,
    /// Character offset in the encoded text
    pub position: usize,
    /// Code page id
    pub codepage: String,
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        Error::Parse {
            token: format!("U+{:04X}", u32::from(err.ch)),
            position: err.position,
            reason: format!("no CCSID-{} mapping for", err.codepage),
        }
    }
}

/// Conversion capability between host bytes and Unicode
pub trait CodepageConverter: Send {
    /// Decode one host byte. Shift bytes and the first half of a double-byte
    /// pair produce no character and return NUL.
    fn to_unicode(&mut self, byte: u8) -> char;

    /// Single host byte for a character, if the page has one
    fn to_host_byte(&self, ch: char) -> Option<u8>;

    /// Display name of the code page
    fn name(&self) -> &str;

    /// Description of the code page
    fn description(&self) -> &str;

    /// Decoder is currently in double-byte mode
    fn is_double_byte_active(&self) -> bool;

    /// Previous byte was a lead byte waiting for its partner
    fn needs_second_byte(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Shift {
    #[default]
    Single,
    Double,
    Lead(u8),
}

/// Table-driven converter used for every code page
#[derive(Debug, Clone)]
pub struct TableConverter {
    table: Arc<CodepageTable>,
    shift: Shift,
}

impl TableConverter {
    /// Converter over a shared table, starting in single-byte mode
    pub fn new(table: Arc<CodepageTable>) -> Self {
        Self {
            table,
            shift: Shift::Single,
        }
    }

    /// Underlying table
    pub fn table(&self) -> &Arc<CodepageTable> {
        &self.table
    }

    /// Code page id
    pub fn id(&self) -> &str {
        self.table.id()
    }

    /// Drop any shift state, e.g. at a record boundary
    pub fn reset(&mut self) {
        self.shift = Shift::Single;
    }

    /// Decode one byte; `None` when the byte only changes shift state
    pub fn step(&mut self, byte: u8) -> Option<char> {
        let Some(dbcs) = self.table.double_byte() else {
            return Some(self.table.decode(byte));
        };

        if byte == dbcs.shift_out() {
            self.shift = Shift::Double;
            return None;
        }
        if byte == dbcs.shift_in() {
            self.shift = Shift::Single;
            return None;
        }

        match self.shift {
            Shift::Single => Some(self.table.decode(byte)),
            Shift::Double => {
                self.shift = Shift::Lead(byte);
                None
            }
            Shift::Lead(lead) => {
                self.shift = Shift::Double;
                Some(dbcs.decode(lead, byte))
            }
        }
    }

    /// Decode a byte stream, skipping shift markers
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        bytes.iter().filter_map(|&b| self.step(b)).collect()
    }

    /// Encode text, wrapping double-byte runs in shift-out / shift-in
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodeError> {
        let dbcs = self.table.double_byte();
        let mut out = Vec::with_capacity(text.len());
        let mut in_double = false;

        for (position, ch) in text.chars().enumerate() {
            if let Some(byte) = self.table.encode(ch) {
                if let (true, Some(d)) = (in_double, dbcs) {
                    out.push(d.shift_in());
                    in_double = false;
                }
                out.push(byte);
            } else if let Some((d, code)) = dbcs.and_then(|d| d.encode(ch).map(|c| (d, c))) {
                if !in_double {
                    out.push(d.shift_out());
                    in_double = true;
                }
                out.extend_from_slice(&code.to_be_bytes());
            } else {
                return Err(EncodeError {
                    ch,
                    position,
                    codepage: self.table.id().to_string(),
                });
            }
        }

        if let (true, Some(d)) = (in_double, dbcs) {
            out.push(d.shift_in());
        }
        Ok(out)
    }
}

impl CodepageConverter for TableConverter {
    fn to_unicode(&mut self, byte: u8) -> char {
        self.step(byte).unwrap_or('\0')
    }

    fn to_host_byte(&self, ch: char) -> Option<u8> {
        self.table.encode(ch)
    }

    fn name(&self) -> &str {
        self.table.name()
    }

    fn description(&self) -> &str {
        self.table.description()
    }

    fn is_double_byte_active(&self) -> bool {
        self.shift != Shift::Single
    }

    fn needs_second_byte(&self) -> bool {
        matches!(self.shift, Shift::Lead(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CodepageRegistry {
        CodepageRegistry::builtin().unwrap()
    }

    #[test]
    fn test_ccsid37_basics() {
        let mut conv = registry().converter("37").unwrap();
        assert_eq!(conv.to_unicode(0xC1), 'A');
        assert_eq!(conv.to_unicode(0x81), 'a');
        assert_eq!(conv.to_unicode(0x40), ' ');
        assert_eq!(conv.to_unicode(0xF0), '0');
        assert_eq!(conv.to_host_byte('Z'), Some(0xE9));
        assert_eq!(conv.decode(&[0xC8, 0x85, 0x93, 0x93, 0x96]), "Hello");
        assert!(!conv.is_double_byte_active());
    }

    #[test]
    fn test_national_variants_differ() {
        let reg = registry();
        let mut us = reg.converter("37").unwrap();
        let mut de = reg.converter("273").unwrap();
        let mut euro = reg.converter("1140").unwrap();
        assert_eq!(us.to_unicode(0x4A), '\u{A2}');
        assert_eq!(de.to_unicode(0x4A), '\u{C4}');
        assert_eq!(euro.to_unicode(0x9F), '\u{20AC}');
    }

    #[test]
    fn test_unmappable_names_codepoint_and_page() {
        let conv = registry().converter("37").unwrap();
        let err = conv.encode("ok\u{FFFF}").unwrap_err();
        assert_eq!(err.position, 2);
        let msg = err.to_string();
        assert!(msg.contains("U+FFFF"));
        assert!(msg.contains("CCSID-37"));

        let err: Error = err.into();
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("U+FFFF"));
    }

    #[test]
    fn test_double_byte_shift_state() {
        let mut conv = registry().converter("930").unwrap();
        assert_eq!(conv.to_unicode(0x0E), '\0');
        assert!(conv.is_double_byte_active());
        assert!(!conv.needs_second_byte());

        assert_eq!(conv.to_unicode(0x40), '\0');
        assert!(conv.needs_second_byte());
        assert_eq!(conv.to_unicode(0x40), '\u{3000}');
        assert!(!conv.needs_second_byte());

        assert_eq!(conv.to_unicode(0x0F), '\0');
        assert!(!conv.is_double_byte_active());
        assert_eq!(conv.to_unicode(0xC1), 'A');
    }

    #[test]
    fn test_double_byte_encode_wraps_runs() {
        let reg = registry();
        let conv = reg.converter("930").unwrap();
        let bytes = conv.encode("A\u{3000}\u{3000}B").unwrap();
        assert_eq!(bytes, vec![0xC1, 0x0E, 0x40, 0x40, 0x40, 0x40, 0x0F, 0xC2]);

        let mut decoder = reg.converter("930").unwrap();
        assert_eq!(decoder.decode(&bytes), "A\u{3000}\u{3000}B");
    }

    #[test]
    fn test_shift_state_is_per_converter() {
        let reg = registry();
        let mut a = reg.converter("930").unwrap();
        let b = reg.converter("930").unwrap();
        a.to_unicode(0x0E);
        assert!(a.is_double_byte_active());
        assert!(!b.is_double_byte_active());
        a.reset();
        assert!(!a.is_double_byte_active());
    }
}
