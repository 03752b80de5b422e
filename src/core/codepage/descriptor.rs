//! Declarative code-page descriptors
//!
//! A descriptor is plain data: 256 forward code points, optional extra
//! reverse encodings and, for double-byte pages, a secondary pair table.
//! Validation happens when a descriptor is loaded, never at first use.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::error::{Error, Result};

/// Default shift-out byte (enter double-byte mode)
pub const DEFAULT_SHIFT_OUT: u8 = 0x0E;
/// Default shift-in byte (leave double-byte mode)
pub const DEFAULT_SHIFT_IN: u8 = 0x0F;

/// One code page as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodepageDescriptor {
    /// Code page identifier, usually the CCSID number
    pub id: String,
    /// Display name
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Byte to code point table, exactly 256 entries
    pub forward: Vec<u32>,
    /// Additional `(code point, byte)` encodings accepted on output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reverse: Vec<(u32, u8)>,
    /// Page has a double-byte half
    #[serde(default)]
    pub double_byte: bool,
    /// Byte that switches into double-byte mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_out: Option<u8>,
    /// Byte that switches back to single-byte mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_in: Option<u8>,
    /// Two-byte host code to code point table
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<(u16, u32)>,
}

/// A descriptor file holds either one page or a list of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DescriptorFile {
    Many { codepages: Vec<CodepageDescriptor> },
    One(CodepageDescriptor),
}

impl CodepageDescriptor {
    /// Parse and validate a single descriptor from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Malformed code page descriptor: {e}")))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Parse and validate every descriptor held in a JSON document
    pub fn parse_many(json: &str) -> Result<Vec<Self>> {
        let file: DescriptorFile = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Malformed code page descriptor: {e}")))?;
        let descriptors = match file {
            DescriptorFile::Many { codepages } => codepages,
            DescriptorFile::One(descriptor) => vec![descriptor],
        };
        for descriptor in &descriptors {
            descriptor.validate()?;
        }
        Ok(descriptors)
    }

    /// Effective shift-out byte
    pub fn shift_out_byte(&self) -> u8 {
        self.shift_out.unwrap_or(DEFAULT_SHIFT_OUT)
    }

    /// Effective shift-in byte
    pub fn shift_in_byte(&self) -> u8 {
        self.shift_in.unwrap_or(DEFAULT_SHIFT_IN)
    }

    /// Check every structural rule a table build relies on
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::Configuration(format!("Code page '{}': {reason}", self.id)));

        if self.id.trim().is_empty() {
            return Err(Error::Configuration("Code page descriptor without id".to_string()));
        }
        if self.description.trim().is_empty() {
            return fail("description is empty".to_string());
        }
        if self.forward.len() != 256 {
            return fail(format!("forward table has {} entries, expected 256", self.forward.len()));
        }
        for (byte, &cp) in self.forward.iter().enumerate() {
            if char::from_u32(cp).is_none() {
                return fail(format!("byte 0x{byte:02X} maps to invalid code point 0x{cp:X}"));
            }
        }

        for &(cp, byte) in &self.reverse {
            let Some(ch) = char::from_u32(cp) else {
                return fail(format!("reverse entry has invalid code point 0x{cp:X}"));
            };
            // An extra encoding must not disagree with what the page decodes.
            if let Some(decoded_from) = self.forward.iter().position(|&f| f == cp) {
                if self.forward[usize::from(byte)] != cp {
                    return fail(format!(
                        "reverse entry U+{:04X} -> 0x{byte:02X} contradicts forward byte 0x{decoded_from:02X}",
                        u32::from(ch)
                    ));
                }
            }
        }

        if self.double_byte {
            let (so, si) = (self.shift_out_byte(), self.shift_in_byte());
            if so == si {
                return fail(format!("shift-out and shift-in are both 0x{so:02X}"));
            }
            if self.secondary.is_empty() {
                return fail("double-byte page without secondary table".to_string());
            }
            let mut seen = HashSet::with_capacity(self.secondary.len());
            for &(code, cp) in &self.secondary {
                let [lead, trail] = code.to_be_bytes();
                if [lead, trail].iter().any(|b| *b == so || *b == si) {
                    return fail(format!("secondary code 0x{code:04X} contains a shift byte"));
                }
                if char::from_u32(cp).is_none() {
                    return fail(format!("secondary code 0x{code:04X} maps to invalid code point 0x{cp:X}"));
                }
                if !seen.insert(code) {
                    return fail(format!("secondary code 0x{code:04X} listed twice"));
                }
            }
        } else if !self.secondary.is_empty() || self.shift_out.is_some() || self.shift_in.is_some() {
            return fail("double-byte data present but double_byte is not set".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> CodepageDescriptor {
        CodepageDescriptor {
            id: id.to_string(),
            name: format!("Test {id}"),
            description: "identity page".to_string(),
            forward: (0..256).collect(),
            reverse: Vec::new(),
            double_byte: false,
            shift_out: None,
            shift_in: None,
            secondary: Vec::new(),
        }
    }

    #[test]
    fn test_identity_is_valid() {
        assert!(identity("1").validate().is_ok());
    }

    #[test]
    fn test_short_forward_rejected() {
        let mut d = identity("1");
        d.forward.pop();
        let err = d.validate().unwrap_err();
        assert!(err.to_string().contains("255 entries"));
    }

    #[test]
    fn test_surrogate_rejected() {
        let mut d = identity("1");
        d.forward[0x41] = 0xD800;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_empty_description_rejected() {
        let mut d = identity("1");
        d.description = "  ".to_string();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_contradicting_reverse_rejected() {
        let mut d = identity("1");
        // 'A' decodes from 0x41, claiming it encodes as 0x42 breaks the round trip
        d.reverse.push((0x41, 0x42));
        assert!(d.validate().is_err());

        let mut d = identity("1");
        d.forward[0x27] = 0x2019;
        d.reverse.push((0x27, 0x27 + 1));
        // U+0027 is no longer produced by the page, any target is allowed
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_secondary_requires_flag() {
        let mut d = identity("1");
        d.secondary.push((0x4040, 0x3000));
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_double_byte_rules() {
        let mut d = identity("930x");
        d.double_byte = true;
        assert!(d.validate().is_err(), "empty secondary table");

        d.secondary.push((0x4040, 0x3000));
        assert!(d.validate().is_ok());

        d.secondary.push((0x0E41, 0x4E00));
        assert!(d.validate().is_err(), "shift byte inside a pair");

        d.secondary.pop();
        d.secondary.push((0x4040, 0x3001));
        assert!(d.validate().is_err(), "duplicate code");
    }

    #[test]
    fn test_parse_many_accepts_both_layouts() {
        let one = serde_json::to_string(&identity("1")).unwrap();
        assert_eq!(CodepageDescriptor::parse_many(&one).unwrap().len(), 1);

        let many = format!(
            "{{\"codepages\": [{}, {}]}}",
            serde_json::to_string(&identity("1")).unwrap(),
            serde_json::to_string(&identity("2")).unwrap()
        );
        let parsed = CodepageDescriptor::parse_many(&many).unwrap();
        assert_eq!(parsed[1].id, "2");
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        let err = CodepageDescriptor::from_json("{\"id\": 5}").unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
