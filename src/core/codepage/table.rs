//! Immutable code-page tables
//!
//! A [`CodepageTable`] is built once from a validated descriptor and then
//! shared read-only (behind an `Arc`) by every converter using that page.

use std::collections::HashMap;

use super::descriptor::CodepageDescriptor;

/// Substitute for bytes and pairs a page leaves undefined
pub const REPLACEMENT: char = '\u{FFFD}';

/// Double-byte half of a mixed page
#[derive(Debug, Clone)]
pub struct DoubleByteTable {
    shift_out: u8,
    shift_in: u8,
    pairs: HashMap<u16, char>,
    reverse: HashMap<char, u16>,
}

impl DoubleByteTable {
    /// Byte that enters double-byte mode
    pub fn shift_out(&self) -> u8 {
        self.shift_out
    }

    /// Byte that leaves double-byte mode
    pub fn shift_in(&self) -> u8 {
        self.shift_in
    }

    /// Decode a lead/trail pair
    pub fn decode(&self, lead: u8, trail: u8) -> char {
        self.pairs
            .get(&u16::from_be_bytes([lead, trail]))
            .copied()
            .unwrap_or(REPLACEMENT)
    }

    /// Two-byte host code for a character
    pub fn encode(&self, ch: char) -> Option<u16> {
        self.reverse.get(&ch).copied()
    }

    /// Number of defined pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no pair is defined
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// One fully built code page
#[derive(Debug, Clone)]
pub struct CodepageTable {
    id: String,
    name: String,
    description: String,
    forward: [char; 256],
    reverse: HashMap<char, u8>,
    double_byte: Option<DoubleByteTable>,
}

impl CodepageTable {
    /// Build a table from a descriptor that already passed validation
    pub fn from_descriptor(descriptor: &CodepageDescriptor) -> Self {
        let mut forward = [REPLACEMENT; 256];
        for (slot, &cp) in forward.iter_mut().zip(&descriptor.forward) {
            *slot = char::from_u32(cp).unwrap_or(REPLACEMENT);
        }

        // Lowest byte wins when several bytes decode to the same character
        let mut reverse = HashMap::with_capacity(256 + descriptor.reverse.len());
        for (byte, &ch) in (0u8..=255).zip(forward.iter()) {
            reverse.entry(ch).or_insert(byte);
        }
        for &(cp, byte) in &descriptor.reverse {
            if let Some(ch) = char::from_u32(cp) {
                reverse.entry(ch).or_insert(byte);
            }
        }

        let double_byte = descriptor.double_byte.then(|| {
            let mut pairs = HashMap::with_capacity(descriptor.secondary.len());
            let mut rev = HashMap::with_capacity(descriptor.secondary.len());
            let mut codes: Vec<_> = descriptor.secondary.clone();
            codes.sort_unstable_by_key(|&(code, _)| code);
            for (code, cp) in codes {
                if let Some(ch) = char::from_u32(cp) {
                    pairs.insert(code, ch);
                    rev.entry(ch).or_insert(code);
                }
            }
            DoubleByteTable {
                shift_out: descriptor.shift_out_byte(),
                shift_in: descriptor.shift_in_byte(),
                pairs,
                reverse: rev,
            }
        });

        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            forward,
            reverse,
            double_byte,
        }
    }

    /// Code page identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Decode a single host byte
    #[inline]
    pub fn decode(&self, byte: u8) -> char {
        self.forward[usize::from(byte)]
    }

    /// Encode a character as a single host byte
    #[inline]
    pub fn encode(&self, ch: char) -> Option<u8> {
        self.reverse.get(&ch).copied()
    }

    /// The whole forward table
    pub fn forward(&self) -> &[char; 256] {
        &self.forward
    }

    /// Double-byte half, if this page has one
    pub fn double_byte(&self) -> Option<&DoubleByteTable> {
        self.double_byte.as_ref()
    }

    /// Whether the page can switch into double-byte mode
    pub fn is_double_byte(&self) -> bool {
        self.double_byte.is_some()
    }
}
