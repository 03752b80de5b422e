//! Inbound record builder
//!
//! Records the terminal sends to the host. An AID record carries the cursor
//! address (1-based), the attention identifier and, for keys that read
//! input, one `SBA row col data` group per modified field. Attention and
//! System Request carry no data, only a header flag.

use bytes::{BufMut, Bytes, BytesMut};

use super::builder::RecordBuilder;
use super::codes::{FLAG_ATN, FLAG_SRQ, OPCODE_NOP, OPCODE_PUT_GET, SBA};

/// One record for the host, always with a GDS header
#[derive(Debug, Clone)]
pub struct InputRecord {
    flags: u8,
    opcode: u8,
    body: BytesMut,
}

impl InputRecord {
    /// AID record with the cursor at a 0-based position
    pub fn aid(cursor: (u16, u16), aid: u8) -> Self {
        let mut body = BytesMut::with_capacity(16);
        body.put_slice(&[address_byte(cursor.0), address_byte(cursor.1), aid]);
        Self {
            flags: 0,
            opcode: OPCODE_PUT_GET,
            body,
        }
    }

    /// Attention key
    pub fn attention() -> Self {
        Self {
            flags: FLAG_ATN,
            opcode: OPCODE_NOP,
            body: BytesMut::new(),
        }
    }

    /// System Request key
    pub fn system_request() -> Self {
        Self {
            flags: FLAG_SRQ,
            opcode: OPCODE_NOP,
            body: BytesMut::new(),
        }
    }

    /// Field contents at a 0-based position, already in host bytes
    #[must_use]
    pub fn field(mut self, row: u16, col: u16, data: &[u8]) -> Self {
        self.body.put_slice(&[SBA, address_byte(row), address_byte(col)]);
        self.body.put_slice(data);
        self
    }

    /// Finish the record
    pub fn build(self) -> Bytes {
        RecordBuilder::new()
            .header(self.flags, self.opcode)
            .raw(&self.body)
            .build()
    }
}

// Screens are at most 255x255, so a 0-based position plus one fits
fn address_byte(zero_based: u16) -> u8 {
    u8::try_from(zero_based.saturating_add(1)).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aid_record_with_field() {
        let record = InputRecord::aid((5, 52), 0xF1).field(5, 52, &[0xC1, 0xC2]).build();
        assert_eq!(
            &record[..],
            &[
                0x00, 0x12, 0x12, 0xA0, 0x00, 0x00, 0x04, 0x00, 0x00, 0x03, // header
                6, 53, 0xF1, // cursor and AID
                SBA, 6, 53, 0xC1, 0xC2,
            ]
        );
    }

    #[test]
    fn test_attention_has_flag_and_no_data() {
        let record = InputRecord::attention().build();
        assert_eq!(&record[..], &[0x00, 0x0A, 0x12, 0xA0, 0x00, 0x00, 0x04, 0x40, 0x00, 0x00]);
        let record = InputRecord::system_request().build();
        assert_eq!(record[7], FLAG_SRQ);
    }
}
