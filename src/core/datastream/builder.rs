//! Host record builder
//!
//! Produces the byte records a host would send. Used by the in-memory demo
//! host, benches and tests.

use bytes::{BufMut, Bytes, BytesMut};

use super::codes::*;
use crate::core::codepage::{EncodeError, TableConverter};

/// Fluent builder for one host record
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    header: Option<(u8, u8)>,
    body: BytesMut,
}

impl RecordBuilder {
    /// Empty record without a GDS header
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a GDS header with the given flags and opcode
    #[must_use]
    pub fn header(mut self, flags: u8, opcode: u8) -> Self {
        self.header = Some((flags, opcode));
        self
    }

    /// Set the header opcode, adding a header if needed
    #[must_use]
    pub fn opcode(mut self, opcode: u8) -> Self {
        let flags = self.header.map_or(0, |(f, _)| f);
        self.header = Some((flags, opcode));
        self
    }

    /// Flag the record as an interrupt request
    #[must_use]
    pub fn interrupt_request(mut self) -> Self {
        let (flags, opcode) = self.header.unwrap_or((0, OPCODE_PUT_GET));
        self.header = Some((flags | FLAG_SRQ, opcode));
        self
    }

    /// Clear Unit
    #[must_use]
    pub fn clear_unit(mut self) -> Self {
        self.body.put_slice(&[ESC, CMD_CLEAR_UNIT]);
        self
    }

    /// Write To Display with its two control characters
    #[must_use]
    pub fn write_to_display(mut self, cc1: u8, cc2: u8) -> Self {
        self.body.put_slice(&[ESC, CMD_WRITE_TO_DISPLAY, cc1, cc2]);
        self
    }

    /// Read MDT Fields with its two control characters
    #[must_use]
    pub fn read_mdt_fields(mut self, cc1: u8, cc2: u8) -> Self {
        self.body.put_slice(&[ESC, CMD_READ_MDT_FIELDS, cc1, cc2]);
        self
    }

    /// Write Error Code followed by raw host bytes
    #[must_use]
    pub fn write_error_code(mut self, data: &[u8]) -> Self {
        self.body.put_slice(&[ESC, CMD_WRITE_ERROR_CODE]);
        self.body.put_slice(data);
        self
    }

    /// Set Buffer Address (1-based)
    #[must_use]
    pub fn set_buffer_address(mut self, row: u8, col: u8) -> Self {
        self.body.put_slice(&[SBA, row, col]);
        self
    }

    /// Insert Cursor (1-based)
    #[must_use]
    pub fn insert_cursor(mut self, row: u8, col: u8) -> Self {
        self.body.put_slice(&[IC, row, col]);
        self
    }

    /// Repeat a host byte up to and including an address
    #[must_use]
    pub fn repeat_to_address(mut self, row: u8, col: u8, fill: u8) -> Self {
        self.body.put_slice(&[RA, row, col, fill]);
        self
    }

    /// Display attribute byte
    #[must_use]
    pub fn attribute(mut self, attr: u8) -> Self {
        self.body.put_u8(attr);
        self
    }

    /// Start Field. `ffw` of `None` makes an output-only field.
    #[must_use]
    pub fn start_field(mut self, ffw: Option<[u8; 2]>, attr: u8, length: u16) -> Self {
        self.body.put_u8(SF);
        if let Some(ffw) = ffw {
            self.body.put_slice(&ffw);
        }
        self.body.put_u8(attr);
        self.body.put_u16(length);
        self
    }

    /// Text encoded in the given code page
    pub fn text(mut self, text: &str, converter: &TableConverter) -> Result<Self, EncodeError> {
        let bytes = converter.encode(text)?;
        self.body.put_slice(&bytes);
        Ok(self)
    }

    /// Raw bytes
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.put_slice(bytes);
        self
    }

    /// Finish the record
    pub fn build(self) -> Bytes {
        let Some((flags, opcode)) = self.header else {
            return self.body.freeze();
        };
        let header_len = GDS_FIXED_HEADER + usize::from(GDS_VAR_HEADER_LEN);
        let mut out = BytesMut::with_capacity(header_len + self.body.len());
        out.put_u16(u16::try_from(header_len + self.body.len()).unwrap_or(u16::MAX));
        out.put_slice(&GDS_RECORD_TYPE);
        out.put_slice(&[0x00, 0x00, GDS_VAR_HEADER_LEN, flags, 0x00, opcode]);
        out.put_slice(&self.body);
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_record() {
        let record = RecordBuilder::new()
            .write_to_display(CC1_LOCK, CC2_UNLOCK)
            .set_buffer_address(1, 1)
            .build();
        assert_eq!(&record[..], &[0x04, 0x11, 0x20, 0x08, 0x11, 1, 1]);
    }

    #[test]
    fn test_header_record() {
        let record = RecordBuilder::new().interrupt_request().clear_unit().build();
        assert_eq!(
            &record[..],
            &[0x00, 0x0C, 0x12, 0xA0, 0x00, 0x00, 0x04, 0x04, 0x00, 0x03, 0x04, 0x40]
        );
    }
}
