//! Byte formatting helpers

use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Format bytes as an offset + hex dump, sixteen bytes per line.
///
/// Host data is EBCDIC, so there is no ASCII sidebar.
pub fn hexdump(data: &[u8]) -> String {
    let mut output = String::new();

    for (line, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(output, "{:04x} ", line * BYTES_PER_LINE);
        for (i, byte) in chunk.iter().enumerate() {
            if i == BYTES_PER_LINE / 2 {
                output.push(' ');
            }
            let _ = write!(output, " {byte:02X}");
        }
        output.push('\n');
    }

    output
}

/// Parse hex text such as `"04 11 00 08"`, `"0x04,0x11"` or `"04110008"`
pub fn parse_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let cleaned: String = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|part| part.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    hex::decode(cleaned)
}
