//! Host record decoder
//!
//! Turns one 5250 record into an ordered list of [`HostEvent`]s. The decoder
//! never touches the screen itself; the receive loop applies the events.

use thiserror::Error;
use tracing::{debug, trace};

use super::codes::*;
use crate::core::codepage::{CodepageConverter, TableConverter};
use crate::core::keyboard::HostSignal;
use crate::core::screen::{Cell, CellAttributes, Dimensions};
use crate::utils::hexdump;

/// Something the host asked for, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Blank the screen
    Clear,
    /// Cells written in reading order from a 0-based position
    Write {
        /// Start row
        row: u16,
        /// Start column
        col: u16,
        /// Cells to write
        cells: Vec<Cell>,
    },
    /// Roll rows `top..=bottom`
    Roll {
        /// First row, 0-based
        top: u16,
        /// Last row, 0-based
        bottom: u16,
        /// Lines to move
        lines: u16,
        /// Direction
        down: bool,
    },
    /// Cursor placement
    Cursor {
        /// Row, 0-based
        row: u16,
        /// Column, 0-based
        col: u16,
    },
    /// Input field opened by a Start Field order
    Field {
        /// First cell of the field, 0-based
        row: u16,
        /// First cell of the field, 0-based
        col: u16,
        /// Number of cells
        length: u16,
        /// Digits only
        numeric_only: bool,
    },
    /// Format table cleared
    ClearFields,
    /// Keyboard lock control
    Keyboard(HostSignal),
    /// Sound the alarm
    Alarm,
    /// Message waiting indicator
    MessageLight(bool),
    /// Out-of-band interrupt request
    InterruptRequest,
}

impl HostEvent {
    /// Whether applying the event changes the screen buffer
    pub fn touches_screen(&self) -> bool {
        matches!(
            self,
            Self::Clear
                | Self::Write { .. }
                | Self::Roll { .. }
                | Self::Cursor { .. }
                | Self::Field { .. }
                | Self::ClearFields
        )
    }
}

/// Malformed host record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataStreamError {
    /// Command did not start with the escape byte
    #[error("Expected escape at offset {offset}, found 0x{found:02X}")]
    MissingEscape {
        /// Offset in the record
        offset: usize,
        /// Byte found instead
        found: u8,
    },

    /// Unsupported command byte
    #[error("Unknown command 0x{0:02X}")]
    UnknownCommand(u8),

    /// Record ended inside a command or order
    #[error("Record truncated at offset {0}")]
    Truncated(usize),

    /// Buffer address outside the screen
    #[error("Address ({row},{col}) outside screen {dims}")]
    InvalidAddress {
        /// 1-based row as sent
        row: u8,
        /// 1-based column as sent
        col: u8,
        /// Screen size
        dims: Dimensions,
    },

    /// Length or parameter byte out of range
    #[error("Invalid {what}: 0x{value:02X}")]
    InvalidParameter {
        /// What was being decoded
        what: &'static str,
        /// Offending value
        value: u16,
    },
}

type ParseResult<T> = std::result::Result<T, DataStreamError>;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn next(&mut self) -> ParseResult<u8> {
        let b = *self.data.get(self.pos).ok_or(DataStreamError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn next_u16(&mut self) -> ParseResult<u16> {
        Ok(u16::from_be_bytes([self.next()?, self.next()?]))
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip(&mut self, n: usize) -> ParseResult<()> {
        if self.pos + n > self.data.len() {
            return Err(DataStreamError::Truncated(self.data.len()));
        }
        self.pos += n;
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Field {
    remaining: usize,
    protected: bool,
    numeric_only: bool,
}

/// Stateful decoder for one session's host records
#[derive(Debug)]
pub struct DataStreamParser {
    converter: TableConverter,
    dims: Dimensions,
    cursor: usize,
    display: CellAttributes,
    field: Option<Field>,
    run_start: usize,
    run: Vec<Cell>,
}

impl DataStreamParser {
    /// Decoder for a screen of the given size
    pub fn new(converter: TableConverter, dims: Dimensions) -> Self {
        Self {
            converter,
            dims,
            cursor: 0,
            display: CellAttributes::default(),
            field: None,
            run_start: 0,
            run: Vec::new(),
        }
    }

    /// Code page used for character data
    pub fn converter(&self) -> &TableConverter {
        &self.converter
    }

    /// Decode one record. A malformed record yields an error and no events,
    /// and leaves the decoder where the previous record left it.
    pub fn parse(&mut self, record: &[u8]) -> ParseResult<Vec<HostEvent>> {
        trace!("Host record ({} bytes):\n{}", record.len(), hexdump(record));
        let saved = (self.cursor, self.display, self.field);
        let result = self.decode(record);
        if result.is_err() {
            (self.cursor, self.display, self.field) = saved;
            self.converter.reset();
            self.run.clear();
        }
        result
    }

    fn decode(&mut self, record: &[u8]) -> ParseResult<Vec<HostEvent>> {
        self.converter.reset();
        self.run.clear();

        let mut events = Vec::new();
        let mut interrupt = false;
        let mut data = record;

        if record.len() >= GDS_FIXED_HEADER + 4 && record[2..4] == GDS_RECORD_TYPE {
            let var_len = usize::from(record[6]);
            let flags = record[7];
            let opcode = record[9];
            let start = GDS_FIXED_HEADER + var_len;
            if start > record.len() {
                return Err(DataStreamError::Truncated(record.len()));
            }
            debug!("GDS header: flags=0x{:02X} opcode=0x{:02X}", flags, opcode);
            interrupt = flags & FLAG_SRQ != 0;
            match opcode {
                OPCODE_MESSAGE_ON => events.push(HostEvent::MessageLight(true)),
                OPCODE_MESSAGE_OFF => events.push(HostEvent::MessageLight(false)),
                _ => {}
            }
            data = &record[start..];
        }

        let mut reader = Reader::new(data);
        while !reader.at_end() {
            let offset = reader.pos;
            let esc = reader.next()?;
            if esc != ESC {
                return Err(DataStreamError::MissingEscape { offset, found: esc });
            }
            let command = reader.next()?;
            self.command(command, &mut reader, &mut events)?;
        }

        if interrupt {
            events.push(HostEvent::InterruptRequest);
        }
        Ok(events)
    }

    fn command(&mut self, command: u8, reader: &mut Reader<'_>, events: &mut Vec<HostEvent>) -> ParseResult<()> {
        match command {
            CMD_CLEAR_UNIT => self.clear(events),
            CMD_CLEAR_UNIT_ALTERNATE => {
                let param = reader.next()?;
                if param != 0x00 && param != 0x80 {
                    return Err(DataStreamError::InvalidParameter {
                        what: "Clear Unit Alternate parameter",
                        value: u16::from(param),
                    });
                }
                self.clear(events);
            }
            CMD_CLEAR_FORMAT_TABLE => {
                self.flush(events);
                self.field = None;
                events.push(HostEvent::ClearFields);
            }
            CMD_WRITE_TO_DISPLAY => {
                let cc1 = reader.next()?;
                let cc2 = reader.next()?;
                if cc1 & CC1_LOCK_MASK != 0 {
                    events.push(HostEvent::Keyboard(HostSignal::InputInhibited));
                }
                let cursor = self.orders(reader, events)?;
                if let Some((row, col)) = cursor {
                    events.push(HostEvent::Cursor { row, col });
                }
                Self::control_two(cc2, events);
            }
            CMD_WRITE_ERROR_CODE | CMD_WRITE_ERROR_CODE_WINDOW => {
                if command == CMD_WRITE_ERROR_CODE_WINDOW {
                    reader.skip(2)?;
                }
                self.error_line(reader, events)?;
            }
            CMD_READ_INPUT_FIELDS | CMD_READ_MDT_FIELDS | CMD_READ_MDT_FIELDS_ALT => {
                let cc1 = reader.next()?;
                let cc2 = reader.next()?;
                if cc1 & CC1_LOCK_MASK != 0 {
                    events.push(HostEvent::Keyboard(HostSignal::InputInhibited));
                }
                Self::control_two(cc2, events);
            }
            CMD_READ_SCREEN_IMMEDIATE | CMD_READ_IMMEDIATE | CMD_SAVE_SCREEN | CMD_RESTORE_SCREEN => {
                debug!("Ignoring host read/save command 0x{:02X}", command);
            }
            CMD_ROLL => {
                let control = reader.next()?;
                let top = reader.next()?;
                let bottom = reader.next()?;
                if top == 0 || bottom < top || u16::from(bottom) > self.dims.rows {
                    return Err(DataStreamError::InvalidAddress {
                        row: top,
                        col: bottom,
                        dims: self.dims,
                    });
                }
                events.push(HostEvent::Roll {
                    top: u16::from(top) - 1,
                    bottom: u16::from(bottom) - 1,
                    lines: u16::from(control & 0x1F),
                    down: control & 0x80 != 0,
                });
            }
            CMD_WRITE_STRUCTURED_FIELD => {
                let length = reader.next_u16()?;
                if length < 2 {
                    return Err(DataStreamError::InvalidParameter {
                        what: "structured field length",
                        value: length,
                    });
                }
                debug!("Skipping structured field ({} bytes)", length);
                reader.skip(usize::from(length) - 2)?;
            }
            other => return Err(DataStreamError::UnknownCommand(other)),
        }
        Ok(())
    }

    fn control_two(cc2: u8, events: &mut Vec<HostEvent>) {
        if cc2 & CC2_ALARM != 0 {
            events.push(HostEvent::Alarm);
        }
        if cc2 & CC2_MESSAGE_ON != 0 {
            events.push(HostEvent::MessageLight(true));
        } else if cc2 & CC2_MESSAGE_OFF != 0 {
            events.push(HostEvent::MessageLight(false));
        }
        if cc2 & CC2_UNLOCK != 0 {
            events.push(HostEvent::Keyboard(HostSignal::InputEnabled));
        }
    }

    fn clear(&mut self, events: &mut Vec<HostEvent>) {
        self.flush(events);
        self.cursor = 0;
        self.display = CellAttributes::default();
        self.field = None;
        events.push(HostEvent::Clear);
    }

    /// Orders and data up to the next command. Returns the insert-cursor position.
    fn orders(&mut self, reader: &mut Reader<'_>, events: &mut Vec<HostEvent>) -> ParseResult<Option<(u16, u16)>> {
        let mut cursor = None;

        while let Some(byte) = reader.peek() {
            if byte == ESC {
                break;
            }
            reader.next()?;
            match byte {
                SBA => {
                    let address = self.address(reader)?;
                    self.flush(events);
                    // Addressing ends the current field and attribute run
                    self.field = None;
                    self.display = CellAttributes::default();
                    self.cursor = address;
                }
                IC | MC => {
                    let address = self.address(reader)?;
                    cursor = Some(self.position(address));
                }
                RA => {
                    let target = self.address(reader)?;
                    let fill = reader.next()?;
                    let area = self.dims.area();
                    let count = (target + area - self.cursor) % area + 1;
                    let ch = self.converter.to_unicode(fill);
                    for _ in 0..count {
                        self.put(ch, events);
                    }
                }
                EA => {
                    let target = self.address(reader)?;
                    let length = reader.next()?;
                    if !(2..=5).contains(&length) {
                        return Err(DataStreamError::InvalidParameter {
                            what: "Erase To Address length",
                            value: u16::from(length),
                        });
                    }
                    reader.skip(usize::from(length) - 1)?;
                    let area = self.dims.area();
                    let count = (target + area - self.cursor) % area + 1;
                    for _ in 0..count {
                        self.put(' ', events);
                    }
                }
                SOH => {
                    let length = reader.next()?;
                    if length > 7 {
                        return Err(DataStreamError::InvalidParameter {
                            what: "Start Of Header length",
                            value: u16::from(length),
                        });
                    }
                    reader.skip(usize::from(length))?;
                    self.field = None;
                }
                TD => {
                    let length = reader.next_u16()?;
                    for _ in 0..length {
                        let b = reader.next()?;
                        self.data_byte(b, events);
                    }
                }
                WEA => reader.skip(2)?,
                WDSF => {
                    let length = reader.next_u16()?;
                    if length < 2 {
                        return Err(DataStreamError::InvalidParameter {
                            what: "structured field length",
                            value: length,
                        });
                    }
                    reader.skip(usize::from(length) - 2)?;
                }
                SF => self.start_field(reader, events)?,
                b if CellAttributes::is_display_attribute(b) => self.attribute(b, events),
                b => self.data_byte(b, events),
            }
        }

        self.flush(events);
        Ok(cursor)
    }

    fn error_line(&mut self, reader: &mut Reader<'_>, events: &mut Vec<HostEvent>) -> ParseResult<()> {
        self.flush(events);
        let saved = (self.cursor, self.display, self.field.take());
        self.cursor = usize::from(self.dims.rows - 1) * usize::from(self.dims.cols);
        self.display = CellAttributes::default();

        while let Some(byte) = reader.peek() {
            if byte == ESC {
                break;
            }
            reader.next()?;
            if CellAttributes::is_display_attribute(byte) {
                self.attribute(byte, events);
            } else {
                self.data_byte(byte, events);
            }
        }
        self.flush(events);
        (self.cursor, self.display, self.field) = saved;
        Ok(())
    }

    fn start_field(&mut self, reader: &mut Reader<'_>, events: &mut Vec<HostEvent>) -> ParseResult<()> {
        let first = reader.next()?;
        let (attribute, protected, numeric_only) = if first & 0xE0 == 0x20 {
            // Output-only field: attribute without a format word
            (first, true, false)
        } else {
            let _ffw2 = reader.next()?;
            let mut next = reader.next()?;
            // Field control words come in pairs until the attribute byte
            while next & 0xE0 != 0x20 {
                reader.next()?;
                next = reader.next()?;
            }
            let shift = first & FFW_SHIFT_MASK;
            let numeric = matches!(
                shift,
                FFW_SHIFT_NUMERIC_ONLY | FFW_SHIFT_DIGITS_ONLY | FFW_SHIFT_SIGNED_NUMERIC
            );
            (next, first & FFW_BYPASS != 0, numeric)
        };
        let length = reader.next_u16()?;

        self.field = None;
        self.attribute(attribute, events);
        self.field = Some(Field {
            remaining: usize::from(length),
            protected,
            numeric_only,
        });
        if !protected && length > 0 {
            let (row, col) = self.position(self.cursor);
            events.push(HostEvent::Field {
                row,
                col,
                length,
                numeric_only,
            });
        }
        Ok(())
    }

    fn attribute(&mut self, byte: u8, events: &mut Vec<HostEvent>) {
        let attr = CellAttributes::default().with_display_attribute(byte);
        // The attribute position shows as a protected blank
        self.put_cell(Cell::new(' ', attr.protected(true)), events);
        self.display = attr;
    }

    fn data_byte(&mut self, byte: u8, events: &mut Vec<HostEvent>) {
        let was_lead = self.converter.needs_second_byte();
        match self.converter.step(byte) {
            Some(ch) if was_lead => {
                // A double-byte character covers two positions
                self.put(ch, events);
                self.put(' ', events);
            }
            Some(ch) => self.put(ch, events),
            None if self.converter.needs_second_byte() => {}
            // Shift-out / shift-in occupy a blank position
            None => self.put(' ', events),
        }
    }

    fn put(&mut self, ch: char, events: &mut Vec<HostEvent>) {
        let mut attr = self.display;
        match self.field.as_mut() {
            Some(field) if field.remaining > 0 => {
                attr.protected = field.protected;
                attr.numeric_only = field.numeric_only;
                field.remaining -= 1;
            }
            _ => attr.protected = true,
        }
        self.put_cell(Cell::new(ch, attr), events);
    }

    fn put_cell(&mut self, cell: Cell, events: &mut Vec<HostEvent>) {
        if self.run.is_empty() {
            self.run_start = self.cursor;
        }
        self.run.push(cell);
        self.cursor = (self.cursor + 1) % self.dims.area();
        if self.run.len() == self.dims.area() {
            self.flush(events);
        }
    }

    fn flush(&mut self, events: &mut Vec<HostEvent>) {
        if self.run.is_empty() {
            return;
        }
        let (row, col) = self.position(self.run_start);
        events.push(HostEvent::Write {
            row,
            col,
            cells: std::mem::take(&mut self.run),
        });
    }

    fn address(&self, reader: &mut Reader<'_>) -> ParseResult<usize> {
        let row = reader.next()?;
        let col = reader.next()?;
        if row == 0 || col == 0 || u16::from(row) > self.dims.rows || u16::from(col) > self.dims.cols {
            return Err(DataStreamError::InvalidAddress {
                row,
                col,
                dims: self.dims,
            });
        }
        Ok(usize::from(row - 1) * usize::from(self.dims.cols) + usize::from(col - 1))
    }

    // Addresses are always below rows * cols, both at most 255
    #[allow(clippy::cast_possible_truncation)]
    fn position(&self, address: usize) -> (u16, u16) {
        let cols = usize::from(self.dims.cols);
        ((address / cols) as u16, (address % cols) as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codepage::CodepageRegistry;
    use crate::core::datastream::RecordBuilder;

    fn parser(dims: Dimensions) -> DataStreamParser {
        let conv = CodepageRegistry::builtin().unwrap().converter("37").unwrap();
        DataStreamParser::new(conv, dims)
    }

    fn text_of(events: &[HostEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Write { cells, .. } => Some(cells.iter().map(|c| c.c).collect::<String>()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_signals_bracket_the_write() {
        let mut p = parser(Dimensions::MODEL_2);
        let record = RecordBuilder::new()
            .write_to_display(CC1_LOCK, CC2_UNLOCK)
            .set_buffer_address(1, 1)
            .raw(&[0xC8, 0xC9])
            .build();
        let events = p.parse(&record).unwrap();
        assert_eq!(events.first(), Some(&HostEvent::Keyboard(HostSignal::InputInhibited)));
        assert_eq!(events.last(), Some(&HostEvent::Keyboard(HostSignal::InputEnabled)));
        assert_eq!(text_of(&events), "HI");
    }

    #[test]
    fn test_sba_positions_run() {
        let mut p = parser(Dimensions::MODEL_2);
        let record = RecordBuilder::new()
            .write_to_display(0, 0)
            .set_buffer_address(3, 10)
            .raw(&[0xC1])
            .build();
        let events = p.parse(&record).unwrap();
        assert!(matches!(events[0], HostEvent::Write { row: 2, col: 9, .. }));
    }

    #[test]
    fn test_input_field_flags() {
        let mut p = parser(Dimensions::MODEL_2);
        let record = RecordBuilder::new()
            .write_to_display(0, 0)
            .set_buffer_address(5, 1)
            .start_field(Some([0x43, 0x00]), 0x27, 3)
            .raw(&[0xF1, 0xF2, 0xF3, 0xC1])
            .build();
        let events = p.parse(&record).unwrap();
        assert_eq!(
            events[0],
            HostEvent::Field { row: 4, col: 1, length: 3, numeric_only: true }
        );
        let HostEvent::Write { cells, .. } = &events[1] else {
            panic!("expected write");
        };
        // attribute, three field cells, one cell past the field
        assert_eq!(cells.len(), 5);
        assert!(cells[0].attr.protected);
        assert!(cells[1].attr.hidden && cells[1].attr.numeric_only && !cells[1].attr.protected);
        assert!(cells[4].attr.protected);
    }

    #[test]
    fn test_bypass_and_output_fields_are_protected() {
        let mut p = parser(Dimensions::MODEL_2);
        let record = RecordBuilder::new()
            .write_to_display(0, 0)
            .start_field(Some([0x60, 0x00]), 0x20, 1)
            .raw(&[0xC1])
            .start_field(None, 0x22, 1)
            .raw(&[0xC2])
            .build();
        let events = p.parse(&record).unwrap();
        let HostEvent::Write { cells, .. } = &events[0] else {
            panic!("expected write");
        };
        assert!(cells[1].attr.protected);
        assert!(cells[3].attr.protected && cells[3].attr.high_intensity);
        assert!(!events.iter().any(|e| matches!(e, HostEvent::Field { .. })));
    }

    #[test]
    fn test_repeat_to_address() {
        let mut p = parser(Dimensions::new(2, 5).unwrap());
        let record = RecordBuilder::new()
            .write_to_display(0, 0)
            .set_buffer_address(1, 4)
            .repeat_to_address(2, 2, 0x60)
            .build();
        let events = p.parse(&record).unwrap();
        assert_eq!(text_of(&events), "----");
        assert!(matches!(events[0], HostEvent::Write { row: 0, col: 3, .. }));
    }

    #[test]
    fn test_insert_cursor_event() {
        let mut p = parser(Dimensions::MODEL_2);
        let record = RecordBuilder::new()
            .write_to_display(0, CC2_UNLOCK)
            .insert_cursor(6, 53)
            .build();
        let events = p.parse(&record).unwrap();
        assert_eq!(
            events,
            vec![
                HostEvent::Cursor { row: 5, col: 52 },
                HostEvent::Keyboard(HostSignal::InputEnabled)
            ]
        );
    }

    #[test]
    fn test_interrupt_request_comes_last() {
        let mut p = parser(Dimensions::MODEL_2);
        let record = RecordBuilder::new()
            .interrupt_request()
            .write_to_display(0, CC2_UNLOCK)
            .raw(&[0xC1])
            .build();
        let events = p.parse(&record).unwrap();
        assert_eq!(events.last(), Some(&HostEvent::InterruptRequest));
        assert_eq!(text_of(&events), "A");
    }

    #[test]
    fn test_message_light_opcode() {
        let mut p = parser(Dimensions::MODEL_2);
        let record = RecordBuilder::new().opcode(OPCODE_MESSAGE_ON).build();
        assert_eq!(p.parse(&record).unwrap(), vec![HostEvent::MessageLight(true)]);
    }

    #[test]
    fn test_error_line_restores_position() {
        let mut p = parser(Dimensions::new(3, 4).unwrap());
        let record = RecordBuilder::new()
            .write_error_code(&[0xC5, 0xD9])
            .write_to_display(0, 0)
            .raw(&[0xC1])
            .build();
        let events = p.parse(&record).unwrap();
        assert!(matches!(events[0], HostEvent::Write { row: 2, col: 0, .. }));
        assert!(matches!(events[1], HostEvent::Write { row: 0, col: 0, .. }));
    }

    #[test]
    fn test_roll_command() {
        let mut p = parser(Dimensions::MODEL_2);
        let events = p.parse(&[ESC, CMD_ROLL, 0x82, 5, 20]).unwrap();
        assert_eq!(
            events,
            vec![HostEvent::Roll { top: 4, bottom: 19, lines: 2, down: true }]
        );
    }

    #[test]
    fn test_double_byte_data_takes_two_cells() {
        let conv = CodepageRegistry::builtin().unwrap().converter("930").unwrap();
        let mut p = DataStreamParser::new(conv, Dimensions::MODEL_2);
        let record = RecordBuilder::new()
            .write_to_display(0, 0)
            .raw(&[0xC1, 0x0E, 0x40, 0x40, 0x0F, 0xC2])
            .build();
        let events = p.parse(&record).unwrap();
        assert_eq!(text_of(&events), "A \u{3000}  B");
    }

    #[test]
    fn test_malformed_records() {
        let mut p = parser(Dimensions::MODEL_2);
        assert!(matches!(
            p.parse(&[0x11, 0x00]),
            Err(DataStreamError::MissingEscape { offset: 0, found: 0x11 })
        ));
        assert_eq!(p.parse(&[ESC, 0x99]), Err(DataStreamError::UnknownCommand(0x99)));
        assert!(matches!(p.parse(&[ESC, CMD_WRITE_TO_DISPLAY, 0]), Err(DataStreamError::Truncated(_))));
        assert!(matches!(
            p.parse(&[ESC, CMD_WRITE_TO_DISPLAY, 0, 0, SBA, 25, 1]),
            Err(DataStreamError::InvalidAddress { row: 25, .. })
        ));
    }

    #[test]
    fn test_discarded_record_leaves_position_alone() {
        let mut p = parser(Dimensions::MODEL_2);
        // Truncated inside the second SBA, after data moved the write position
        let broken = [ESC, CMD_WRITE_TO_DISPLAY, 0, 0, SBA, 10, 10, 0xC1, SBA, 5];
        assert!(matches!(p.parse(&broken), Err(DataStreamError::Truncated(_))));

        let events = p.parse(&[ESC, CMD_WRITE_TO_DISPLAY, 0, 0, 0xC2]).unwrap();
        assert!(matches!(events[0], HostEvent::Write { row: 0, col: 0, .. }));
        assert_eq!(text_of(&events), "B");
    }

    #[test]
    fn test_discarded_record_leaves_shift_state_alone() {
        let conv = CodepageRegistry::builtin().unwrap().converter("930").unwrap();
        let mut p = DataStreamParser::new(conv, Dimensions::MODEL_2);
        // Shift-out, then an unknown command before the shift-in
        assert!(p.parse(&[ESC, CMD_WRITE_TO_DISPLAY, 0, 0, 0x0E, 0x45, ESC, 0x99]).is_err());

        let events = p.parse(&[ESC, CMD_WRITE_TO_DISPLAY, 0, 0, 0xC1]).unwrap();
        assert_eq!(text_of(&events), "A");
    }
}
