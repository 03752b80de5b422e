//! Operator key entry
//!
//! Plays a key sequence against the screen the way a 5250 operator would.
//! Characters land in input fields and flag the field as modified, field
//! keys move between fields, and each submit key becomes one inbound record
//! carrying the cursor, the AID and the modified fields.

use bytes::Bytes;
use tracing::trace;

use super::keys::KeyMnemonic;
use super::sequence::{KeySequence, KeyToken};
use crate::core::codepage::TableConverter;
use crate::core::datastream::InputRecord;
use crate::core::error::{Error, Result};
use crate::core::screen::ScreenBuffer;

/// Host byte the Dup key repeats to the end of a field
const DUP: u8 = 0x1C;

/// Applies keys to one screen and collects the records to send
pub struct KeyEntry<'a> {
    screen: &'a mut ScreenBuffer,
    converter: &'a TableConverter,
    insert: bool,
    records: Vec<Bytes>,
}

impl<'a> KeyEntry<'a> {
    /// Entry against a screen, encoding field data with `converter`
    pub fn new(screen: &'a mut ScreenBuffer, converter: &'a TableConverter) -> Self {
        Self {
            screen,
            converter,
            insert: false,
            records: Vec::new(),
        }
    }

    /// Apply every token in order and return the records, one per submit
    /// key. On error the screen is left part-way; callers edit a copy.
    pub fn apply(mut self, keys: &KeySequence) -> Result<Vec<Bytes>> {
        for token in keys.tokens() {
            match *token {
                KeyToken::Char(ch) => self.type_char(ch)?,
                KeyToken::Key(key) => self.press(key)?,
            }
        }
        Ok(self.records)
    }

    fn type_char(&mut self, ch: char) -> Result<()> {
        let pos = self.cursor();
        let Some(index) = self.screen.field_index_at(pos) else {
            let (row, col) = self.screen.position(pos);
            return Err(Error::State(format!(
                "Cursor at ({row},{col}) is not in an input field"
            )));
        };
        let field = self.screen.fields()[index];
        if field.numeric_only && !(ch.is_ascii_digit() || matches!(ch, ' ' | '+' | '-' | ',' | '.')) {
            return Err(Error::State(format!("'{ch}' typed into a numeric-only field")));
        }
        if self.insert {
            if self.screen.char_at(field.end() - 1).is_some_and(|c| c != ' ') {
                let (row, col) = self.screen.position(field.start);
                return Err(Error::State(format!("No room to insert in field at ({row},{col})")));
            }
            for i in (pos + 1..field.end()).rev() {
                let moved = self.screen.char_at(i - 1).unwrap_or(' ');
                self.screen.put_char(i, moved);
            }
        }

        self.screen.put_char(pos, ch);
        self.screen.mark_modified(index);
        if pos + 1 < field.end() {
            self.move_to(pos + 1)
        } else {
            self.next_field(pos)
        }
    }

    fn press(&mut self, key: KeyMnemonic) -> Result<()> {
        if let Some(aid) = key.aid() {
            return self.submit(key, aid);
        }

        let pos = self.cursor();
        let area = self.screen.dimensions().area();
        let cols = usize::from(self.screen.dimensions().cols);
        let field = self
            .screen
            .field_index_at(pos)
            .map(|index| (index, self.screen.fields()[index]));

        match key {
            KeyMnemonic::Tab => self.next_field(pos)?,
            KeyMnemonic::BackTab => self.previous_field(pos)?,
            KeyMnemonic::Home => {
                let first = self.screen.fields().first().map_or(0, |f| f.start);
                self.move_to(first)?;
            }
            KeyMnemonic::End => {
                if let Some((_, f)) = field {
                    let last_used = (f.start..f.end())
                        .rev()
                        .find(|&i| self.screen.char_at(i).is_some_and(|c| c != ' '));
                    let target = last_used.map_or(f.start, |i| (i + 1).min(f.end() - 1));
                    self.move_to(target)?;
                }
            }
            KeyMnemonic::Up => self.move_to((pos + area - cols) % area)?,
            KeyMnemonic::Down => self.move_to((pos + cols) % area)?,
            KeyMnemonic::Left => self.move_to((pos + area - 1) % area)?,
            KeyMnemonic::Right => self.move_to((pos + 1) % area)?,
            KeyMnemonic::NewLine => {
                let line = (pos / cols + 1) * cols % area;
                let target = self
                    .screen
                    .fields()
                    .iter()
                    .find(|f| f.start >= line)
                    .or_else(|| self.screen.fields().first())
                    .map_or(line, |f| f.start);
                self.move_to(target)?;
            }
            KeyMnemonic::Backspace => match field {
                Some((_, f)) if pos > f.start => self.move_to(pos - 1)?,
                _ => self.move_to((pos + area - 1) % area)?,
            },
            KeyMnemonic::Delete => {
                if let Some((index, f)) = field {
                    for i in pos..f.end() - 1 {
                        let moved = self.screen.char_at(i + 1).unwrap_or(' ');
                        self.screen.put_char(i, moved);
                    }
                    self.screen.put_char(f.end() - 1, ' ');
                    self.screen.mark_modified(index);
                }
            }
            KeyMnemonic::Insert => self.insert = !self.insert,
            KeyMnemonic::EraseEof => {
                if let Some((index, f)) = field {
                    self.fill(index, pos, f.end(), ' ');
                }
            }
            KeyMnemonic::EraseInput => {
                for index in 0..self.screen.fields().len() {
                    let f = self.screen.fields()[index];
                    self.fill(index, f.start, f.end(), ' ');
                }
                let first = self.screen.fields().first().map_or(0, |f| f.start);
                self.move_to(first)?;
            }
            KeyMnemonic::FieldExit | KeyMnemonic::FieldPlus | KeyMnemonic::FieldMinus => {
                if let Some((index, f)) = field {
                    self.fill(index, pos, f.end(), ' ');
                }
                self.next_field(pos)?;
            }
            KeyMnemonic::Dup => {
                if let Some((index, f)) = field {
                    let dup = self.converter.table().decode(DUP);
                    self.fill(index, pos, f.end(), dup);
                }
                self.next_field(pos)?;
            }
            KeyMnemonic::Attention => self.records.push(InputRecord::attention().build()),
            KeyMnemonic::SysReq => self.records.push(InputRecord::system_request().build()),
            KeyMnemonic::Escape | KeyMnemonic::Reset => trace!("[{}] has no local effect", key),
            // Every remaining key carries an AID and was submitted above
            _ => {}
        }
        Ok(())
    }

    fn submit(&mut self, key: KeyMnemonic, aid: u8) -> Result<()> {
        let mut record = InputRecord::aid(self.screen.cursor(), aid);
        if key.sends_fields() {
            let modified: Vec<usize> = self
                .screen
                .fields()
                .iter()
                .enumerate()
                .filter(|(_, f)| f.modified)
                .map(|(index, _)| index)
                .collect();
            for index in modified {
                let start = self.screen.fields()[index].start;
                let text = self.screen.field_text(index).unwrap_or_default();
                let data = self.converter.encode(text.trim_end_matches(' '))?;
                let (row, col) = self.screen.position(start);
                record = record.field(row, col, &data);
            }
        }
        self.screen.reset_modified();
        trace!("[{}] submitted with AID 0x{:02X}", key, aid);
        self.records.push(record.build());
        Ok(())
    }

    fn fill(&mut self, index: usize, from: usize, to: usize, ch: char) {
        for i in from..to {
            self.screen.put_char(i, ch);
        }
        self.screen.mark_modified(index);
    }

    fn next_field(&mut self, from: usize) -> Result<()> {
        let fields = self.screen.fields();
        let target = fields
            .iter()
            .find(|f| f.start > from)
            .or_else(|| fields.first())
            .map(|f| f.start);
        match target {
            Some(start) => self.move_to(start),
            None => Ok(()),
        }
    }

    fn previous_field(&mut self, from: usize) -> Result<()> {
        let fields = self.screen.fields();
        let target = match self.screen.field_index_at(from) {
            Some(index) if fields[index].start < from => Some(fields[index].start),
            _ => fields
                .iter()
                .rev()
                .find(|f| f.start < from)
                .or_else(|| fields.last())
                .map(|f| f.start),
        };
        match target {
            Some(start) => self.move_to(start),
            None => Ok(()),
        }
    }

    fn cursor(&self) -> usize {
        let (row, col) = self.screen.cursor();
        self.screen.offset(row, col)
    }

    fn move_to(&mut self, pos: usize) -> Result<()> {
        let (row, col) = self.screen.position(pos);
        self.screen.set_cursor(row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codepage::CodepageRegistry;
    use crate::core::datastream::codes::{FLAG_ATN, SBA};
    use crate::core::screen::Dimensions;

    fn converter() -> TableConverter {
        CodepageRegistry::builtin().unwrap().converter("37").unwrap()
    }

    /// Sign-on style screen: two 10-cell fields, cursor in the first
    fn sign_on() -> ScreenBuffer {
        let mut screen = ScreenBuffer::new(Dimensions::MODEL_2);
        screen.define_field(5, 52, 10, false).unwrap();
        screen.define_field(6, 52, 10, false).unwrap();
        screen.set_cursor(5, 52).unwrap();
        screen
    }

    fn enter(screen: &mut ScreenBuffer, keys: &str) -> Result<Vec<Bytes>> {
        let conv = converter();
        KeyEntry::new(screen, &conv).apply(&KeySequence::parse(keys).unwrap())
    }

    #[test]
    fn test_sign_on_record() {
        let mut screen = sign_on();
        let records = enter(&mut screen, "QUSER[tab]SECRET[enter]").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            &records[0][..],
            &[
                0x00, 0x1E, 0x12, 0xA0, 0x00, 0x00, 0x04, 0x00, 0x00, 0x03, // header
                7, 59, 0xF1, // cursor after "SECRET", Enter
                SBA, 6, 53, 0xD8, 0xE4, 0xE2, 0xC5, 0xD9, // QUSER
                SBA, 7, 53, 0xE2, 0xC5, 0xC3, 0xD9, 0xC5, 0xE3, // SECRET
            ]
        );
        assert!(screen.row_text(5).unwrap().contains("QUSER"));
        assert!(screen.fields().iter().all(|f| !f.modified));
    }

    #[test]
    fn test_unmodified_fields_are_not_sent() {
        let mut screen = sign_on();
        let records = enter(&mut screen, "[tab]PW[pf3]").unwrap();
        // F3 reads input: only the second field changed
        assert_eq!(&records[0][10..], &[7, 55, 0x33, SBA, 7, 53, 0xD7, 0xE6]);

        // PA keys send only the cursor and AID
        let records = enter(&mut screen, "X[pa1]").unwrap();
        assert_eq!(&records[0][10..], &[7, 56, 0x6C]);
    }

    #[test]
    fn test_typing_outside_fields_is_refused() {
        let mut screen = sign_on();
        screen.set_cursor(0, 0).unwrap();
        let err = enter(&mut screen, "A[enter]").unwrap_err();
        assert_eq!(err.kind(), "state");
        assert!(err.to_string().contains("(0,0)"));
    }

    #[test]
    fn test_full_field_moves_on() {
        let mut screen = ScreenBuffer::new(Dimensions::new(2, 10).unwrap());
        screen.define_field(0, 1, 2, false).unwrap();
        screen.define_field(1, 1, 3, false).unwrap();
        screen.set_cursor(0, 1).unwrap();
        enter(&mut screen, "ABCD").unwrap();
        assert_eq!(screen.as_text(), " AB       \n CD       ");
        assert_eq!(screen.cursor(), (1, 3));
    }

    #[test]
    fn test_field_editing_keys() {
        let mut screen = sign_on();
        enter(&mut screen, "HELLO[home]J[eof]").unwrap();
        assert_eq!(screen.field_text(0).unwrap(), "J         ");

        enter(&mut screen, "[home]ABC[home][insert]X").unwrap();
        assert_eq!(screen.field_text(0).unwrap(), "XABC      ");

        enter(&mut screen, "[home][delete]").unwrap();
        assert_eq!(screen.field_text(0).unwrap(), "ABC       ");

        enter(&mut screen, "[end]D").unwrap();
        assert_eq!(screen.field_text(0).unwrap(), "ABCD      ");

        enter(&mut screen, "[erase]").unwrap();
        assert_eq!(screen.field_text(0).unwrap().trim(), "");
        assert_eq!(screen.cursor(), (5, 52));
    }

    #[test]
    fn test_numeric_field_refuses_letters() {
        let mut screen = ScreenBuffer::new(Dimensions::MODEL_2);
        screen.define_field(0, 0, 5, true).unwrap();
        assert!(enter(&mut screen, "12").is_ok());
        assert_eq!(enter(&mut screen, "x").unwrap_err().kind(), "state");
    }

    #[test]
    fn test_attention_and_trailing_keys() {
        let mut screen = sign_on();
        let records = enter(&mut screen, "[attn]").unwrap();
        assert_eq!(records[0][7], FLAG_ATN);

        // Keys after the last submit stay on the screen until the next one
        let records = enter(&mut screen, "[enter]AB").unwrap();
        assert_eq!(records.len(), 1);
        assert!(screen.fields()[0].modified);
    }
}
