//! Key sequence parsing and encoding
//!
//! A sequence mixes literal text with bracketed mnemonics:
//! `MYUSER[tab]MYPASS[enter]`. `[[` and `]]` stand for literal brackets.
//!
//! The encoded key stream is a flat diagnostic form: each literal run goes
//! through the code page and each mnemonic becomes `KEY_ESCAPE` followed by
//! its key code, with a literal `KEY_ESCAPE` byte doubled. Sessions send
//! input records built by `KeyEntry` instead.

use std::fmt;
use std::str::FromStr;

use super::keys::KeyMnemonic;
use crate::core::codepage::TableConverter;
use crate::core::error::{Error, Result};

/// Byte introducing a mnemonic in an encoded key stream
pub const KEY_ESCAPE: u8 = 0x04;

/// One element of a key sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyToken {
    /// Literal character
    Char(char),
    /// Named key
    Key(KeyMnemonic),
}

/// Parsed key sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequence {
    tokens: Vec<KeyToken>,
    // Character offset of each token in the source text
    offsets: Vec<usize>,
}

impl KeySequence {
    /// Parse a sequence; the first bad token aborts the whole parse
    pub fn parse(input: &str) -> Result<Self> {
        let mut seq = Self::default();
        let mut chars = input.chars().enumerate().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '[' if chars.peek().map(|&(_, c)| c) == Some('[') => {
                    chars.next();
                    seq.push_at(KeyToken::Char('['), pos);
                }
                '[' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(parse_error(name, pos, "unterminated key mnemonic"));
                    }
                    if name.trim().is_empty() {
                        return Err(parse_error(name, pos, "empty key mnemonic"));
                    }
                    let key = KeyMnemonic::parse(&name)
                        .ok_or_else(|| parse_error(name, pos, "unknown key mnemonic"))?;
                    seq.push_at(KeyToken::Key(key), pos);
                }
                ']' if chars.peek().map(|&(_, c)| c) == Some(']') => {
                    chars.next();
                    seq.push_at(KeyToken::Char(']'), pos);
                }
                ']' => return Err(parse_error("]".to_string(), pos, "unmatched")),
                c => seq.push_at(KeyToken::Char(c), pos),
            }
        }
        Ok(seq)
    }

    fn push_at(&mut self, token: KeyToken, offset: usize) {
        self.tokens.push(token);
        self.offsets.push(offset);
    }

    /// Append a token
    pub fn push(&mut self, token: KeyToken) {
        let offset = self.offsets.last().map_or(0, |o| o + 1);
        self.push_at(token, offset);
    }

    /// Tokens in order
    pub fn tokens(&self) -> &[KeyToken] {
        &self.tokens
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True for an empty sequence
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether any key in the sequence hands control to the host
    pub fn has_submit(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, KeyToken::Key(k) if k.is_submit()))
    }

    /// Encode the whole sequence as a key stream. Nothing is produced
    /// unless every token encodes.
    pub fn encode(&self, converter: &TableConverter) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.tokens.len() + 8);
        let mut run = String::new();
        let mut run_start = 0;

        for (token, &offset) in self.tokens.iter().zip(&self.offsets) {
            match token {
                KeyToken::Char(c) => {
                    if run.is_empty() {
                        run_start = offset;
                    }
                    run.push(*c);
                }
                KeyToken::Key(key) => {
                    flush_run(&mut out, &mut run, run_start, converter)?;
                    out.extend_from_slice(&[KEY_ESCAPE, key.key_code()]);
                }
            }
        }
        flush_run(&mut out, &mut run, run_start, converter)?;
        Ok(out)
    }
}

fn flush_run(out: &mut Vec<u8>, run: &mut String, start: usize, converter: &TableConverter) -> Result<()> {
    if run.is_empty() {
        return Ok(());
    }
    let bytes = converter.encode(run).map_err(|mut e| {
        e.position += start;
        Error::from(e)
    })?;
    for b in bytes {
        if b == KEY_ESCAPE {
            out.push(KEY_ESCAPE);
        }
        out.push(b);
    }
    run.clear();
    Ok(())
}

fn parse_error(token: String, position: usize, reason: &str) -> Error {
    Error::Parse {
        token,
        position,
        reason: reason.to_string(),
    }
}

impl FromStr for KeySequence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            match token {
                KeyToken::Char('[') => f.write_str("[[")?,
                KeyToken::Char(']') => f.write_str("]]")?,
                KeyToken::Char(c) => write!(f, "{c}")?,
                KeyToken::Key(k) => write!(f, "[{k}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codepage::CodepageRegistry;

    fn chars(s: &str) -> Vec<KeyToken> {
        s.chars().map(KeyToken::Char).collect()
    }

    #[test]
    fn test_login_sequence() {
        let seq = KeySequence::parse("MYUSER[tab]MYPASS[enter]").unwrap();
        let mut expected = chars("MYUSER");
        expected.push(KeyToken::Key(KeyMnemonic::Tab));
        expected.extend(chars("MYPASS"));
        expected.push(KeyToken::Key(KeyMnemonic::Enter));
        assert_eq!(seq.tokens(), expected.as_slice());
        assert!(seq.has_submit());
    }

    #[test]
    fn test_unknown_mnemonic_names_token() {
        let err = KeySequence::parse("abc[bogus][enter]").unwrap_err();
        match err {
            Error::Parse { ref token, position, .. } => {
                assert_eq!(token, "bogus");
                assert_eq!(position, 3);
            }
            ref other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_bracket_escapes() {
        let seq = KeySequence::parse("a[[b]]c").unwrap();
        assert_eq!(seq.tokens(), chars("a[b]c").as_slice());
        assert_eq!(seq.to_string(), "a[[b]]c");
    }

    #[test]
    fn test_malformed_brackets() {
        assert!(KeySequence::parse("[enter").is_err());
        assert!(KeySequence::parse("[]").is_err());
        assert!(KeySequence::parse("a]b").is_err());
        assert!(KeySequence::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_encode_frames_keys() {
        let conv = CodepageRegistry::builtin().unwrap().converter("37").unwrap();
        let bytes = KeySequence::parse("AB[tab]1[enter]").unwrap().encode(&conv).unwrap();
        assert_eq!(bytes, vec![0xC1, 0xC2, KEY_ESCAPE, 0x01, 0xF1, KEY_ESCAPE, 0xF1]);
    }

    #[test]
    fn test_encode_doubles_escape_byte() {
        let conv = CodepageRegistry::builtin().unwrap().converter("37").unwrap();
        // U+009C decodes from 0x04 in CCSID 37
        let bytes = KeySequence::parse("\u{9C}").unwrap().encode(&conv).unwrap();
        assert_eq!(bytes, vec![KEY_ESCAPE, KEY_ESCAPE]);
    }

    #[test]
    fn test_encode_failure_reports_source_position() {
        let conv = CodepageRegistry::builtin().unwrap().converter("37").unwrap();
        let err = KeySequence::parse("[tab]ab\u{4E00}").unwrap().encode(&conv).unwrap_err();
        match err {
            Error::Parse { token, position, reason } => {
                assert_eq!(token, "U+4E00");
                assert_eq!(position, 7);
                assert!(reason.contains("CCSID-37"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
