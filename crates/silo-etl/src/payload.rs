//! Strict parser for the embedded payload wire format.
//!
//! Each raw input line carries a `data` field whose value looks like
//! `payload={'store_id': 1, 'datetime': '2025-01-01'}` — a mapping encoded
//! as a Python dict literal. The producer is untrusted, so this module
//! parses the mapping with a fixed grammar rather than a general literal
//! evaluator; anything outside the grammar is rejected.
//!
//! # Grammar
//!
//! ```text
//! mapping ::= "{" ws (pair (ws "," ws pair)*)? ws "}"
//! pair    ::= string ws ":" ws value
//! value   ::= string | number | "True" | "False" | "None"
//! string  ::= "'" char* "'" | '"' char* '"'
//!             (escapes: \\ \' \" \n \t)
//! number  ::= "-"? digit+ ("." digit+)?
//! ```

use std::collections::BTreeMap;
use thiserror::Error;

/// A scalar value parsed from the payload mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    Str(String),
    /// Boolean value (`True` / `False`).
    Bool(bool),
    /// Explicit `None`.
    None,
}

/// Error raised when a payload string does not match the grammar.
#[derive(Debug, Error)]
#[error("invalid payload literal at byte {pos}: {message}")]
pub struct PayloadError {
    /// Byte offset of the failure in the input.
    pub pos: usize,
    /// Description of what was expected.
    pub message: String,
}

/// Parses a payload mapping into key/value pairs.
///
/// Duplicate keys follow dict-literal semantics: the last occurrence wins.
///
/// # Errors
///
/// Returns a [`PayloadError`] when the input is not a single well-formed
/// mapping of string keys to scalar literals.
pub fn parse_mapping(input: &str) -> Result<BTreeMap<String, Literal>, PayloadError> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let mapping = parser.mapping()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(parser.fail("trailing data after mapping"));
    }
    Ok(mapping)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn fail(&self, message: impl Into<String>) -> PayloadError {
        PayloadError {
            pos: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), PayloadError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.fail(format!("expected '{}'", byte as char)))
        }
    }

    fn mapping(&mut self) -> Result<BTreeMap<String, Literal>, PayloadError> {
        self.skip_ws();
        self.expect(b'{')?;
        let mut out = BTreeMap::new();

        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(out);
        }

        loop {
            self.skip_ws();
            let key = self.string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let value = self.value()?;
            out.insert(key, value);

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(out);
                }
                _ => return Err(self.fail("expected ',' or '}'")),
            }
        }
    }

    fn value(&mut self) -> Result<Literal, PayloadError> {
        match self.peek() {
            Some(b'\'' | b'"') => Ok(Literal::Str(self.string()?)),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(_) => self.keyword(),
            None => Err(self.fail("unexpected end of input")),
        }
    }

    fn string(&mut self) -> Result<String, PayloadError> {
        let quote = match self.peek() {
            Some(q @ (b'\'' | b'"')) => q,
            _ => return Err(self.fail("expected quoted string")),
        };
        self.pos += 1;

        let mut out = String::new();
        loop {
            match self.peek() {
                Some(b) if b == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some(b'\\') => '\\',
                        Some(b'\'') => '\'',
                        Some(b'"') => '"',
                        Some(b'n') => '\n',
                        Some(b't') => '\t',
                        _ => return Err(self.fail("unsupported escape sequence")),
                    };
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(_) => {
                    // Multi-byte UTF-8 sequences pass through unchanged.
                    let rest = &self.bytes[self.pos..];
                    let s = std::str::from_utf8(rest)
                        .map_err(|_| self.fail("invalid UTF-8 in string"))?;
                    let ch = s.chars().next().ok_or_else(|| self.fail("empty string"))?;
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
                None => return Err(self.fail("unterminated string")),
            }
        }
    }

    fn number(&mut self) -> Result<Literal, PayloadError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }

        let digits_start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return Err(self.fail("expected digits"));
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            let frac_start = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            if self.pos == frac_start {
                return Err(self.fail("expected digits after decimal point"));
            }
        }

        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.fail("invalid number"))?;

        if is_float {
            text.parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| self.fail("number out of range"))
        } else {
            text.parse::<i64>()
                .map(Literal::Int)
                .map_err(|_| self.fail("integer out of range"))
        }
    }

    fn keyword(&mut self) -> Result<Literal, PayloadError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'A'..=b'Z' | b'a'..=b'z')) {
            self.pos += 1;
        }

        match &self.bytes[start..self.pos] {
            b"True" => Ok(Literal::Bool(true)),
            b"False" => Ok(Literal::Bool(false)),
            b"None" => Ok(Literal::None),
            _ => {
                self.pos = start;
                Err(self.fail("expected string, number, True, False, or None"))
            }
        }
    }
}
