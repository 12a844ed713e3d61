use std::fmt;
use std::io::{self, Read};

use tracing::trace;

use crate::options::{DEFAULT_MAX_LINE_LENGTH, Options};
use crate::token::{Span, Token, TokenKind};

/// Classifies a lexer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    /// Byte that cannot start or continue a token.
    UnexpectedCharacter(char),
    /// Quoted literal with no closing delimiter.
    UnterminatedString { delimiter: char },
    /// Digit not valid for the literal's radix.
    InvalidDigit { digit: char, radix: u32 },
    /// `0x` with no hex digits after it.
    MissingHexDigits,
    /// Physical line longer than the configured maximum.
    LineTooLong { limit: usize },
    /// Literal whose bytes are not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(ch) => {
                write!(f, "unexpected character: {ch:?}")
            }
            Self::UnterminatedString { delimiter } => {
                write!(f, "unterminated {delimiter}-quoted literal")
            }
            Self::InvalidDigit { digit, radix } => {
                write!(f, "invalid digit {digit:?} for base {radix} integer")
            }
            Self::MissingHexDigits => {
                write!(f, "hex integer has no digits after '0x'")
            }
            Self::LineTooLong { limit } => {
                write!(f, "line exceeds maximum length of {limit} bytes")
            }
            Self::InvalidUtf8 => write!(f, "invalid UTF-8 in literal"),
        }
    }
}

/// Error produced during lexing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {span}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

/// Tokenize a whole source string.
///
/// The terminating `None` token is not included.
///
/// # Errors
///
/// Returns `LexError` on the first lexical error.
pub fn tokenize(input: &str, source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input.as_bytes(), source).collect()
}

/// Pull-based tokenizer over any byte stream.
///
/// Reads one byte at a time with pushback, counting lines as it goes.
/// Every newline consumed bumps the line counter and every newline pushed
/// back lowers it again, so lookahead never skews reported lines.
pub struct Lexer<R> {
    bytes: io::Bytes<R>,
    pushback: Vec<u8>,
    source: String,
    line: usize,
    line_len: usize,
    prev_line_len: usize,
    max_line_length: usize,
    failure: Option<String>,
    started: bool,
    finished: bool,
}

impl<R: Read> Lexer<R> {
    pub fn new(reader: R, source: &str) -> Self {
        Self::with_limit(reader, source, DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_options(reader: R, source: &str, options: &Options) -> Self {
        Self::with_limit(reader, source, options.max_line_length)
    }

    fn with_limit(reader: R, source: &str, max_line_length: usize) -> Self {
        Self {
            bytes: reader.bytes(),
            pushback: Vec::new(),
            source: source.to_string(),
            line: 1,
            line_len: 0,
            prev_line_len: 0,
            max_line_length,
            failure: None,
            started: false,
            finished: false,
        }
    }

    /// Name of the source being read.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Line the cursor is currently on.
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Read the next token.
    ///
    /// End of input yields a `TokenKind::None` token. A failing reader
    /// yields a `TokenKind::Unknown` token whose value is the I/O error.
    ///
    /// # Errors
    ///
    /// Returns `LexError` for malformed input.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let result = self.scan();
        if let Some(reason) = self.failure.take() {
            return Ok(self.token(TokenKind::Unknown, reason.into_bytes(), self.line));
        }
        let token = result?;
        trace!(kind = %token.kind, value = %token.value, line = token.span.line, "token");
        Ok(token)
    }

    fn scan(&mut self) -> Result<Token, LexError> {
        loop {
            let Some(ch) = self.read_char()? else {
                return Ok(self.token(TokenKind::None, Vec::new(), self.line));
            };
            if ch.is_ascii_whitespace() {
                continue;
            }
            let line = self.line;

            match ch {
                b'#' => self.skip_comment()?,
                b';' => return Ok(self.token(TokenKind::AssertEnd, vec![b';'], line)),
                b'.' => return self.read_directive(line),
                b'\'' => {
                    let value = self.read_quoted(b'\'', line)?;
                    return self.text_token(TokenKind::String, value, line);
                }
                b'"' | b'`' => return self.read_joined(ch, line),
                b'0' => return self.read_octhex(line),
                b'1'..=b'9' => return self.read_decimal(ch, line),
                c if c.is_ascii_alphabetic() || c == b'_' => return self.read_symbol(c, line),
                other => {
                    let ch = self.decode_char(other);
                    return Err(self.error(LexErrorKind::UnexpectedCharacter(ch), line));
                }
            }
        }
    }

    /// Build a token from bytes the scanner already checked are ASCII.
    fn token(&self, kind: TokenKind, value: Vec<u8>, line: usize) -> Token {
        Token {
            kind,
            value: String::from_utf8_lossy(&value).into_owned(),
            span: Span::new(&self.source, line),
        }
    }

    /// Build a token from literal bytes, which may hold any UTF-8.
    fn text_token(&self, kind: TokenKind, value: Vec<u8>, line: usize) -> Result<Token, LexError> {
        let value = String::from_utf8(value).map_err(|_| self.error(LexErrorKind::InvalidUtf8, line))?;
        Ok(Token {
            kind,
            value,
            span: Span::new(&self.source, line),
        })
    }

    /// The whole character that starts with `first`, for error messages.
    fn decode_char(&mut self, first: u8) -> char {
        let width = match first {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        let mut bytes = vec![first];
        while bytes.len() < width {
            match self.raw_next() {
                Some(byte) => bytes.push(byte),
                None => break,
            }
        }
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| text.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn error(&self, kind: LexErrorKind, line: usize) -> LexError {
        LexError {
            kind,
            span: Span::new(&self.source, line),
        }
    }

    fn raw_next(&mut self) -> Option<u8> {
        if let Some(byte) = self.pushback.pop() {
            return Some(byte);
        }
        match self.bytes.next()? {
            Ok(byte) => Some(byte),
            Err(err) => {
                self.failure.get_or_insert_with(|| err.to_string());
                None
            }
        }
    }

    fn skip_bom(&mut self) {
        let mut head = Vec::with_capacity(3);
        while head.len() < 3 {
            match self.raw_next() {
                Some(byte) => head.push(byte),
                None => break,
            }
        }
        if head != [0xEF, 0xBB, 0xBF] {
            self.pushback.extend(head.into_iter().rev());
        }
    }

    fn read_char(&mut self) -> Result<Option<u8>, LexError> {
        if !self.started {
            self.started = true;
            self.skip_bom();
        }
        let Some(byte) = self.raw_next() else {
            return Ok(None);
        };
        if byte == b'\n' {
            self.line += 1;
            self.prev_line_len = self.line_len;
            self.line_len = 0;
        } else {
            self.line_len += 1;
            if self.line_len > self.max_line_length {
                return Err(self.error(
                    LexErrorKind::LineTooLong {
                        limit: self.max_line_length,
                    },
                    self.line,
                ));
            }
        }
        Ok(Some(byte))
    }

    fn unread_char(&mut self, byte: u8) {
        if byte == b'\n' {
            self.line -= 1;
            self.line_len = self.prev_line_len;
        } else {
            self.line_len = self.line_len.saturating_sub(1);
        }
        self.pushback.push(byte);
    }

    fn skip_comment(&mut self) -> Result<(), LexError> {
        while let Some(ch) = self.read_char()? {
            if ch == b'\n' {
                break;
            }
        }
        Ok(())
    }

    fn read_directive(&mut self, line: usize) -> Result<Token, LexError> {
        let mut value = vec![b'.'];
        while let Some(ch) = self.read_char()? {
            if ch == b'.' || ch == b'-' || ch == b'_' || ch.is_ascii_alphanumeric() {
                value.push(ch);
            } else {
                self.unread_char(ch);
                break;
            }
        }
        Ok(self.token(TokenKind::Directive, value, line))
    }

    /// Read up to the closing `delim`; the opening one is already consumed.
    /// A backslash passes the next byte through as-is.
    fn read_quoted(&mut self, delim: u8, line: usize) -> Result<Vec<u8>, LexError> {
        let unterminated = LexErrorKind::UnterminatedString {
            delimiter: char::from(delim),
        };
        let mut value = Vec::new();
        loop {
            match self.read_char()? {
                None => return Err(self.error(unterminated, line)),
                Some(ch) if ch == delim => return Ok(value),
                Some(b'\\') => match self.read_char()? {
                    Some(escaped) => value.push(escaped),
                    None => return Err(self.error(unterminated, line)),
                },
                Some(ch) => value.push(ch),
            }
        }
    }

    /// Double-quoted and backtick literals separated only by whitespace
    /// merge into one token.
    fn read_joined(&mut self, delim: u8, line: usize) -> Result<Token, LexError> {
        let kind = if delim == b'`' {
            TokenKind::ShellCommand
        } else {
            TokenKind::String
        };

        let mut value = self.read_quoted(delim, line)?;
        loop {
            let next = loop {
                match self.read_char()? {
                    Some(ch) if ch.is_ascii_whitespace() => {}
                    other => break other,
                }
            };
            match next {
                Some(ch) if ch == delim => {
                    let more = self.read_quoted(delim, line)?;
                    value.extend(more);
                }
                Some(ch) => {
                    self.unread_char(ch);
                    break;
                }
                None => break,
            }
        }
        self.text_token(kind, value, line)
    }

    fn read_octhex(&mut self, line: usize) -> Result<Token, LexError> {
        let mut value = vec![b'0'];
        let radix = match self.read_char()? {
            None => return Ok(self.token(TokenKind::Integer, value, line)),
            Some(ch) if ch.is_ascii_whitespace() => {
                self.unread_char(ch);
                return Ok(self.token(TokenKind::Integer, value, line));
            }
            Some(ch @ (b'x' | b'X')) => {
                value.push(ch);
                16
            }
            Some(ch) => {
                self.unread_char(ch);
                8
            }
        };

        let digits = self.read_digits(&mut value, radix, line)?;
        if radix == 16 && digits == 0 {
            return Err(self.error(LexErrorKind::MissingHexDigits, line));
        }
        Ok(self.token(TokenKind::Integer, value, line))
    }

    fn read_decimal(&mut self, first: u8, line: usize) -> Result<Token, LexError> {
        let mut value = vec![first];
        self.read_digits(&mut value, 10, line)?;
        Ok(self.token(TokenKind::Integer, value, line))
    }

    /// Consume digits of `radix` up to whitespace or end of input.
    fn read_digits(&mut self, value: &mut Vec<u8>, radix: u32, line: usize) -> Result<usize, LexError> {
        let mut count = 0;
        while let Some(ch) = self.read_char()? {
            if ch.is_ascii_whitespace() {
                self.unread_char(ch);
                break;
            }
            if !char::from(ch).is_digit(radix) {
                let digit = self.decode_char(ch);
                return Err(self.error(LexErrorKind::InvalidDigit { digit, radix }, line));
            }
            value.push(ch);
            count += 1;
        }
        Ok(count)
    }

    fn read_symbol(&mut self, first: u8, line: usize) -> Result<Token, LexError> {
        let mut value = vec![first];
        while let Some(ch) = self.read_char()? {
            if ch.is_ascii_whitespace() {
                self.unread_char(ch);
                break;
            }
            if !(ch.is_ascii_alphanumeric() || ch == b'_') {
                let ch = self.decode_char(ch);
                return Err(self.error(LexErrorKind::UnexpectedCharacter(ch), line));
            }
            value.push(ch);
        }
        Ok(self.token(TokenKind::Symbol, value, line))
    }
}

impl<R: Read> Iterator for Lexer<R> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(token) if token.kind == TokenKind::None => {
                self.finished = true;
                None
            }
            Ok(token) => {
                if token.kind == TokenKind::Unknown {
                    self.finished = true;
                }
                Some(Ok(token))
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
