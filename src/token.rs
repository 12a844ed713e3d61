use std::fmt;

/// Source location for error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub source: String,
    pub line: usize,
}

impl Span {
    #[must_use]
    pub fn new(source: &str, line: usize) -> Self {
        Self {
            source: source.to_string(),
            line,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `.keyword` directive.
    Directive,
    /// Single- or double-quoted literal.
    String,
    /// Bareword reference to a symbol.
    Symbol,
    /// Decimal, octal or hex integer literal, kept as written.
    Integer,
    /// Backtick literal holding a command for an external executor.
    ShellCommand,
    /// `;` terminating an assertion.
    AssertEnd,
    /// End of stream.
    None,
    /// The underlying stream failed; the value holds the reason.
    Unknown,
}

impl TokenKind {
    /// Whether a token of this kind can stand as a directive parameter.
    #[must_use]
    pub const fn is_value(self) -> bool {
        matches!(
            self,
            Self::String | Self::Symbol | Self::Integer | Self::ShellCommand
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Directive => "directive",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Integer => "integer",
            Self::ShellCommand => "shell command",
            Self::AssertEnd => "assert end",
            Self::None => "end of input",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A single token with its kind, text, and source location.
///
/// Cloning a token copies its value and provenance; nothing is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, value: &str, source: &str, line: usize) -> Self {
        Self {
            kind,
            value: value.to_string(),
            span: Span::new(source, line),
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.span.source
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        self.span.line
    }

    /// Replace the value, keeping kind and provenance.
    pub fn set_value(&mut self, value: &str) {
        value.clone_into(&mut self.value);
    }

    /// Concatenate another token's value onto this one.
    pub fn append(&mut self, other: &Self) {
        self.value.push_str(&other.value);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?}) at {}", self.kind, self.value, self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_deep() {
        let original = Token::new(TokenKind::String, "abc", "in.rtest", 3);
        let mut copy = original.clone();
        copy.set_value("xyz");
        assert_eq!(original.value(), "abc");
        assert_eq!(copy.value(), "xyz");
        assert_eq!(copy.source(), "in.rtest");
        assert_eq!(copy.line(), 3);
    }

    #[test]
    fn append_concatenates() {
        let mut body = Token::new(TokenKind::String, "one\n", "f", 1);
        body.append(&Token::new(TokenKind::String, "two\n", "f", 4));
        assert_eq!(body.value(), "one\ntwo\n");
        assert_eq!(body.line(), 1);
    }

    #[test]
    fn value_kinds() {
        assert!(TokenKind::Symbol.is_value());
        assert!(TokenKind::ShellCommand.is_value());
        assert!(!TokenKind::Directive.is_value());
        assert!(!TokenKind::AssertEnd.is_value());
        assert!(!TokenKind::None.is_value());
    }

    #[test]
    fn display_includes_location() {
        let token = Token::new(TokenKind::Symbol, "BASE", "a.rtest", 7);
        assert_eq!(token.to_string(), "symbol(\"BASE\") at a.rtest:7");
    }
}
