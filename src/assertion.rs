//! Postfix assertion storage.
//!
//! An `.assert` directive is kept as a reverse-Polish sequence of operands
//! and operators. Only its shape is checked here; running it against a live
//! response is left to the executor.

use std::fmt;

use crate::token::{Span, Token, TokenKind};

/// Operator keywords recognised inside `.assert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Contains,
    StartsWith,
    EndsWith,
    And,
    Or,
    Not,
}

impl Operator {
    /// Map a bareword to an operator.
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        let op = match word {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "contains" => Self::Contains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            _ => return None,
        };
        Some(op)
    }

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }

    /// Number of operands popped.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Not => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One stack entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Operand(Token),
    Operator { op: Operator, span: Span },
}

impl Entry {
    /// Classify a token read inside `.assert`.
    #[must_use]
    pub fn from_token(token: Token) -> Self {
        if token.kind == TokenKind::Symbol {
            if let Some(op) = Operator::from_keyword(&token.value) {
                return Self::Operator {
                    op,
                    span: token.span,
                };
            }
        }
        Self::Operand(token)
    }
}

/// Why an assertion's stack is not well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// No entries at all.
    Empty,
    /// An operator found fewer operands than it needs.
    Underflow { op: Operator, span: Span },
    /// More than one value left at the end.
    Leftover { count: usize },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "assertion is empty"),
            Self::Underflow { op, span } => {
                write!(f, "'{op}' needs {} operand(s) at {span}", op.arity())
            }
            Self::Leftover { count } => {
                write!(f, "assertion leaves {count} values, expected 1")
            }
        }
    }
}

/// A parsed `.assert` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub span: Span,
    pub entries: Vec<Entry>,
}

impl Assertion {
    #[must_use]
    pub const fn new(span: Span) -> Self {
        Self {
            span,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, token: Token) {
        self.entries.push(Entry::from_token(token));
    }

    /// Simulate stack depth: each operand pushes one value, each operator
    /// pops its arity and pushes one result.
    ///
    /// # Errors
    ///
    /// Returns `ShapeError` when the sequence cannot reduce to one value.
    pub fn check_shape(&self) -> Result<(), ShapeError> {
        if self.entries.is_empty() {
            return Err(ShapeError::Empty);
        }
        let mut depth = 0usize;
        for entry in &self.entries {
            match entry {
                Entry::Operand(_) => depth += 1,
                Entry::Operator { op, span } => {
                    if depth < op.arity() {
                        return Err(ShapeError::Underflow {
                            op: *op,
                            span: span.clone(),
                        });
                    }
                    depth = depth - op.arity() + 1;
                }
            }
        }
        if depth == 1 {
            Ok(())
        } else {
            Err(ShapeError::Leftover { count: depth })
        }
    }
}
