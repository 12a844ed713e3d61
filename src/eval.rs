//! Substitution of symbol references in request fields.
//!
//! A bare `Symbol` is replaced by the value it is bound to in the record's
//! scope chain. String and shell-command literals have every `{{name}}`
//! inside them replaced the same way, left to right. Evaluation walks
//! method, uri, `http_version`, body and then headers, and stops at the
//! first failure; nothing after the failing field is touched.

use std::fmt;

use tracing::{debug, warn};

use crate::record::{Header, RequestField, TestRecord};
use crate::symtab::{ScopeId, SymbolTables};
use crate::token::{Span, Token, TokenKind};

/// Classifies an evaluation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// No table in the scope chain binds the name.
    UndefinedSymbol { name: String },
    /// `{{name(...)}}` call syntax, which is not supported.
    UnsupportedCall { name: String },
    /// `{{...}}` whose content is not a symbol name.
    InvalidReference { text: String },
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedSymbol { name } => write!(f, "undefined symbol '{name}'"),
            Self::UnsupportedCall { name } => {
                write!(f, "function call '{name}(...)' is not supported")
            }
            Self::InvalidReference { text } => write!(f, "invalid reference '{{{{{text}}}}}'"),
        }
    }
}

/// What was being evaluated when an error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalTarget {
    Field(RequestField),
    /// Header, by lower-cased name.
    Header(String),
}

impl fmt::Display for EvalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(field) => write!(f, "{field}"),
            Self::Header(name) => write!(f, "header '{name}'"),
        }
    }
}

/// Error produced during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} in {target} at {span}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub target: EvalTarget,
    pub span: Span,
}

/// Evaluate every request field of `record` against its scope chain.
///
/// # Errors
///
/// Returns the first `EvalError`; the failing field keeps its original
/// token, which [`TestRecord::failed_token`] hands back.
pub fn evaluate(record: &mut TestRecord, tables: &SymbolTables) -> Result<(), EvalError> {
    let scope = record.scope;

    for field in RequestField::ALL {
        let Some(token) = record.request.field(field) else {
            continue;
        };
        let resolved = resolve(token, tables, scope).map_err(|kind| EvalError {
            kind,
            target: EvalTarget::Field(field),
            span: token.span.clone(),
        })?;
        debug!(test = %record.name, %field, value = %resolved.value, "evaluated");
        *record.request.field_mut(field) = Some(resolved);
    }

    for (key, header) in &mut record.request.headers {
        let resolved = resolve(&header.value, tables, scope).map_err(|kind| EvalError {
            kind,
            target: EvalTarget::Header(key.clone()),
            span: header.value.span.clone(),
        })?;
        *header = Header::new(&header.name, resolved);
    }

    Ok(())
}

impl TestRecord {
    /// See [`evaluate`].
    ///
    /// # Errors
    ///
    /// Returns the first `EvalError`.
    pub fn evaluate(&mut self, tables: &SymbolTables) -> Result<(), EvalError> {
        evaluate(self, tables)
    }

    /// The token an evaluation error refers to.
    #[must_use]
    pub fn failed_token(&self, err: &EvalError) -> Option<&Token> {
        match &err.target {
            EvalTarget::Field(field) => self.request.field(*field),
            EvalTarget::Header(name) => self.request.headers.get(name).map(|h| &h.value),
        }
    }
}

/// Produce the effective token for `token` in `scope`.
///
/// Substitution is one level deep: a symbol takes the bound token's kind
/// and text (a symbol bound to a bareword yields a string), and substituted
/// text is not scanned again.
///
/// # Errors
///
/// Returns `EvalErrorKind` for unresolvable references.
pub fn resolve(token: &Token, tables: &SymbolTables, scope: ScopeId) -> Result<Token, EvalErrorKind> {
    match token.kind {
        TokenKind::Symbol => {
            let bound = lookup(tables, scope, &token.value)?;
            let kind = if bound.kind == TokenKind::Symbol {
                TokenKind::String
            } else {
                bound.kind
            };
            Ok(Token {
                kind,
                value: bound.value.clone(),
                span: token.span.clone(),
            })
        }
        TokenKind::String | TokenKind::ShellCommand => {
            let mut out = token.clone();
            out.value = interpolate(&token.value, tables, scope)?;
            Ok(out)
        }
        TokenKind::Directive
        | TokenKind::Integer
        | TokenKind::AssertEnd
        | TokenKind::None
        | TokenKind::Unknown => Ok(token.clone()),
    }
}

/// Replace each `{{name}}` in `text`, left to right.
///
/// Whitespace inside the braces is ignored. An opening `{{` with no
/// closing `}}` is kept as literal text.
///
/// # Errors
///
/// Returns `EvalErrorKind` for an unbound name, a call, or a malformed
/// reference.
pub fn interpolate(text: &str, tables: &SymbolTables, scope: ScopeId) -> Result<String, EvalErrorKind> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            warn!(text, "unclosed '{{{{' kept as literal text");
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = reference_name(after[..end].trim())?;
        out.push_str(&lookup(tables, scope, name)?.value);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn lookup<'t>(tables: &'t SymbolTables, scope: ScopeId, name: &str) -> Result<&'t Token, EvalErrorKind> {
    tables
        .value(scope, name)
        .ok_or_else(|| EvalErrorKind::UndefinedSymbol {
            name: name.to_string(),
        })
}

pub(crate) fn is_symbol(text: &str) -> bool {
    let mut bytes = text.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn reference_name(inner: &str) -> Result<&str, EvalErrorKind> {
    if is_symbol(inner) {
        return Ok(inner);
    }
    if let Some((name, _)) = inner.split_once('(') {
        let name = name.trim();
        if is_symbol(name) && inner.ends_with(')') {
            return Err(EvalErrorKind::UnsupportedCall {
                name: name.to_string(),
            });
        }
    }
    Err(EvalErrorKind::InvalidReference {
        text: inner.to_string(),
    })
}
