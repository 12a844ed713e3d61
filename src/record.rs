//! Test records: one `.test` block's request, expected response,
//! assertions and private scope.

use std::collections::BTreeMap;
use std::fmt;

use crate::assertion::Assertion;
use crate::symtab::{ScopeId, SymbolTables};
use crate::token::{Span, Token, TokenKind};

/// The request fields that go through evaluation, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestField {
    Method,
    Uri,
    HttpVersion,
    Body,
}

impl RequestField {
    pub const ALL: [Self; 4] = [Self::Method, Self::Uri, Self::HttpVersion, Self::Body];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Uri => "uri",
            Self::HttpVersion => "http_version",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for RequestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A header as written, keyed elsewhere by its lower-cased name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub span: Span,
    pub name: String,
    pub value: Token,
    /// `"Name: value"` as it goes on the wire.
    pub raw: String,
}

impl Header {
    #[must_use]
    pub fn new(name: &str, value: Token) -> Self {
        Self {
            span: value.span.clone(),
            name: name.to_string(),
            raw: format!("{name}: {}", value.value),
            value,
        }
    }

    /// Replace the value and rebuild `raw`.
    pub fn set_value(&mut self, value: &str) {
        self.value.set_value(value);
        self.raw = format!("{}: {}", self.name, self.value.value);
    }
}

/// Lower-cased header name to header.
pub type HeaderMap = BTreeMap<String, Header>;

/// Request half of a test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method: Option<Token>,
    pub uri: Option<Token>,
    pub http_version: Option<Token>,
    pub body: Option<Token>,
    pub headers: HeaderMap,
}

impl Request {
    #[must_use]
    pub fn field(&self, field: RequestField) -> Option<&Token> {
        match field {
            RequestField::Method => self.method.as_ref(),
            RequestField::Uri => self.uri.as_ref(),
            RequestField::HttpVersion => self.http_version.as_ref(),
            RequestField::Body => self.body.as_ref(),
        }
    }

    pub(crate) fn field_mut(&mut self, field: RequestField) -> &mut Option<Token> {
        match field {
            RequestField::Method => &mut self.method,
            RequestField::Uri => &mut self.uri,
            RequestField::HttpVersion => &mut self.http_version,
            RequestField::Body => &mut self.body,
        }
    }
}

/// Expected (or, once executed, captured) response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub http_version: Option<String>,
    pub status_code: Option<u16>,
    pub reason: Option<String>,
    pub body: String,
    pub headers: HeaderMap,
}

/// Classifies a record mutation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordErrorKind {
    /// A directive, `;` or end-of-input token used as a field value.
    NotAValue { kind: TokenKind },
    /// Header name empty or containing whitespace or `:`.
    InvalidHeaderName { name: String },
    /// Raw header without a `name: value` shape.
    MalformedHeader { raw: String },
    /// Status code that is not a number in 100..=999.
    InvalidStatusCode { code: String },
    /// `set_body` on a body that already has content.
    BodyAlreadySet,
    /// Appending a token of another kind onto the body.
    BodyKindMismatch { body: TokenKind, appended: TokenKind },
}

impl fmt::Display for RecordErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAValue { kind } => write!(f, "{kind} cannot be used as a value"),
            Self::InvalidHeaderName { name } => write!(f, "invalid header name '{name}'"),
            Self::MalformedHeader { raw } => write!(f, "malformed header '{raw}'"),
            Self::InvalidStatusCode { code } => write!(f, "invalid status code '{code}'"),
            Self::BodyAlreadySet => write!(f, "body already set, use append"),
            Self::BodyKindMismatch { body, appended } => {
                write!(f, "cannot append {appended} to {body} body")
            }
        }
    }
}

/// Error produced while setting a record field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {span}")]
pub struct RecordError {
    pub kind: RecordErrorKind,
    pub span: Span,
}

/// One parsed test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub name: String,
    pub span: Span,
    pub scope: ScopeId,
    pub request: Request,
    pub response: Response,
    pub assertions: Vec<Assertion>,
}

fn valid_header_name(name: &str) -> bool {
    !name.is_empty() && !name.bytes().any(|b| b == b':' || b.is_ascii_whitespace())
}

/// Text of a body part once it is joined to another part.
fn template_text(token: &Token) -> String {
    match token.kind {
        TokenKind::Symbol => format!("{{{{{}}}}}", token.value),
        _ => token.value.clone(),
    }
}

impl TestRecord {
    /// Create a record with its own scope whose parent is `parent`.
    pub fn new(
        tables: &mut SymbolTables,
        name: &str,
        span: Span,
        parent: Option<ScopeId>,
        capacity: usize,
    ) -> Self {
        let scope = tables.create(name, parent, capacity);
        Self {
            name: name.to_string(),
            span,
            scope,
            request: Request::default(),
            response: Response::default(),
            assertions: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.span.source
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        self.span.line
    }

    #[must_use]
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Rename the record and its scope.
    pub fn set_name(&mut self, tables: &mut SymbolTables, name: &str) {
        name.clone_into(&mut self.name);
        tables.set_name(self.scope, name);
    }

    fn error(&self, kind: RecordErrorKind, span: Option<&Span>) -> RecordError {
        RecordError {
            kind,
            span: span.unwrap_or(&self.span).clone(),
        }
    }

    fn check_value(&self, token: &Token) -> Result<(), RecordError> {
        if token.kind.is_value() {
            Ok(())
        } else {
            Err(self.error(RecordErrorKind::NotAValue { kind: token.kind }, Some(&token.span)))
        }
    }

    /// # Errors
    ///
    /// Returns `RecordError` if `method` is not a value token.
    pub fn set_method(&mut self, method: &Token) -> Result<(), RecordError> {
        self.set_field(RequestField::Method, method)
    }

    /// # Errors
    ///
    /// Returns `RecordError` if `uri` is not a value token.
    pub fn set_uri(&mut self, uri: &Token) -> Result<(), RecordError> {
        self.set_field(RequestField::Uri, uri)
    }

    /// # Errors
    ///
    /// Returns `RecordError` if `version` is not a value token.
    pub fn set_http_version(&mut self, version: &Token) -> Result<(), RecordError> {
        self.set_field(RequestField::HttpVersion, version)
    }

    fn set_field(&mut self, field: RequestField, token: &Token) -> Result<(), RecordError> {
        self.check_value(token)?;
        *self.request.field_mut(field) = Some(token.clone());
        Ok(())
    }

    /// Set the body of a record that has none yet.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if a body already exists.
    pub fn set_body(&mut self, body: &Token) -> Result<(), RecordError> {
        if self.request.body.is_some() {
            return Err(self.error(RecordErrorKind::BodyAlreadySet, Some(&body.span)));
        }
        self.append_body(body)
    }

    /// Concatenate onto the body; the first call starts it.
    ///
    /// A lone token is kept as is, so a body that is just `NAME` evaluates
    /// to whatever `NAME` is bound to. Once a second part arrives the body
    /// becomes a template: symbols turn into `{{NAME}}` references and
    /// integers into their text. The result is a shell command if either
    /// part is one, otherwise a string.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` for non-value tokens, or when a string literal
    /// and a shell command would be mixed.
    pub fn append_body(&mut self, body: &Token) -> Result<(), RecordError> {
        self.check_value(body)?;
        let Some(current) = self.request.body.as_ref().map(|b| b.kind) else {
            self.request.body = Some(body.clone());
            return Ok(());
        };

        let kinds = [current, body.kind];
        if kinds.contains(&TokenKind::String) && kinds.contains(&TokenKind::ShellCommand) {
            let kind = RecordErrorKind::BodyKindMismatch {
                body: current,
                appended: body.kind,
            };
            return Err(self.error(kind, Some(&body.span)));
        }
        let kind = if kinds.contains(&TokenKind::ShellCommand) {
            TokenKind::ShellCommand
        } else {
            TokenKind::String
        };

        if let Some(existing) = self.request.body.as_mut() {
            if existing.kind != kind {
                existing.value = template_text(existing);
                existing.kind = kind;
            }
            if body.kind == kind {
                existing.append(body);
            } else {
                existing.value.push_str(&template_text(body));
            }
        }
        Ok(())
    }

    /// Set a request header, replacing any header of the same name.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` for a bad name or a non-value token.
    pub fn set_header(&mut self, name: &str, value: &Token) -> Result<(), RecordError> {
        if !valid_header_name(name) {
            let kind = RecordErrorKind::InvalidHeaderName {
                name: name.to_string(),
            };
            return Err(self.error(kind, Some(&value.span)));
        }
        self.check_value(value)?;
        self.request
            .headers
            .insert(name.to_ascii_lowercase(), Header::new(name, value.clone()));
        Ok(())
    }

    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.request.method.as_ref().map(Token::value)
    }

    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.request.uri.as_ref().map(Token::value)
    }

    #[must_use]
    pub fn http_version(&self) -> Option<&str> {
        self.request.http_version.as_ref().map(Token::value)
    }

    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.request.body.as_ref().map(Token::value)
    }

    /// Request header value, looked up case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers
            .get(&name.to_ascii_lowercase())
            .map(|h| h.value.value())
    }

    /// The token currently held by a request field.
    #[must_use]
    pub fn field(&self, field: RequestField) -> Option<&Token> {
        self.request.field(field)
    }

    pub fn set_response_http_version(&mut self, version: &str) {
        self.response.http_version = Some(version.to_string());
    }

    /// # Errors
    ///
    /// Returns `RecordError` unless `code` is a three-digit number.
    pub fn set_status_code(&mut self, code: &str) -> Result<(), RecordError> {
        match code.trim().parse::<u16>() {
            Ok(status) if (100..=999).contains(&status) => {
                self.response.status_code = Some(status);
                Ok(())
            }
            _ => Err(self.error(
                RecordErrorKind::InvalidStatusCode {
                    code: code.to_string(),
                },
                None,
            )),
        }
    }

    pub fn set_reason(&mut self, reason: &str) {
        self.response.reason = Some(reason.to_string());
    }

    /// # Errors
    ///
    /// Returns `RecordError` if the response body is not empty.
    pub fn set_response_body(&mut self, body: &str) -> Result<(), RecordError> {
        if !self.response.body.is_empty() {
            return Err(self.error(RecordErrorKind::BodyAlreadySet, None));
        }
        body.clone_into(&mut self.response.body);
        Ok(())
    }

    pub fn append_response_body(&mut self, body: &str) {
        self.response.body.push_str(body);
    }

    /// Store a `"Name: value"` response header.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if `raw` has no colon or a bad name.
    pub fn set_response_header(&mut self, span: Span, raw: &str) -> Result<(), RecordError> {
        let Some((name, value)) = raw.split_once(':') else {
            let kind = RecordErrorKind::MalformedHeader {
                raw: raw.to_string(),
            };
            return Err(self.error(kind, Some(&span)));
        };
        let name = name.trim();
        if !valid_header_name(name) {
            let kind = RecordErrorKind::InvalidHeaderName {
                name: name.to_string(),
            };
            return Err(self.error(kind, Some(&span)));
        }
        let value = Token {
            kind: TokenKind::String,
            value: value.trim().to_string(),
            span,
        };
        self.response
            .headers
            .insert(name.to_ascii_lowercase(), Header::new(name, value));
        Ok(())
    }

    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response
            .headers
            .get(&name.to_ascii_lowercase())
            .map(|h| h.value.value())
    }
}
