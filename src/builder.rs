use crate::options::DEFAULT_SCOPE_CAPACITY;
use crate::record::{RecordError, RequestField, TestRecord};
use crate::symtab::{ScopeId, SymbolTables};
use crate::token::{Span, Token, TokenKind};

/// Chained field setters that keep the first error.
///
/// Once a setter fails, later ones are skipped and the error is reported
/// by [`last_error`](Self::last_error) and [`build`](Self::build).
///
/// ```
/// use rest_test::{SymbolTables, TestRecord};
///
/// let mut tables = SymbolTables::new();
/// let record = TestRecord::builder(&mut tables, "login", "suite.rtest", 1, None)
///     .method("POST")
///     .uri("/api/login")
///     .header("Content-Type", "application/json")
///     .body("{\"user\": \"alice\"}")
///     .build()
///     .unwrap();
/// assert_eq!(record.header("content-type"), Some("application/json"));
/// ```
#[derive(Debug)]
pub struct TestRecordBuilder {
    record: TestRecord,
    last_error: Option<RecordError>,
}

impl TestRecord {
    /// Start a record with a fresh scope under `parent`.
    pub fn builder(
        tables: &mut SymbolTables,
        name: &str,
        source: &str,
        line: usize,
        parent: Option<ScopeId>,
    ) -> TestRecordBuilder {
        TestRecordBuilder {
            record: Self::new(
                tables,
                name,
                Span::new(source, line),
                parent,
                DEFAULT_SCOPE_CAPACITY,
            ),
            last_error: None,
        }
    }
}

impl TestRecordBuilder {
    fn apply(mut self, f: impl FnOnce(&mut TestRecord) -> Result<(), RecordError>) -> Self {
        if self.last_error.is_none() {
            if let Err(err) = f(&mut self.record) {
                self.last_error = Some(err);
            }
        }
        self
    }

    fn string(&self, value: &str) -> Token {
        Token {
            kind: TokenKind::String,
            value: value.to_string(),
            span: self.record.span.clone(),
        }
    }

    /// Set a request field from an arbitrary token.
    #[must_use]
    pub fn field(self, field: RequestField, token: &Token) -> Self {
        self.apply(|r| match field {
            RequestField::Method => r.set_method(token),
            RequestField::Uri => r.set_uri(token),
            RequestField::HttpVersion => r.set_http_version(token),
            RequestField::Body => r.append_body(token),
        })
    }

    #[must_use]
    pub fn method(self, method: &str) -> Self {
        let token = self.string(method);
        self.field(RequestField::Method, &token)
    }

    #[must_use]
    pub fn uri(self, uri: &str) -> Self {
        let token = self.string(uri);
        self.field(RequestField::Uri, &token)
    }

    #[must_use]
    pub fn http_version(self, version: &str) -> Self {
        let token = self.string(version);
        self.field(RequestField::HttpVersion, &token)
    }

    /// Append to the request body.
    #[must_use]
    pub fn body(self, body: &str) -> Self {
        let token = self.string(body);
        self.field(RequestField::Body, &token)
    }

    #[must_use]
    pub fn header(self, name: &str, value: &str) -> Self {
        let token = self.string(value);
        self.apply(|r| r.set_header(name, &token))
    }

    #[must_use]
    pub fn status_code(self, code: &str) -> Self {
        self.apply(|r| r.set_status_code(code))
    }

    #[must_use]
    pub fn reason(self, reason: &str) -> Self {
        self.apply(|r| {
            r.set_reason(reason);
            Ok(())
        })
    }

    #[must_use]
    pub fn response_body(self, body: &str) -> Self {
        self.apply(|r| {
            r.append_response_body(body);
            Ok(())
        })
    }

    /// Add a `"Name: value"` response header.
    #[must_use]
    pub fn response_header(self, raw: &str) -> Self {
        let span = self.record.span.clone();
        self.apply(|r| r.set_response_header(span, raw))
    }

    /// First error hit so far, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&RecordError> {
        self.last_error.as_ref()
    }

    /// # Errors
    ///
    /// Returns the first error any setter hit.
    pub fn build(self) -> Result<TestRecord, RecordError> {
        match self.last_error {
            Some(err) => Err(err),
            None => Ok(self.record),
        }
    }
}
