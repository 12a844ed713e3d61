use std::collections::HashMap;
use std::collections::TryReserveError;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::Error;
use crate::assertion::{Assertion, ShapeError};
use crate::lexer::{LexError, Lexer};
use crate::options::Options;
use crate::record::{RecordError, RecordErrorKind, TestRecord};
use crate::symtab::{ScopeId, SymbolTables};
use crate::token::{Span, Token, TokenKind};

/// Every directive the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Test,
    Global,
    Parent,
    Local,
    Method,
    Uri,
    HttpVersion,
    Header,
    Body,
    Assert,
}

impl Directive {
    /// Exact-match lookup of a `.keyword`.
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        let directive = match word {
            ".test" => Self::Test,
            ".global" => Self::Global,
            ".parent" => Self::Parent,
            ".local" => Self::Local,
            ".method" => Self::Method,
            ".uri" => Self::Uri,
            ".http_version" => Self::HttpVersion,
            ".header" => Self::Header,
            ".body" => Self::Body,
            ".assert" => Self::Assert,
            _ => return None,
        };
        Some(directive)
    }

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Test => ".test",
            Self::Global => ".global",
            Self::Parent => ".parent",
            Self::Local => ".local",
            Self::Method => ".method",
            Self::Uri => ".uri",
            Self::HttpVersion => ".http_version",
            Self::Header => ".header",
            Self::Body => ".body",
            Self::Assert => ".assert",
        }
    }

    /// Number of required parameters (`.assert` takes at least this many).
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Global | Self::Parent | Self::Local | Self::Header => 2,
            Self::Test | Self::Method | Self::Uri | Self::HttpVersion | Self::Body | Self::Assert => 1,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Classifies a parser error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A line started with something other than a directive.
    ExpectedDirective { found: TokenKind, text: String },
    /// `.keyword` not in the directive table.
    UnknownDirective { name: String },
    /// A required parameter was absent or of the wrong kind.
    MissingParameter {
        directive: Directive,
        index: usize,
        found: Option<String>,
    },
    /// `.assert` reached a directive or end of input before `;`.
    UnterminatedAssertion,
    /// `.assert` operands and operators do not reduce to one value.
    MalformedAssertion(ShapeError),
    /// Two `.test` blocks with the same name.
    DuplicateTestName { name: String, first: Span },
    /// A field setter rejected the value.
    InvalidField(RecordErrorKind),
    /// A symbol table could not grow.
    AllocationFailure,
    /// The input stream failed mid-read.
    StreamError { reason: String },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpectedDirective { found, text } => {
                write!(f, "expected directive, got {found} '{text}'")
            }
            Self::UnknownDirective { name } => write!(f, "unknown directive '{name}'"),
            Self::MissingParameter {
                directive,
                index,
                found: None,
            } => {
                write!(f, "{directive}: missing parameter {}", index + 1)
            }
            Self::MissingParameter {
                directive,
                index,
                found: Some(text),
            } => {
                write!(f, "{directive}: parameter {} cannot be '{text}'", index + 1)
            }
            Self::UnterminatedAssertion => write!(f, ".assert: missing terminating ';'"),
            Self::MalformedAssertion(shape) => write!(f, ".assert: {shape}"),
            Self::DuplicateTestName { name, first } => {
                write!(f, "test '{name}' already defined at {first}")
            }
            Self::InvalidField(kind) => write!(f, "{kind}"),
            Self::AllocationFailure => write!(f, "out of memory growing symbol table"),
            Self::StreamError { reason } => write!(f, "read error: {reason}"),
        }
    }
}

/// Error produced during parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {span}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl From<RecordError> for ParseError {
    fn from(err: RecordError) -> Self {
        Self {
            kind: ParseErrorKind::InvalidField(err.kind),
            span: err.span,
        }
    }
}

/// Parse a source string.
///
/// # Errors
///
/// Returns the first lexical or syntax error; no records are returned then.
pub fn parse_str(
    tables: &mut SymbolTables,
    scope: ScopeId,
    input: &str,
    source: &str,
    options: &Options,
) -> Result<Vec<TestRecord>, Error> {
    parse_stream(tables, scope, input.as_bytes(), source, options)
}

/// Parse everything `reader` yields.
///
/// # Errors
///
/// Returns the first lexical, syntax or read error.
pub fn parse_stream<R: Read>(
    tables: &mut SymbolTables,
    scope: ScopeId,
    reader: R,
    source: &str,
    options: &Options,
) -> Result<Vec<TestRecord>, Error> {
    let lexer = Lexer::with_options(reader, source, options);
    Parser::new(lexer, tables, scope, source, options).parse()
}

/// Open and parse a file; the path becomes the token source name.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be opened, otherwise as
/// [`parse_stream`].
pub fn parse_file(
    tables: &mut SymbolTables,
    scope: ScopeId,
    path: impl AsRef<Path>,
    options: &Options,
) -> Result<Vec<TestRecord>, Error> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let file = File::open(path).map_err(|err| Error::Io {
        path: source.clone(),
        message: err.to_string(),
    })?;
    parse_stream(tables, scope, BufReader::new(file), &source, options)
}

/// Parse tokens that were lexed up front.
///
/// # Errors
///
/// Returns the first syntax error.
pub fn parse_tokens(
    tables: &mut SymbolTables,
    scope: ScopeId,
    tokens: Vec<Token>,
    source: &str,
    options: &Options,
) -> Result<Vec<TestRecord>, Error> {
    Parser::new(tokens.into_iter().map(Ok), tables, scope, source, options).parse()
}

/// A binding written during a parse and what it replaced.
struct Undo {
    scope: ScopeId,
    symbol: String,
    previous: Option<Token>,
}

struct Parser<'a, I> {
    tokens: I,
    tables: &'a mut SymbolTables,
    scope: ScopeId,
    source: &'a str,
    options: &'a Options,
    line: usize,
    journal: Vec<Undo>,
}

impl<'a, I> Parser<'a, I>
where
    I: Iterator<Item = Result<Token, LexError>>,
{
    fn new(
        tokens: I,
        tables: &'a mut SymbolTables,
        scope: ScopeId,
        source: &'a str,
        options: &'a Options,
    ) -> Self {
        Self {
            tokens,
            tables,
            scope,
            source,
            options,
            line: 0,
            journal: Vec::new(),
        }
    }

    /// Parse everything; on failure the arena is left as it was found.
    fn parse(mut self) -> Result<Vec<TestRecord>, Error> {
        let mark = self.tables.len();
        let result = self.parse_records();
        if result.is_err() {
            self.rollback(mark);
        }
        result
    }

    /// Undo binding writes newest first, then drop the tables this parse
    /// created. Writes into those tables are undone before they go.
    fn rollback(&mut self, mark: usize) {
        let writes = self.journal.len();
        while let Some(write) = self.journal.pop() {
            self.tables.restore(write.scope, write.symbol, write.previous);
        }
        debug!(writes, tables = self.tables.len() - mark, "rolled back failed parse");
        self.tables.truncate(mark);
    }

    fn parse_records(&mut self) -> Result<Vec<TestRecord>, Error> {
        let mut records = Vec::new();
        let mut seen: HashMap<String, Span> = HashMap::new();
        if self.options.unique_test_names {
            seen.insert(
                self.options.implicit_test_name.clone(),
                Span::new(self.source, 0),
            );
        }
        let mut current = TestRecord::new(
            self.tables,
            &self.options.implicit_test_name,
            Span::new(self.source, 0),
            Some(self.scope),
            self.options.scope_capacity,
        );

        loop {
            let token = self.next_token()?;
            match token.kind {
                TokenKind::None => break,
                TokenKind::Directive => {}
                found => {
                    return Err(Self::error(
                        ParseErrorKind::ExpectedDirective {
                            found,
                            text: token.value,
                        },
                        token.span,
                    ));
                }
            }

            let Some(directive) = Directive::from_keyword(&token.value) else {
                return Err(Self::error(
                    ParseErrorKind::UnknownDirective { name: token.value },
                    token.span,
                ));
            };
            debug!(%directive, line = token.span.line, "directive");

            match directive {
                Directive::Test => {
                    let name = self.param(directive, 0, &[TokenKind::Symbol, TokenKind::String])?;
                    if self.options.unique_test_names {
                        if let Some(first) = seen.get(&name.value) {
                            return Err(Self::error(
                                ParseErrorKind::DuplicateTestName {
                                    name: name.value,
                                    first: first.clone(),
                                },
                                token.span,
                            ));
                        }
                        seen.insert(name.value.clone(), token.span.clone());
                    }
                    let next = TestRecord::new(
                        self.tables,
                        &name.value,
                        token.span,
                        Some(self.scope),
                        self.options.scope_capacity,
                    );
                    records.push(std::mem::replace(&mut current, next));
                }
                Directive::Global => {
                    let root = self.tables.root(self.scope);
                    self.bind(directive, root)?;
                }
                Directive::Parent => self.bind(directive, self.scope)?,
                Directive::Local => self.bind(directive, current.scope)?,
                Directive::Method => {
                    let value = self.value_param(directive, 0)?;
                    current.set_method(&value).map_err(ParseError::from)?;
                }
                Directive::Uri => {
                    let value = self.value_param(directive, 0)?;
                    current.set_uri(&value).map_err(ParseError::from)?;
                }
                Directive::HttpVersion => {
                    let value = self.value_param(directive, 0)?;
                    current.set_http_version(&value).map_err(ParseError::from)?;
                }
                Directive::Header => {
                    let name = self.param(directive, 0, &[TokenKind::Symbol, TokenKind::String])?;
                    let value = self.value_param(directive, 1)?;
                    current
                        .set_header(&name.value, &value)
                        .map_err(ParseError::from)?;
                }
                Directive::Body => {
                    let value = self.value_param(directive, 0)?;
                    current.append_body(&value).map_err(ParseError::from)?;
                }
                Directive::Assert => {
                    let assertion = self.assertion(token.span)?;
                    current.assertions.push(assertion);
                }
            }
        }

        records.push(current);
        info!(source = self.source, records = records.len(), "parsed");
        Ok(records)
    }

    const fn error(kind: ParseErrorKind, span: Span) -> Error {
        Error::Parse(ParseError { kind, span })
    }

    /// Next token, with exhaustion mapped to a `None` token and read
    /// failures to an error.
    fn next_token(&mut self) -> Result<Token, Error> {
        match self.tokens.next() {
            None => Ok(Token::new(TokenKind::None, "", self.source, self.line)),
            Some(Err(err)) => Err(Error::Lex(err)),
            Some(Ok(token)) if token.kind == TokenKind::Unknown => Err(Self::error(
                ParseErrorKind::StreamError {
                    reason: token.value,
                },
                token.span,
            )),
            Some(Ok(token)) => {
                self.line = token.span.line;
                Ok(token)
            }
        }
    }

    fn param(&mut self, directive: Directive, index: usize, accepted: &[TokenKind]) -> Result<Token, Error> {
        let token = self.next_token()?;
        if accepted.contains(&token.kind) {
            return Ok(token);
        }
        let found = (token.kind != TokenKind::None).then_some(token.value);
        Err(Self::error(
            ParseErrorKind::MissingParameter {
                directive,
                index,
                found,
            },
            token.span,
        ))
    }

    fn value_param(&mut self, directive: Directive, index: usize) -> Result<Token, Error> {
        self.param(
            directive,
            index,
            &[
                TokenKind::String,
                TokenKind::Symbol,
                TokenKind::Integer,
                TokenKind::ShellCommand,
            ],
        )
    }

    fn bind(&mut self, directive: Directive, scope: ScopeId) -> Result<(), Error> {
        let name = self.param(directive, 0, &[TokenKind::Symbol])?;
        let value = self.value_param(directive, 1)?;
        debug!(
            %directive,
            symbol = %name.value,
            scope = self.tables.name(scope),
            "bind"
        );
        let previous = self.tables.local(scope, &name.value).cloned();
        self.tables
            .add(scope, &name.value, &value)
            .map_err(|_: TryReserveError| {
                Self::error(ParseErrorKind::AllocationFailure, name.span.clone())
            })?;
        self.journal.push(Undo {
            scope,
            symbol: name.value,
            previous,
        });
        Ok(())
    }

    fn assertion(&mut self, span: Span) -> Result<Assertion, Error> {
        let mut assertion = Assertion::new(span);
        loop {
            let token = self.next_token()?;
            match token.kind {
                TokenKind::AssertEnd if assertion.entries.is_empty() => {
                    return Err(Self::error(
                        ParseErrorKind::MissingParameter {
                            directive: Directive::Assert,
                            index: 0,
                            found: Some(token.value),
                        },
                        token.span,
                    ));
                }
                TokenKind::AssertEnd => break,
                TokenKind::None | TokenKind::Directive => {
                    return Err(Self::error(ParseErrorKind::UnterminatedAssertion, assertion.span));
                }
                _ => assertion.push(token),
            }
        }
        assertion
            .check_shape()
            .map_err(|shape| Self::error(ParseErrorKind::MalformedAssertion(shape), assertion.span.clone()))?;
        Ok(assertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_input(input: &str) -> (Result<Vec<TestRecord>, Error>, SymbolTables, ScopeId) {
        let mut tables = SymbolTables::new();
        let root = tables.create("global", None, 8);
        let result = parse_str(&mut tables, root, input, "in.rtest", &Options::default());
        (result, tables, root)
    }

    fn parse_kind(input: &str) -> ParseErrorKind {
        match parse_input(input).0 {
            Err(Error::Parse(err)) => err.kind,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn directive_lookup_is_exact() {
        assert_eq!(Directive::from_keyword(".test"), Some(Directive::Test));
        assert_eq!(Directive::from_keyword(".testing"), None);
        assert_eq!(Directive::from_keyword(".header"), Some(Directive::Header));
        assert_eq!(Directive::Header.arity(), 2);
    }

    #[test]
    fn implicit_record_then_tests() {
        let (result, _, _) = parse_input(".test one\n.method GET\n.test two\n.method POST\n");
        let records = result.expect("parse");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name(), "UNSET");
        assert_eq!(records[1].name(), "one");
        assert_eq!(records[1].method(), Some("GET"));
        assert_eq!(records[2].name(), "two");
        assert_eq!(records[2].line(), 3);
    }

    #[test]
    fn scopes_receive_bindings() {
        let input = "\
.test first
.global BASE_URI \"localhost:8081\"
.parent BASE_URI \"localhost:8082\"
.local BASE_URI \"localhost:8083\"
";
        let mut tables = SymbolTables::new();
        let root = tables.create("global", None, 8);
        let suite = tables.create("suite", Some(root), 8);
        let records =
            parse_str(&mut tables, suite, input, "in.rtest", &Options::default()).expect("parse");

        let local = records[1].scope();
        assert_eq!(tables.value(root, "BASE_URI").map(Token::value), Some("localhost:8081"));
        assert_eq!(tables.value(suite, "BASE_URI").map(Token::value), Some("localhost:8082"));
        assert_eq!(tables.value(local, "BASE_URI").map(Token::value), Some("localhost:8083"));
        assert_eq!(tables.parent(local), Some(suite));
    }

    #[test]
    fn body_accumulates() {
        let (result, _, _) = parse_input(".body \"one\n\"\n.body 'two\n'\n");
        let records = result.expect("parse");
        assert_eq!(records[0].body(), Some("one\ntwo\n"));
    }

    #[test]
    fn header_directive() {
        let (result, _, _) = parse_input(".header 'Content-Type' \"text/plain\"\n");
        let records = result.expect("parse");
        let header = &records[0].request.headers["content-type"];
        assert_eq!(header.raw, "Content-Type: text/plain");
        assert_eq!(header.span.line, 1);
    }

    #[test]
    fn assertion_is_stored() {
        let (result, _, _) = parse_input(".assert STATUS 200 eq ;\n");
        let records = result.expect("parse");
        assert_eq!(records[0].assertions.len(), 1);
        assert_eq!(records[0].assertions[0].entries.len(), 3);
    }

    #[test]
    fn non_directive_line() {
        assert!(matches!(
            parse_kind("FOO \"bar\"\n"),
            ParseErrorKind::ExpectedDirective {
                found: TokenKind::Symbol,
                ..
            }
        ));
    }

    #[test]
    fn unknown_directive() {
        assert_eq!(
            parse_kind(".switch-mode response\n"),
            ParseErrorKind::UnknownDirective {
                name: ".switch-mode".to_string()
            }
        );
    }

    #[test]
    fn method_without_value() {
        assert_eq!(
            parse_kind(".method"),
            ParseErrorKind::MissingParameter {
                directive: Directive::Method,
                index: 0,
                found: None
            }
        );
    }

    #[test]
    fn header_without_value() {
        assert!(matches!(
            parse_kind(".header NAME\n"),
            ParseErrorKind::MissingParameter {
                directive: Directive::Header,
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn unterminated_assertion() {
        assert_eq!(
            parse_kind(".assert STATUS 200 eq\n.test x\n"),
            ParseErrorKind::UnterminatedAssertion
        );
    }

    #[test]
    fn duplicate_test_name() {
        assert!(matches!(
            parse_kind(".test a\n.test b\n.test a\n"),
            ParseErrorKind::DuplicateTestName { .. }
        ));
    }

    #[test]
    fn failed_parse_removes_scopes() {
        let (result, tables, _) = parse_input(".test a\n.test b\n.bogus\n");
        assert!(result.is_err());
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn lex_error_aborts() {
        let (result, _, _) = parse_input(".uri 0x1G\n");
        assert!(matches!(result, Err(Error::Lex(_))));
    }
}
