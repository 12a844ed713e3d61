//! Front end for a directive-based HTTP test language.
//!
//! Source text is tokenized, parsed into an ordered list of
//! [`TestRecord`]s whose variables live in scoped [`SymbolTables`], and each
//! record is then evaluated so that symbol references in its request are
//! replaced by their values. Sending the request and checking the response
//! are left to the caller.
//!
//! # Quick start
//!
//! ```
//! use rest_test::{Options, SymbolTables, parse_str};
//!
//! let input = "\
//! .global BASE \"localhost:8081\"
//! .test login
//! .method 'POST'
//! .uri \"http://{{BASE}}/login\"
//! ";
//!
//! let mut tables = SymbolTables::new();
//! let global = tables.create("global", None, 16);
//! let mut records = parse_str(&mut tables, global, input, "login.rtest", &Options::default())?;
//!
//! let login = &mut records[1];
//! login.evaluate(&tables)?;
//! assert_eq!(login.uri(), Some("http://localhost:8081/login"));
//! # Ok::<(), rest_test::Error>(())
//! ```
//!
//! # Syntax
//!
//! Every line is a directive (`.test`, `.global`, `.parent`, `.local`,
//! `.method`, `.uri`, `.http_version`, `.header`, `.body`, `.assert`)
//! followed by its parameters. `#` starts a comment. Strings use `'...'`
//! or `"..."`; consecutive `"..."` literals separated only by whitespace
//! join into one, as do consecutive `` `...` `` shell commands.

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod assertion;
pub mod builder;
pub mod eval;
pub mod formatter;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod record;
pub mod symtab;
pub mod token;

pub use assertion::{Assertion, Entry, Operator, ShapeError};
pub use builder::TestRecordBuilder;
pub use eval::{EvalError, EvalErrorKind, EvalTarget, evaluate, interpolate, resolve};
pub use formatter::{dump, format};
pub use lexer::{LexError, LexErrorKind, Lexer, tokenize};
pub use options::Options;
pub use parser::{
    Directive, ParseError, ParseErrorKind, parse_file, parse_str, parse_stream, parse_tokens,
};
pub use record::{
    Header, HeaderMap, RecordError, RecordErrorKind, Request, RequestField, Response, TestRecord,
};
pub use symtab::{ScopeId, SymbolTable, SymbolTables};
pub use token::{Span, Token, TokenKind};

/// Unified error type covering every stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A lexer error.
    #[error("{0}")]
    Lex(#[from] LexError),
    /// A parser error.
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// An evaluation error.
    #[error("{0}")]
    Eval(#[from] EvalError),
    /// A source file could not be opened or read.
    #[error("{path}: {message}")]
    Io { path: String, message: String },
}

/// Parse `input` and evaluate every record, stopping at the first error.
pub fn load_str(
    tables: &mut SymbolTables,
    scope: ScopeId,
    input: &str,
    source: &str,
    options: &Options,
) -> Result<Vec<TestRecord>, Error> {
    let mut records = parse_str(tables, scope, input, source, options)?;
    for record in &mut records {
        record.evaluate(tables)?;
    }
    Ok(records)
}
