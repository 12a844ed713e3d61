//! Printers for parsed test records.
//!
//! [`format`] writes records back out as directive source, and [`dump`]
//! produces the human-readable diagnostic listing.

use std::fmt::Write as _;

use crate::assertion::Entry;
use crate::eval::is_symbol;
use crate::record::{Header, TestRecord};
use crate::symtab::{ScopeId, SymbolTables};
use crate::token::{Token, TokenKind};

/// Format records as directive source.
///
/// A leading record on line 0 is the preamble that precedes the first
/// `.test` and is written without a `.test` line. The preamble also
/// carries the `.global` and `.parent` bindings whose tokens came from the
/// same source. Strings are single-quoted so adjacent literals never merge,
/// which makes `parse(format(records))` reproduce every field.
#[must_use]
pub fn format(records: &[TestRecord], tables: &SymbolTables) -> String {
    let mut out = String::new();

    for (i, record) in records.iter().enumerate() {
        let preamble = i == 0 && record.line() == 0;
        if preamble {
            format_outer_bindings(&mut out, record, tables);
        } else {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(".test ");
            push_name(&mut out, &record.name);
            out.push('\n');
        }
        format_record(&mut out, record, tables);
    }

    out
}

fn format_outer_bindings(out: &mut String, record: &TestRecord, tables: &SymbolTables) {
    let Some(parent) = tables.parent(record.scope) else {
        return;
    };
    let root = tables.root(parent);
    if root != parent {
        format_bindings(out, ".global", root, record.source(), tables);
    }
    format_bindings(out, ".parent", parent, record.source(), tables);
}

fn format_bindings(out: &mut String, directive: &str, scope: ScopeId, source: &str, tables: &SymbolTables) {
    for (symbol, token) in tables.get(scope).bindings() {
        if token.source() == source {
            let _ = writeln!(out, "{directive} {symbol} {}", value(token));
        }
    }
}

fn format_record(out: &mut String, record: &TestRecord, tables: &SymbolTables) {
    for (symbol, token) in tables.get(record.scope).bindings() {
        let _ = writeln!(out, ".local {symbol} {}", value(token));
    }

    let request = &record.request;
    for (directive, token) in [
        (".method", &request.method),
        (".uri", &request.uri),
        (".http_version", &request.http_version),
    ] {
        if let Some(token) = token {
            let _ = writeln!(out, "{directive} {}", value(token));
        }
    }

    for header in request.headers.values() {
        format_header(out, header);
    }

    if let Some(body) = &request.body {
        let _ = writeln!(out, ".body {}", value(body));
    }

    for assertion in &record.assertions {
        out.push_str(".assert");
        for entry in &assertion.entries {
            out.push(' ');
            match entry {
                Entry::Operand(token) => out.push_str(&value(token)),
                Entry::Operator { op, .. } => out.push_str(op.keyword()),
            }
        }
        out.push_str(" ;\n");
    }
}

fn format_header(out: &mut String, header: &Header) {
    out.push_str(".header ");
    push_name(out, &header.name);
    let _ = writeln!(out, " {}", value(&header.value));
}

fn push_name(out: &mut String, name: &str) {
    if is_symbol(name) {
        out.push_str(name);
    } else {
        push_quoted(out, '\'', name);
    }
}

fn push_quoted(out: &mut String, delim: char, text: &str) {
    out.push(delim);
    for ch in text.chars() {
        if ch == delim || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push(delim);
}

fn value(token: &Token) -> String {
    let mut out = String::new();
    match token.kind {
        TokenKind::ShellCommand => push_quoted(&mut out, '`', &token.value),
        TokenKind::Symbol | TokenKind::Integer => out.push_str(&token.value),
        _ => push_quoted(&mut out, '\'', &token.value),
    }
    out
}

/// Diagnostic dump: one line per field, then the record's own bindings.
#[must_use]
pub fn dump(records: &[TestRecord], tables: &SymbolTables) -> String {
    let mut out = String::new();
    for record in records {
        dump_record(&mut out, record, tables);
    }
    out
}

fn dump_field(out: &mut String, label: &str, token: Option<&Token>) {
    match token {
        Some(token) => {
            let _ = writeln!(
                out,
                "  {label:<13} {:?} [{}, {}]",
                token.value, token.kind, token.span
            );
        }
        None => {
            let _ = writeln!(out, "  {label:<13} (unset)");
        }
    }
}

fn dump_record(out: &mut String, record: &TestRecord, tables: &SymbolTables) {
    let _ = writeln!(out, "test {:?} [{}]", record.name, record.span);

    let request = &record.request;
    dump_field(out, "method", request.method.as_ref());
    dump_field(out, "uri", request.uri.as_ref());
    dump_field(out, "http_version", request.http_version.as_ref());
    dump_field(out, "body", request.body.as_ref());
    for (key, header) in &request.headers {
        let _ = writeln!(out, "  header {key}: {:?} [{}]", header.raw, header.span);
    }

    let response = &record.response;
    if let Some(version) = &response.http_version {
        let _ = writeln!(out, "  response http_version {version:?}");
    }
    if let Some(code) = response.status_code {
        let _ = writeln!(out, "  response status_code {code}");
    }
    if let Some(reason) = &response.reason {
        let _ = writeln!(out, "  response reason {reason:?}");
    }
    if !response.body.is_empty() {
        let _ = writeln!(out, "  response body {:?}", response.body);
    }
    for (key, header) in &response.headers {
        let _ = writeln!(out, "  response header {key}: {:?}", header.raw);
    }

    for assertion in &record.assertions {
        let _ = write!(out, "  assert [{}]:", assertion.span);
        for entry in &assertion.entries {
            match entry {
                Entry::Operand(token) => {
                    let _ = write!(out, " {}", value(token));
                }
                Entry::Operator { op, .. } => {
                    let _ = write!(out, " {op}");
                }
            }
        }
        out.push('\n');
    }

    let mut symbols = Vec::new();
    if tables.dump(record.scope, &mut symbols).is_ok() {
        for line in String::from_utf8_lossy(&symbols).lines() {
            let _ = writeln!(out, "  {line}");
        }
    }
}
