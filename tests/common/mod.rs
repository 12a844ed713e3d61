#![allow(dead_code)]

use rest_test::{Options, RequestField, ScopeId, SymbolTables, TestRecord, format, parse_str};

/// A fresh arena with a single `global` root scope.
pub fn session() -> (SymbolTables, ScopeId) {
    let mut tables = SymbolTables::new();
    let global = tables.create("global", None, 8);
    (tables, global)
}

/// Parse `input` into a fresh session, panicking on error.
pub fn parse(input: &str) -> (Vec<TestRecord>, SymbolTables, ScopeId) {
    let (mut tables, global) = session();
    let records = parse_str(&mut tables, global, input, "test.rtest", &Options::default())
        .unwrap_or_else(|e| panic!("parse failed: {e}\n--- input ---\n{input}"));
    (records, tables, global)
}

/// Parse then format, asserting the output is the input unchanged.
pub fn roundtrip(input: &str) {
    let (records, tables, _) = parse(input);
    let output = format(&records, &tables);
    assert_eq!(
        output, input,
        "round-trip mismatch:\n--- expected ---\n{input}\n--- got ---\n{output}"
    );
}

/// Compare the request halves of two records field by field.
pub fn assert_same_request(left: &TestRecord, right: &TestRecord) {
    for field in RequestField::ALL {
        assert_eq!(
            left.field(field).map(|t| (t.kind, t.value())),
            right.field(field).map(|t| (t.kind, t.value())),
            "{field} mismatch for test '{}'",
            left.name()
        );
    }
    let headers = |r: &TestRecord| {
        r.request
            .headers
            .iter()
            .map(|(k, h)| (k.clone(), h.raw.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(headers(left), headers(right), "header mismatch");
}

/// Format records, parse them back and compare every record.
pub fn assert_record_roundtrip(records: &[TestRecord], tables: &SymbolTables) {
    let formatted = format(records, tables);
    let (parsed, parsed_tables, _) = parse(&formatted);
    assert_eq!(records.len(), parsed.len(), "record count\n{formatted}");
    for (original, reparsed) in records.iter().zip(&parsed) {
        assert_eq!(original.name(), reparsed.name());
        assert_same_request(original, reparsed);
        assert_eq!(
            tables.get(original.scope()).bindings().len(),
            parsed_tables.get(reparsed.scope()).bindings().len(),
            "local bindings\n{formatted}"
        );
        assert_eq!(original.assertions.len(), reparsed.assertions.len());
    }
}
