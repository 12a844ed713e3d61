//! Scope chain lookups.

use rest_test::{ScopeId, SymbolTables, Token, TokenKind};

fn string(value: &str) -> Token {
    Token::new(TokenKind::String, value, "symtab.rtest", 1)
}

fn lookup<'t>(tables: &'t SymbolTables, scope: ScopeId, name: &str) -> Option<&'t str> {
    tables.value(scope, name).map(Token::value)
}

#[test]
fn local_binding_wins_then_falls_back_to_parent() {
    let mut tables = SymbolTables::new();
    let root = tables.create("global", None, 4);
    let mid = tables.create("file", Some(root), 4);
    let leaf = tables.create("test", Some(mid), 4);

    tables.add(root, "A", &string("root-a")).expect("add");
    tables.add(root, "B", &string("root-b")).expect("add");
    tables.add(mid, "B", &string("mid-b")).expect("add");
    tables.add(leaf, "C", &string("leaf-c")).expect("add");

    assert_eq!(lookup(&tables, leaf, "A"), Some("root-a"));
    assert_eq!(lookup(&tables, leaf, "B"), Some("mid-b"));
    assert_eq!(lookup(&tables, leaf, "C"), Some("leaf-c"));
    assert_eq!(lookup(&tables, mid, "C"), None);
    assert_eq!(lookup(&tables, leaf, "D"), None);
}

#[test]
fn rebinding_replaces_value() {
    let mut tables = SymbolTables::new();
    let scope = tables.create("t", None, 1);
    tables.add(scope, "X", &string("v1")).expect("add");
    tables.add(scope, "X", &string("v2")).expect("add");
    assert_eq!(lookup(&tables, scope, "X"), Some("v2"));
    assert_eq!(tables.get(scope).len(), 1);
}

#[test]
fn clear_uncovers_shadowed_binding() {
    let mut tables = SymbolTables::new();
    let global = tables.create("global", None, 4);
    let child = tables.create("child", Some(global), 4);
    tables.add(global, "FOO", &string("1")).expect("add");
    tables.add(child, "FOO", &string("2")).expect("add");
    assert_eq!(lookup(&tables, child, "FOO"), Some("2"));

    tables.clear(child, "FOO");
    assert_eq!(lookup(&tables, child, "FOO"), Some("1"));

    tables.clear(child, "FOO");
    assert_eq!(lookup(&tables, global, "FOO"), Some("1"));
}

#[test]
fn binding_is_a_copy() {
    let mut tables = SymbolTables::new();
    let scope = tables.create("t", None, 1);
    let mut token = string("before");
    tables.add(scope, "X", &token).expect("add");
    token.set_value("after");
    assert_eq!(lookup(&tables, scope, "X"), Some("before"));
}

#[test]
fn root_and_parent() {
    let mut tables = SymbolTables::new();
    let root = tables.create("global", None, 1);
    let child = tables.create("child", Some(root), 1);
    let grandchild = tables.create("grandchild", Some(child), 1);
    assert_eq!(tables.root(grandchild), root);
    assert_eq!(tables.root(root), root);
    assert_eq!(tables.parent(grandchild), Some(child));
    assert_eq!(tables.parent(root), None);
    assert_eq!(tables.len(), 3);
}

#[test]
fn dump_lists_sorted_bindings() {
    let mut tables = SymbolTables::new();
    let scope = tables.create("login", None, 2);
    tables.add(scope, "ZED", &string("z")).expect("add");
    tables.add(scope, "ALPHA", &string("a")).expect("add");

    let mut out = Vec::new();
    tables.dump(scope, &mut out).expect("dump");
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        "symbols [login]:\n  \
         [login] ALPHA = \"a\" (string, symtab.rtest:1)\n  \
         [login] ZED = \"z\" (string, symtab.rtest:1)\n"
    );
}
