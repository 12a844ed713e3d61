//! Scoped symbol tables.
//!
//! All tables of a session live in one [`SymbolTables`] arena and refer to
//! their parent by [`ScopeId`]. A parent is never removed while a child
//! still points at it, so lookups can always walk to the root.

use std::collections::HashMap;
use std::collections::TryReserveError;
use std::fmt;
use std::io::{self, Write};

use crate::token::Token;

/// Handle to one table inside a [`SymbolTables`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One namespace: a name, an optional parent and local bindings.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    name: String,
    parent: Option<ScopeId>,
    bindings: HashMap<String, Token>,
}

impl SymbolTable {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Local bindings sorted by symbol.
    #[must_use]
    pub fn bindings(&self) -> Vec<(&str, &Token)> {
        let mut out: Vec<_> = self
            .bindings
            .iter()
            .map(|(symbol, token)| (symbol.as_str(), token))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Arena owning every symbol table of a session.
#[derive(Debug, Clone, Default)]
pub struct SymbolTables {
    tables: Vec<SymbolTable>,
}

impl SymbolTables {
    #[must_use]
    pub const fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// Create a table and return its handle.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this arena.
    pub fn create(&mut self, name: &str, parent: Option<ScopeId>, capacity: usize) -> ScopeId {
        if let Some(parent) = parent {
            assert!(parent.0 < self.tables.len(), "unknown parent scope {parent}");
        }
        self.tables.push(SymbolTable {
            name: name.to_string(),
            parent,
            bindings: HashMap::with_capacity(capacity),
        });
        ScopeId(self.tables.len() - 1)
    }

    /// Number of tables in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Drop every table created after the arena held `len` tables.
    ///
    /// Tables are only ever appended and parents always precede children,
    /// so the survivors never point at a removed table.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.tables.truncate(len);
    }

    /// Borrow a table.
    ///
    /// # Panics
    ///
    /// Panics if `scope` does not belong to this arena.
    #[must_use]
    pub fn get(&self, scope: ScopeId) -> &SymbolTable {
        &self.tables[scope.0]
    }

    fn get_mut(&mut self, scope: ScopeId) -> &mut SymbolTable {
        &mut self.tables[scope.0]
    }

    #[must_use]
    pub fn name(&self, scope: ScopeId) -> &str {
        &self.get(scope).name
    }

    pub fn set_name(&mut self, scope: ScopeId, name: &str) {
        name.clone_into(&mut self.get_mut(scope).name);
    }

    #[must_use]
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.get(scope).parent
    }

    /// Outermost ancestor of `scope` (itself when it has no parent).
    #[must_use]
    pub fn root(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while let Some(parent) = self.get(current).parent {
            current = parent;
        }
        current
    }

    /// Bind `symbol` in `scope` to a copy of `token`, replacing any
    /// existing local binding.
    ///
    /// # Errors
    ///
    /// Returns `TryReserveError` if the table cannot grow.
    pub fn add(&mut self, scope: ScopeId, symbol: &str, token: &Token) -> Result<(), TryReserveError> {
        let table = self.get_mut(scope);
        table.bindings.try_reserve(1)?;
        table.bindings.insert(symbol.to_string(), token.clone());
        Ok(())
    }

    /// Remove the local binding of `symbol`; ancestors are untouched.
    pub fn clear(&mut self, scope: ScopeId, symbol: &str) {
        self.get_mut(scope).bindings.remove(symbol);
    }

    /// The binding of `symbol` in `scope` itself, ignoring ancestors.
    #[must_use]
    pub fn local(&self, scope: ScopeId, symbol: &str) -> Option<&Token> {
        self.get(scope).bindings.get(symbol)
    }

    /// Put back what `scope` bound `symbol` to before a write.
    ///
    /// `None` removes the binding. The key is either already present or
    /// being removed, so this never grows the table.
    pub(crate) fn restore(&mut self, scope: ScopeId, symbol: String, previous: Option<Token>) {
        let bindings = &mut self.get_mut(scope).bindings;
        match previous {
            Some(token) => {
                bindings.insert(symbol, token);
            }
            None => {
                bindings.remove(&symbol);
            }
        }
    }

    /// Look `symbol` up in `scope`, then in each ancestor in turn.
    #[must_use]
    pub fn value(&self, scope: ScopeId, symbol: &str) -> Option<&Token> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let table = self.get(id);
            if let Some(token) = table.bindings.get(symbol) {
                return Some(token);
            }
            current = table.parent;
        }
        None
    }

    /// Write the local bindings of `scope`, one per line.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`.
    pub fn dump(&self, scope: ScopeId, out: &mut dyn Write) -> io::Result<()> {
        let table = self.get(scope);
        writeln!(out, "symbols [{}]:", table.name)?;
        for (symbol, token) in table.bindings() {
            writeln!(
                out,
                "  [{}] {symbol} = {:?} ({}, {})",
                table.name, token.value, token.kind, token.span
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn tok(value: &str) -> Token {
        Token::new(TokenKind::String, value, "test", 1)
    }

    #[test]
    fn lookup_walks_parents() {
        let mut tables = SymbolTables::new();
        let root = tables.create("root", None, 4);
        let child = tables.create("child", Some(root), 4);
        tables.add(root, "HOST", &tok("example.org")).expect("add");

        assert_eq!(tables.value(child, "HOST").map(Token::value), Some("example.org"));
        assert!(tables.value(child, "MISSING").is_none());
    }

    #[test]
    fn add_replaces() {
        let mut tables = SymbolTables::new();
        let scope = tables.create("t", None, 1);
        tables.add(scope, "X", &tok("v1")).expect("add");
        tables.add(scope, "X", &tok("v2")).expect("add");
        assert_eq!(tables.get(scope).len(), 1);
        assert_eq!(tables.value(scope, "X").map(Token::value), Some("v2"));
    }

    #[test]
    fn shadow_then_clear() {
        let mut tables = SymbolTables::new();
        let global = tables.create("G", None, 1);
        let child = tables.create("C", Some(global), 1);
        tables.add(global, "FOO", &tok("1")).expect("add");
        tables.add(child, "FOO", &tok("2")).expect("add");
        assert_eq!(tables.value(child, "FOO").map(Token::value), Some("2"));

        tables.clear(child, "FOO");
        assert_eq!(tables.value(child, "FOO").map(Token::value), Some("1"));

        tables.clear(child, "FOO");
        assert_eq!(tables.value(global, "FOO").map(Token::value), Some("1"));
    }

    #[test]
    fn add_copies_caller_token() {
        let mut tables = SymbolTables::new();
        let scope = tables.create("t", None, 1);
        let mut token = tok("before");
        tables.add(scope, "X", &token).expect("add");
        token.set_value("after");
        assert_eq!(tables.value(scope, "X").map(Token::value), Some("before"));
    }

    #[test]
    fn root_of_nested_scope() {
        let mut tables = SymbolTables::new();
        let a = tables.create("a", None, 1);
        let b = tables.create("b", Some(a), 1);
        let c = tables.create("c", Some(b), 1);
        assert_eq!(tables.root(c), a);
        assert_eq!(tables.root(a), a);
        assert_eq!(tables.parent(c), Some(b));
    }

    #[test]
    fn dump_is_local_only() {
        let mut tables = SymbolTables::new();
        let parent = tables.create("outer", None, 1);
        let child = tables.create("inner", Some(parent), 1);
        tables.add(parent, "P", &tok("p")).expect("add");
        tables.add(child, "B", &tok("b")).expect("add");
        tables.add(child, "A", &tok("a")).expect("add");

        let mut out = Vec::new();
        tables.dump(child, &mut out).expect("dump");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "symbols [inner]:");
        assert!(lines[1].contains("A = \"a\""));
        assert!(lines[2].contains("B = \"b\""));
        assert!(!text.contains('P'));
    }

    #[test]
    fn truncate_drops_newer_tables() {
        let mut tables = SymbolTables::new();
        let root = tables.create("root", None, 1);
        let mark = tables.len();
        tables.create("scratch", Some(root), 1);
        tables.truncate(mark);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables.name(root), "root");
    }

    #[test]
    fn restore_undoes_writes() {
        let mut tables = SymbolTables::new();
        let parent = tables.create("outer", None, 1);
        let child = tables.create("inner", Some(parent), 1);
        tables.add(parent, "X", &tok("parent")).expect("add");
        tables.add(child, "X", &tok("old")).expect("add");

        let previous = tables.local(child, "X").cloned();
        tables.add(child, "X", &tok("new")).expect("add");
        tables.add(child, "Y", &tok("y")).expect("add");
        tables.restore(child, "Y".to_string(), None);
        tables.restore(child, "X".to_string(), previous);

        assert_eq!(tables.local(child, "X").map(Token::value), Some("old"));
        assert!(tables.local(child, "Y").is_none());
        assert!(tables.local(parent, "Y").is_none());
    }
}
