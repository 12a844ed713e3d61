//! Tunables shared by the lexer and the parser.

/// Longest physical line accepted by the lexer (1 MiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Capacity hint for symbol tables created during a parse.
pub const DEFAULT_SCOPE_CAPACITY: usize = 16;

/// Name given to the record that collects directives before the first `.test`.
pub const DEFAULT_IMPLICIT_TEST_NAME: &str = "UNSET";

/// Parse options.
///
/// ```
/// use rest_test::Options;
///
/// let opts = Options::new().max_line_length(80).unique_test_names(false);
/// assert_eq!(opts.max_line_length, 80);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub max_line_length: usize,
    pub scope_capacity: usize,
    pub implicit_test_name: String,
    pub unique_test_names: bool,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            scope_capacity: DEFAULT_SCOPE_CAPACITY,
            implicit_test_name: DEFAULT_IMPLICIT_TEST_NAME.to_string(),
            unique_test_names: true,
        }
    }

    /// Set the maximum physical line length in bytes.
    #[must_use]
    pub const fn max_line_length(mut self, limit: usize) -> Self {
        self.max_line_length = limit;
        self
    }

    /// Set the capacity hint for per-test symbol tables.
    #[must_use]
    pub const fn scope_capacity(mut self, capacity: usize) -> Self {
        self.scope_capacity = capacity;
        self
    }

    /// Set the name of the implicit leading record.
    #[must_use]
    pub fn implicit_test_name(mut self, name: &str) -> Self {
        self.implicit_test_name = name.to_string();
        self
    }

    /// Reject repeated `.test` names within one source.
    #[must_use]
    pub const fn unique_test_names(mut self, enabled: bool) -> Self {
        self.unique_test_names = enabled;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
