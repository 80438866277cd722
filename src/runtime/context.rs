//! Substitution variables available to expressions during one extraction.

use std::collections::HashMap;

/// Immutable variables for a single materializer call.
///
/// Expressions read them as `$name`, and selectors interpolate them as
/// `{name}`. The arena-team loader binds `size` to the bracket being
/// extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    variables: HashMap<String, String>,
}

impl DocumentContext {
    /// Create an empty context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a context from an existing variable map.
    ///
    /// # Example
    /// ```
    /// use std::collections::HashMap;
    /// use armory_scrape::runtime::DocumentContext;
    ///
    /// let mut vars = HashMap::new();
    /// vars.insert("size".to_string(), "2".to_string());
    ///
    /// let ctx = DocumentContext::new(vars);
    /// assert_eq!(ctx.get("size"), Some("2"));
    /// ```
    pub fn new(variables: HashMap<String, String>) -> Self {
        Self { variables }
    }

    /// Return a copy of this context with `key` bound to `value`.
    pub fn with_value(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.variables.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
