//! Qualified-name cache
//!
//! The tokenizer reports namespaced names as `uri}local`. The cache rewrites
//! them to Clark notation, `{uri}local`, and remembers every result for the
//! rest of the session, so repeated names resolve to the same string.

use std::collections::HashMap;

use crate::core::namespace::NAMESPACE_SEPARATOR;

/// Per-session memo from raw tokenizer names to external names
#[derive(Debug, Default)]
pub struct QNameCache {
    names: HashMap<String, String>,
}

impl QNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a raw name, caching the result
    pub fn resolve(&mut self, raw: &str) -> &str {
        if !self.names.contains_key(raw) {
            let name = if raw.contains(NAMESPACE_SEPARATOR) {
                format!("{{{raw}")
            } else {
                raw.to_string()
            };
            self.names.insert(raw.to_string(), name);
        }
        &self.names[raw]
    }

    /// Number of distinct names seen
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
