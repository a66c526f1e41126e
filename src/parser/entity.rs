//! Entity table
//!
//! Replacement text for entity references the tokenizer cannot resolve on
//! its own. Fixed when the session is configured; read-only while parsing.

use std::collections::HashMap;

/// Mapping from entity name to replacement text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTable {
    entries: HashMap<String, String>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entity
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(name.into(), text.into());
    }

    /// Replacement text for `name`, if declared
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EntityTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        EntityTable {
            entries: iter
                .into_iter()
                .map(|(name, text)| (name.into(), text.into()))
                .collect(),
        }
    }
}

/// Name inside an `&name;` reference, if `raw` is one
pub fn reference_name(raw: &str) -> Option<&str> {
    raw.strip_prefix('&')?
        .strip_suffix(';')
        .filter(|name| !name.is_empty())
}
