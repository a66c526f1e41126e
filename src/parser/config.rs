//! Parser configuration

use std::fmt;

use super::entity::EntityTable;
use crate::tree::builder::ElementFactory;

/// Settings for one parse session
///
/// ```ignore
/// let config = ParserConfig::new()
///     .with_namespaces(false)
///     .with_entity("copy", "©");
/// ```
#[derive(Clone)]
pub struct ParserConfig {
    /// Input encoding name; `None` detects it from the BOM, falling back to UTF-8
    pub encoding: Option<String>,
    /// Report namespaced names as `{uri}local`
    pub namespace_aware: bool,
    /// Replacement text for entity references in content
    pub entities: EntityTable,
    /// Element constructor; `None` builds plain elements
    pub factory: Option<ElementFactory>,
}

impl ParserConfig {
    pub fn new() -> Self {
        ParserConfig {
            encoding: None,
            namespace_aware: true,
            entities: EntityTable::new(),
            factory: None,
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_namespaces(mut self, namespace_aware: bool) -> Self {
        self.namespace_aware = namespace_aware;
        self
    }

    pub fn with_entities(mut self, entities: EntityTable) -> Self {
        self.entities = entities;
        self
    }

    /// Declare a single entity
    pub fn with_entity(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.entities.insert(name, text);
        self
    }

    pub fn with_factory(mut self, factory: ElementFactory) -> Self {
        self.factory = Some(factory);
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("encoding", &self.encoding)
            .field("namespace_aware", &self.namespace_aware)
            .field("entities", &self.entities.len())
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.encoding, None);
        assert!(config.namespace_aware);
        assert!(config.entities.is_empty());
        assert!(config.factory.is_none());
    }

    #[test]
    fn test_builder_methods() {
        let config = ParserConfig::new()
            .with_encoding("UTF-16")
            .with_namespaces(false)
            .with_entity("copy", "©");
        assert_eq!(config.encoding.as_deref(), Some("UTF-16"));
        assert!(!config.namespace_aware);
        assert_eq!(config.entities.resolve("copy"), Some("©"));
    }
}
