//! Namespace Resolution
//!
//! Stack-based namespace resolver used by the tokenizer in namespace-aware
//! mode. Expanded names are reported as `uri}local`.

use super::tokenizer::ErrorCode;

/// Separator between namespace URI and local name in expanded names
pub const NAMESPACE_SEPARATOR: char = '}';

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI); the empty prefix is the default namespace
#[derive(Debug, Clone)]
struct NsBinding {
    prefix: String,
    uri: String,
    depth: usize,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    /// Stack of namespace bindings
    bindings: Vec<NsBinding>,
    /// Current element depth
    depth: usize,
}

impl NamespaceResolver {
    /// Create a new namespace resolver with the `xml` prefix pre-declared
    pub fn new() -> Self {
        NamespaceResolver {
            bindings: vec![NsBinding {
                prefix: "xml".to_string(),
                uri: ns::XML.to_string(),
                depth: 0,
            }],
            depth: 0,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a namespace binding for the current scope
    ///
    /// `xmlns=""` undeclares the default namespace; an empty URI for a
    /// prefix is an error, as is rebinding `xml` or `xmlns`.
    pub fn declare(&mut self, prefix: &str, uri: &str) -> Result<(), ErrorCode> {
        match prefix {
            "xml" if uri == ns::XML => return Ok(()),
            "xml" | "xmlns" => return Err(ErrorCode::ReservedPrefix),
            "" => {}
            _ if uri.is_empty() => return Err(ErrorCode::UndeclaringPrefix),
            _ => {}
        }
        if uri == ns::XML || uri == ns::XMLNS {
            return Err(ErrorCode::ReservedPrefix);
        }

        self.bindings.push(NsBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
        Ok(())
    }

    /// Resolve a prefix to a namespace URI
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        // Search from most recent to oldest
        self.bindings
            .iter()
            .rev()
            .find(|binding| binding.prefix == prefix)
            .map(|binding| binding.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Expand an element name; unprefixed names take the default namespace
    pub fn expand_element(&self, name: &str) -> Result<String, ErrorCode> {
        self.expand(name, true)
    }

    /// Expand an attribute name; unprefixed attributes have no namespace
    pub fn expand_attribute(&self, name: &str) -> Result<String, ErrorCode> {
        self.expand(name, false)
    }

    fn expand(&self, name: &str, use_default: bool) -> Result<String, ErrorCode> {
        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", name),
        };
        if !prefix.is_empty() && (local.is_empty() || local.contains(':')) {
            return Err(ErrorCode::InvalidToken);
        }
        if prefix.is_empty() && !use_default {
            return Ok(name.to_string());
        }

        match self.resolve(prefix) {
            Some(uri) => Ok(format!("{}{}{}", uri, NAMESPACE_SEPARATOR, local)),
            None if prefix.is_empty() => Ok(local.to_string()),
            None => Err(ErrorCode::UnboundPrefix),
        }
    }

    /// Get current depth
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix declared by an attribute name, if it is a namespace declaration
pub fn declared_prefix(attr_name: &str) -> Option<&str> {
    if attr_name == "xmlns" {
        Some("")
    } else {
        attr_name.strip_prefix("xmlns:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespaces() {
        let resolver = NamespaceResolver::new();
        assert_eq!(resolver.resolve("xml"), Some(ns::XML));
        assert_eq!(
            resolver.expand_attribute("xml:lang").unwrap(),
            format!("{}}}lang", ns::XML)
        );
    }

    #[test]
    fn test_declare_and_resolve() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare("svg", "http://www.w3.org/2000/svg").unwrap();

        assert_eq!(resolver.resolve("svg"), Some("http://www.w3.org/2000/svg"));
        assert_eq!(
            resolver.expand_element("svg:rect").unwrap(),
            "http://www.w3.org/2000/svg}rect"
        );
    }

    #[test]
    fn test_scope_pop() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare("foo", "http://example.com/foo").unwrap();
        assert!(resolver.resolve("foo").is_some());

        resolver.pop_scope();
        assert_eq!(resolver.resolve("foo"), None);
        assert_eq!(resolver.expand_element("foo:a"), Err(ErrorCode::UnboundPrefix));
    }

    #[test]
    fn test_shadow_binding() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare("ns", "http://example.com/ns1").unwrap();

        resolver.push_scope();
        resolver.declare("ns", "http://example.com/ns2").unwrap();
        assert_eq!(resolver.resolve("ns"), Some("http://example.com/ns2"));

        resolver.pop_scope();
        assert_eq!(resolver.resolve("ns"), Some("http://example.com/ns1"));
    }

    #[test]
    fn test_default_namespace_and_undeclare() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare("", "http://x").unwrap();
        assert_eq!(resolver.expand_element("y").unwrap(), "http://x}y");
        // Unprefixed attributes never take the default namespace
        assert_eq!(resolver.expand_attribute("y").unwrap(), "y");

        resolver.push_scope();
        resolver.declare("", "").unwrap();
        assert_eq!(resolver.expand_element("y").unwrap(), "y");
    }

    #[test]
    fn test_reserved_prefixes() {
        let mut resolver = NamespaceResolver::new();
        assert_eq!(resolver.declare("xmlns", "http://x"), Err(ErrorCode::ReservedPrefix));
        assert_eq!(resolver.declare("p", ""), Err(ErrorCode::UndeclaringPrefix));
    }

    #[test]
    fn test_deep_scopes_keep_outer_bindings() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare("p", "urn:outer").unwrap();
        for _ in 0..70_000 {
            resolver.push_scope();
        }
        assert_eq!(resolver.depth(), 70_001);
        resolver.declare("p", "urn:inner").unwrap();
        assert_eq!(resolver.resolve("p"), Some("urn:inner"));

        for _ in 0..70_000 {
            resolver.pop_scope();
        }
        assert_eq!(resolver.resolve("p"), Some("urn:outer"));
        assert_eq!(resolver.resolve("xml"), Some(ns::XML));
    }

    #[test]
    fn test_declared_prefix() {
        assert_eq!(declared_prefix("xmlns"), Some(""));
        assert_eq!(declared_prefix("xmlns:a"), Some("a"));
        assert_eq!(declared_prefix("href"), None);
    }
}
