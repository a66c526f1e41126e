//! Element - a node in the document tree
//!
//! An element has a tag, an attribute map, optional `text` (character data
//! before its first child) and optional `tail` (character data after its end
//! tag), and owns its children in document order.
//!
//! ```text
//! <tag attrib>text<child/>...</tag>tail
//! ```
//!
//! `None` and `Some("")` are different states for `text` and `tail`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Attribute map of an element
pub type Attributes = HashMap<String, String>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an element instance
///
/// Every constructed (or cloned) element gets a fresh id; two elements with
/// equal content still have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        ElementId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An XML element
#[derive(Debug)]
pub struct Element {
    id: ElementId,
    /// Element name, `{uri}local` for namespaced names
    pub tag: String,
    pub attrib: Attributes,
    pub text: Option<String>,
    pub tail: Option<String>,
    children: Vec<Element>,
}

impl Element {
    /// Create an element with no attributes
    pub fn new(tag: impl Into<String>) -> Self {
        Self::with_attributes(tag, Attributes::new())
    }

    /// Create an element with the given attributes
    pub fn with_attributes(tag: impl Into<String>, attrib: Attributes) -> Self {
        Element {
            id: ElementId::next(),
            tag: tag.into(),
            attrib,
            text: None,
            tail: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Child elements in document order
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Element] {
        &mut self.children
    }

    pub fn child(&self, index: usize) -> Option<&Element> {
        self.children.get(index)
    }

    /// Number of child elements
    ///
    /// An element with no children may still carry text; check both to
    /// decide whether it is truly empty.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Add `child` after the last existing child
    pub fn append(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Append children from a sequence
    pub fn extend<I: IntoIterator<Item = Element>>(&mut self, children: I) {
        self.children.extend(children);
    }

    /// Insert `child` at `index`, which must be within `0..=len()`
    pub fn insert(&mut self, index: usize, child: Element) -> Result<()> {
        if index > self.children.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.children.len(),
            });
        }
        self.children.insert(index, child);
        Ok(())
    }

    /// Remove the child that is the same instance as `child`
    ///
    /// Compares identity, not tag or content. Returns the removed element,
    /// or `None` if `child` is not a child of this element.
    pub fn remove(&mut self, child: &Element) -> Option<Element> {
        self.remove_id(child.id)
    }

    /// Remove the child with the given identity
    pub fn remove_id(&mut self, id: ElementId) -> Option<Element> {
        let index = self.children.iter().position(|c| c.id == id)?;
        Some(self.children.remove(index))
    }

    /// Remove all children and attributes, and reset text and tail to absent
    pub fn clear(&mut self) {
        self.attrib.clear();
        self.children.clear();
        self.text = None;
        self.tail = None;
    }

    /// Create a child element, append it, and return it
    pub fn sub_element(&mut self, tag: impl Into<String>, attrib: Attributes) -> &mut Element {
        let index = self.children.len();
        self.children.push(Element::with_attributes(tag, attrib));
        &mut self.children[index]
    }

    /// Get an attribute value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrib.get(key).map(String::as_str)
    }

    /// Get an attribute value, or `default` if it is not set
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Set an attribute value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrib.insert(key.into(), value.into());
    }

    /// Attribute names, in arbitrary order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attrib.keys().map(String::as_str)
    }
}

impl Clone for Element {
    /// Deep copy with fresh identities
    fn clone(&self) -> Self {
        Element {
            id: ElementId::next(),
            tag: self.tag.clone(),
            attrib: self.attrib.clone(),
            text: self.text.clone(),
            tail: self.tail.clone(),
            children: self.children.clone(),
        }
    }
}

/// Structural equality; identity is ignored
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.attrib == other.attrib
            && self.text == other.text
            && self.tail == other.tail
            && self.children == other.children
    }
}

impl Eq for Element {}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        write!(f, "<Element {} attrib={{", self.tag)?;
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, self.attrib[*key])?;
        }
        write!(f, "}}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_append_and_extend_keep_order() {
        let mut root = Element::new("root");
        root.append(Element::new("a"));
        root.extend(vec![Element::new("b"), Element::new("c")]);

        let tags: Vec<&str> = root.children().iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["a", "b", "c"]);
        assert_eq!(root.len(), 3);
    }

    #[test]
    fn test_insert_bounds() {
        let mut root = Element::new("root");
        root.insert(0, Element::new("b")).unwrap();
        root.insert(0, Element::new("a")).unwrap();
        root.insert(2, Element::new("c")).unwrap();
        assert_eq!(root.child(2).map(|c| c.tag.as_str()), Some("c"));

        let err = root.insert(4, Element::new("d")).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 4, len: 3 }));
    }

    #[test]
    fn test_remove_is_identity_based() {
        let mut root = Element::new("root");
        let first = Element::new("item");
        let twin = first.clone();
        root.append(Element::new("item"));
        let first_id = first.id();
        root.append(first);

        // Same content, different instance: nothing removed
        assert!(root.remove(&twin).is_none());
        assert_eq!(root.len(), 2);

        let removed = root.remove_id(first_id).unwrap();
        assert_eq!(removed.id(), first_id);
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut el = Element::with_attributes("a", attrs(&[("x", "1")]));
        el.text = Some("t".into());
        el.tail = Some(String::new());
        el.append(Element::new("b"));

        el.clear();
        assert!(el.attrib.is_empty());
        assert!(el.is_empty());
        assert_eq!(el.text, None);
        assert_eq!(el.tail, None);
        assert_eq!(el.tag, "a");
    }

    #[test]
    fn test_attribute_access() {
        let mut el = Element::new("a");
        assert_eq!(el.get("x"), None);
        assert_eq!(el.get_or("x", "dflt"), "dflt");

        el.set("x", "1");
        el.set("y", "2");
        assert_eq!(el.get("x"), Some("1"));

        let mut keys: Vec<&str> = el.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_sub_element() {
        let mut root = Element::new("root");
        root.sub_element("child", Attributes::new()).text = Some("hi".into());
        assert_eq!(root.children()[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_clone_is_equal_but_distinct() {
        let mut root = Element::new("root");
        root.append(Element::new("a"));
        let copy = root.clone();
        assert_eq!(copy, root);
        assert_ne!(copy.id(), root.id());
        assert_ne!(copy.children()[0].id(), root.children()[0].id());
    }

    #[test]
    fn test_empty_text_differs_from_absent() {
        let mut a = Element::new("a");
        let b = Element::new("a");
        a.text = Some(String::new());
        assert_ne!(a, b);
    }

    #[test]
    fn test_display() {
        let el = Element::with_attributes("a", attrs(&[("y", "2"), ("x", "1")]));
        assert_eq!(el.to_string(), "<Element a attrib={x: 1, y: 2}>");
    }
}
