//! Tree Builder
//!
//! Folds a sequence of `open`, `characters` and `close` calls into a
//! well-formed element tree. Text placement is positional: character data
//! seen right after an `open` becomes that element's `text`, character data
//! seen after a `close` becomes the closed element's `tail`.
//!
//! ```text
//! open(a) characters("x") open(b) close(b) characters("y") close(a)
//!   => <a>x<b/>y</a>     a.text = "x", b.tail = "y"
//! ```
//!
//! Fragments of one text run are joined before they are attached, so the
//! way a run was split never shows in the tree.

use std::sync::Arc;

use tracing::trace;

use super::element::{Attributes, Element};
use crate::error::{Error, Result};

/// Constructor for new elements, called with the tag and attributes
pub type ElementFactory = Arc<dyn Fn(&str, Attributes) -> Element + Send + Sync>;

/// Where pending character data goes on the next flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attach {
    /// No element exists yet; text is dropped
    Nowhere,
    /// `text` of the innermost open element
    Text,
    /// `tail` of the element closed last
    Tail,
}

/// Incremental element tree builder for one document
pub struct TreeBuilder {
    /// Open elements, outermost first; children are attached on close
    open: Vec<Element>,
    /// Character data since the last open/close
    pending: Vec<String>,
    attach: Attach,
    root: Option<Element>,
    factory: Option<ElementFactory>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder {
            open: Vec::with_capacity(16),
            pending: Vec::new(),
            attach: Attach::Nowhere,
            root: None,
            factory: None,
        }
    }

    /// Create a builder that constructs elements through `factory`
    pub fn with_factory(factory: ElementFactory) -> Self {
        TreeBuilder {
            factory: Some(factory),
            ..Self::new()
        }
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Open a new element and return it
    ///
    /// The element becomes a child of the current innermost element once
    /// it is closed.
    pub fn open(&mut self, tag: &str, attributes: Attributes) -> Result<&mut Element> {
        self.flush();
        if self.open.is_empty() && self.root.is_some() {
            return Err(Error::MultipleRoots {
                tag: tag.to_string(),
            });
        }

        let element = match &self.factory {
            Some(factory) => factory(tag, attributes),
            None => Element::with_attributes(tag, attributes),
        };
        trace!(tag, depth = self.open.len(), "open");
        self.open.push(element);
        self.attach = Attach::Text;

        let index = self.open.len() - 1;
        Ok(&mut self.open[index])
    }

    /// Add character data to the current position
    pub fn characters(&mut self, text: &str) {
        self.pending.push(text.to_string());
    }

    /// Close the innermost element and return it
    ///
    /// Fails with [`Error::TagMismatch`] if `tag` is not the innermost
    /// element's tag; the builder must not be used after that.
    pub fn close(&mut self, tag: &str) -> Result<&Element> {
        self.flush();
        let element = self.open.pop().ok_or_else(|| Error::UnexpectedEndTag {
            tag: tag.to_string(),
        })?;
        if element.tag != tag {
            return Err(Error::TagMismatch {
                expected: element.tag,
                found: tag.to_string(),
            });
        }
        trace!(tag, depth = self.open.len(), "close");
        self.attach = Attach::Tail;

        match self.open.last_mut() {
            Some(parent) => {
                parent.append(element);
                let index = parent.len() - 1;
                Ok(&parent.children()[index])
            }
            None => Ok(self.root.insert(element)),
        }
    }

    /// Finish the document and return its root element
    pub fn finish(mut self) -> Result<Element> {
        self.flush();
        if !self.open.is_empty() {
            return Err(Error::UnclosedElements {
                open: self.open.iter().map(|e| e.tag.clone()).collect(),
            });
        }
        self.root.ok_or(Error::EmptyDocument)
    }

    /// Attach pending character data as `text` or `tail`
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = self.pending.concat();
        self.pending.clear();

        let target = match self.attach {
            Attach::Nowhere => None,
            Attach::Text => self.open.last_mut(),
            Attach::Tail => match self.open.last_mut() {
                Some(parent) => parent.children_mut().last_mut(),
                None => self.root.as_mut(),
            },
        };
        let Some(element) = target else {
            return;
        };
        let slot = match self.attach {
            Attach::Tail => &mut element.tail,
            _ => &mut element.text,
        };
        slot.get_or_insert_with(String::new).push_str(&text);
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(ops: &[(&str, &str)]) -> Result<Element> {
        let mut builder = TreeBuilder::new();
        for (op, arg) in ops {
            match *op {
                "open" => {
                    builder.open(arg, Attributes::new())?;
                }
                "text" => builder.characters(arg),
                "close" => {
                    builder.close(arg)?;
                }
                _ => unreachable!(),
            }
        }
        builder.finish()
    }

    #[test]
    fn test_text_and_tail_placement() {
        let root = build(&[
            ("open", "a"),
            ("text", "x"),
            ("open", "b"),
            ("close", "b"),
            ("text", "y"),
            ("close", "a"),
        ])
        .unwrap();

        assert_eq!(root.text.as_deref(), Some("x"));
        assert_eq!(root.tail, None);
        let b = &root.children()[0];
        assert_eq!(b.text, None);
        assert_eq!(b.tail.as_deref(), Some("y"));
    }

    #[test]
    fn test_fragments_are_joined() {
        let root = build(&[
            ("open", "a"),
            ("text", "he"),
            ("text", "l"),
            ("text", "lo"),
            ("close", "a"),
        ])
        .unwrap();
        assert_eq!(root.text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_empty_fragment_is_present_text() {
        let root = build(&[("open", "a"), ("text", ""), ("close", "a")]).unwrap();
        assert_eq!(root.text.as_deref(), Some(""));
    }

    #[test]
    fn test_childless_element_has_no_text() {
        let root = build(&[("open", "a"), ("open", "child"), ("close", "child"), ("close", "a")]).unwrap();
        assert_eq!(root.children()[0].text, None);
        assert_eq!(root.text, None);
    }

    #[test]
    fn test_siblings_tails() {
        let root = build(&[
            ("open", "r"),
            ("open", "a"),
            ("close", "a"),
            ("text", "1"),
            ("open", "b"),
            ("text", "in-b"),
            ("close", "b"),
            ("text", "2"),
            ("close", "r"),
        ])
        .unwrap();
        let kids = root.children();
        assert_eq!(kids[0].tail.as_deref(), Some("1"));
        assert_eq!(kids[1].text.as_deref(), Some("in-b"));
        assert_eq!(kids[1].tail.as_deref(), Some("2"));
    }

    #[test]
    fn test_text_before_root_is_dropped() {
        let root = build(&[("text", "lost"), ("open", "a"), ("close", "a")]).unwrap();
        assert_eq!(root.text, None);
    }

    #[test]
    fn test_tag_mismatch_reports_both_names() {
        let err = build(&[("open", "a"), ("open", "b"), ("close", "a")]).unwrap_err();
        match err {
            Error::TagMismatch { expected, found } => {
                assert_eq!(expected, "b");
                assert_eq!(found, "a");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_elements() {
        let err = build(&[("open", "a"), ("open", "b")]).unwrap_err();
        match err {
            Error::UnclosedElements { open } => assert_eq!(open, vec!["a", "b"]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(build(&[]), Err(Error::EmptyDocument)));
        assert!(matches!(build(&[("text", "  ")]), Err(Error::EmptyDocument)));
    }

    #[test]
    fn test_second_root_rejected() {
        let err = build(&[("open", "a"), ("close", "a"), ("open", "b")]).unwrap_err();
        assert!(matches!(err, Error::MultipleRoots { tag } if tag == "b"));
    }

    #[test]
    fn test_close_without_open() {
        let err = build(&[("close", "a")]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEndTag { tag } if tag == "a"));
    }

    #[test]
    fn test_open_and_close_return_the_element() {
        let mut builder = TreeBuilder::new();
        let opened = builder.open("a", Attributes::new()).unwrap();
        opened.set("k", "v");
        let opened_id = opened.id();
        let closed = builder.close("a").unwrap();
        assert_eq!(closed.id(), opened_id);
        assert_eq!(closed.get("k"), Some("v"));
        assert_eq!(builder.finish().unwrap().id(), opened_id);
    }

    #[test]
    fn test_custom_factory() {
        let factory: ElementFactory = Arc::new(|tag: &str, attrib: Attributes| {
            let mut el = Element::with_attributes(tag.to_uppercase(), attrib);
            el.set("made-by", "factory");
            el
        });
        let mut builder = TreeBuilder::with_factory(factory);
        builder.open("a", Attributes::new()).unwrap();
        builder.close("A").unwrap();
        let root = builder.finish().unwrap();
        assert_eq!(root.tag, "A");
        assert_eq!(root.get("made-by"), Some("factory"));
    }
}
