//! Document wrapper
//!
//! Whole-document entry points. Each call runs one [`Session`] to
//! completion; the session is released before the call returns, on success
//! and on failure alike.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::element::Element;
use crate::error::Result;
use crate::parser::config::ParserConfig;
use crate::parser::session::Session;

/// A parsed document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementTree {
    root: Option<Element>,
}

impl ElementTree {
    pub fn new(root: Option<Element>) -> Self {
        ElementTree { root }
    }

    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.root.as_mut()
    }

    pub fn into_root(self) -> Option<Element> {
        self.root
    }

    /// Parse a complete document held in memory
    pub fn from_string(text: &str, config: &ParserConfig) -> Result<Element> {
        Session::new(config).parse_whole(text.as_bytes())
    }

    /// Read `source` to the end, then parse it
    pub fn load<R: Read>(mut source: R, config: &ParserConfig) -> Result<Self> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        debug!(bytes = data.len(), "document read");
        let root = Session::new(config).parse_whole(&data)?;
        Ok(ElementTree::new(Some(root)))
    }

    /// Parse the file at `path`
    pub fn parse_file<P: AsRef<Path>>(path: P, config: &ParserConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::load(file, config)
    }
}

impl From<Element> for ElementTree {
    fn from(root: Element) -> Self {
        ElementTree::new(Some(root))
    }
}

/// Parse a document with the default configuration
pub fn from_string(text: &str) -> Result<Element> {
    ElementTree::from_string(text, &ParserConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::{self, Cursor, Write};

    #[test]
    fn test_from_string() {
        let root = from_string("<root><item id='1'/><item id='2'/></root>").unwrap();
        assert_eq!(root.tag, "root");
        assert_eq!(root.len(), 2);
        assert_eq!(root.children()[1].get("id"), Some("2"));
    }

    #[test]
    fn test_from_string_error() {
        let err = from_string("<root>").unwrap_err();
        assert!(matches!(err, Error::UnclosedElements { .. }));
    }

    #[test]
    fn test_load_from_reader() {
        let tree = ElementTree::load(Cursor::new(b"<a>x</a>".to_vec()), &ParserConfig::default()).unwrap();
        assert_eq!(tree.root().and_then(|r| r.text.as_deref()), Some("x"));
        assert_eq!(tree.into_root().map(|r| r.tag), Some("a".to_string()));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        }
    }

    #[test]
    fn test_load_io_error() {
        let err = ElementTree::load(FailingReader, &ParserConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_parse_file() {
        let path = std::env::temp_dir().join(format!("rustyetree-{}.xml", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(b"<?xml version='1.0'?>\n<doc><p>hi</p></doc>\n").unwrap();
        }
        let tree = ElementTree::parse_file(&path, &ParserConfig::default());
        std::fs::remove_file(&path).unwrap();

        let tree = tree.unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.tag, "doc");
        assert_eq!(root.children()[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_parse_missing_file() {
        let err = ElementTree::parse_file("/nonexistent/rustyetree.xml", &ParserConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_tree_wraps_root() {
        let mut tree = ElementTree::from(Element::new("r"));
        tree.root_mut().unwrap().set("k", "v");
        assert_eq!(tree.root().and_then(|r| r.get("k")), Some("v"));
        assert_eq!(ElementTree::default().root(), None);
    }
}
