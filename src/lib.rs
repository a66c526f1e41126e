//! RustyETree - XML element trees built from a push tokenizer
//!
//! Layers:
//! - core: byte scanning, decoding and tokenizing (events via `TokenSink`)
//! - tree: `Element`, `TreeBuilder` and the `ElementTree` document wrapper
//! - parser: per-document `Session` wiring tokenizer events into a builder
//!
//! ```ignore
//! let root = rustyetree::from_string("<a>x<b/>y</a>")?;
//! assert_eq!(root.text.as_deref(), Some("x"));
//! assert_eq!(root.children()[0].tail.as_deref(), Some("y"));
//! ```
//!
//! Chunked input goes through a session:
//!
//! ```ignore
//! let mut session = Session::with_defaults();
//! session.feed(b"<a>he", false)?;
//! session.feed(b"llo</a>", true)?;
//! let root = session.finish()?;
//! ```

pub mod core;
pub mod error;
pub mod parser;
pub mod tree;

pub use crate::core::tokenizer::{ErrorCode, FeedError, TokenSink, Tokenizer};
pub use error::{Error, ParseError, Result};
pub use parser::{EntityTable, ParserConfig, QNameCache, Session, SessionState};
pub use tree::{from_string, Attributes, Element, ElementFactory, ElementId, ElementTree, TreeBuilder};
