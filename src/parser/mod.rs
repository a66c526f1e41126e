//! Parser facade
//!
//! - QName: per-session cache turning tokenizer names into `{uri}local`
//! - Entity: table of replacement text for entity references
//! - Config: encoding, namespace mode, entities and element factory
//! - Session: drives the tokenizer and feeds the tree builder

pub mod config;
pub mod entity;
pub mod qname;
pub mod session;

pub use config::ParserConfig;
pub use entity::EntityTable;
pub use qname::QNameCache;
pub use session::{Session, SessionState};
