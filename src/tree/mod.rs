//! Element tree
//!
//! - Element: tag, attributes, text, tail and owned children
//! - Builder: folds open/characters/close calls into a tree
//! - Document: `ElementTree` wrapper and whole-document entry points

pub mod builder;
pub mod document;
pub mod element;

pub use builder::{ElementFactory, TreeBuilder};
pub use document::{from_string, ElementTree};
pub use element::{Attributes, Element, ElementId};
