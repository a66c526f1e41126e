//! Core XML tokenizing primitives
//!
//! This module contains the building blocks the tokenizer is made of:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Encoding: BOM detection and incremental decoding to UTF-8
//! - Entities: character references and attribute value decoding
//! - Namespace: prefix scopes and `uri}local` name expansion
//! - Tokenizer: push tokenizer reporting events to a `TokenSink`

pub mod encoding;
pub mod entities;
pub mod namespace;
pub mod scanner;
pub mod tokenizer;
