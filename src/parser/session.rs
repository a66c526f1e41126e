//! Parse session
//!
//! A [`Session`] owns one tokenizer and one tree builder for the lifetime of
//! a single document. Tokenizer events are dispatched synchronously inside
//! [`Session::feed`]:
//!
//! ```text
//! start tag      -> resolve name  -> TreeBuilder::open
//! end tag        -> resolve name  -> TreeBuilder::close
//! character data                  -> TreeBuilder::characters
//! default data   -> &name; lookup -> TreeBuilder::characters (else dropped)
//! ```
//!
//! States move `Idle -> Feeding -> Failed | Finished`. The final feed also
//! checks that the document is complete. A failed session replays its error
//! on every later call, and so does any feed after the final one. Consuming methods end the session;
//! dropping it abandons the parse.

use tracing::{debug, trace};

use super::config::ParserConfig;
use super::entity::{reference_name, EntityTable};
use super::qname::QNameCache;
use crate::core::tokenizer::{ErrorCode, FeedError, TokenSink, Tokenizer};
use crate::error::{Error, ParseError, Result};
use crate::tree::builder::TreeBuilder;
use crate::tree::element::{Attributes, Element};

/// Lifecycle of a session
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Created, nothing fed yet
    Idle,
    /// At least one non-final chunk accepted
    Feeding,
    /// A feed failed; the error is replayed on every later call
    Failed(Error),
    /// The final chunk was accepted and the document is complete
    Finished,
}

/// Why dispatch stopped a feed
enum Abort {
    Tree(Error),
    UndefinedEntity(String),
}

/// Per-session state handed to the tokenizer with every callback
struct Dispatch {
    builder: TreeBuilder,
    names: QNameCache,
    entities: EntityTable,
}

impl TokenSink for Dispatch {
    type Error = Abort;

    fn start_tag(&mut self, name: &str, attributes: &[(String, String)]) -> std::result::Result<(), Abort> {
        let mut attrib = Attributes::with_capacity(attributes.len());
        for (key, value) in attributes {
            attrib.insert(self.names.resolve(key).to_string(), value.clone());
        }
        let tag = self.names.resolve(name);
        self.builder.open(tag, attrib).map_err(Abort::Tree)?;
        Ok(())
    }

    fn end_tag(&mut self, name: &str) -> std::result::Result<(), Abort> {
        let tag = self.names.resolve(name);
        self.builder.close(tag).map_err(Abort::Tree)?;
        Ok(())
    }

    fn character_data(&mut self, text: &str) -> std::result::Result<(), Abort> {
        self.builder.characters(text);
        Ok(())
    }

    fn default_data(&mut self, raw: &str) -> std::result::Result<(), Abort> {
        let Some(name) = reference_name(raw) else {
            return Ok(());
        };
        match self.entities.resolve(name) {
            Some(text) => {
                self.builder.characters(text);
                Ok(())
            }
            None => Err(Abort::UndefinedEntity(name.to_string())),
        }
    }
}

/// One document parse
pub struct Session {
    tokenizer: Tokenizer,
    dispatch: Dispatch,
    state: SessionState,
    /// Set by the final feed
    root: Option<Element>,
}

impl Session {
    /// Create a session with fresh name and builder state
    pub fn new(config: &ParserConfig) -> Self {
        debug!(
            encoding = config.encoding.as_deref().unwrap_or("detect"),
            namespace_aware = config.namespace_aware,
            entities = config.entities.len(),
            "session created"
        );
        let builder = match &config.factory {
            Some(factory) => TreeBuilder::with_factory(factory.clone()),
            None => TreeBuilder::new(),
        };
        Session {
            tokenizer: Tokenizer::new(config.encoding.as_deref(), config.namespace_aware),
            dispatch: Dispatch {
                builder,
                names: QNameCache::new(),
                entities: config.entities.clone(),
            },
            state: SessionState::Idle,
            root: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ParserConfig::default())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Feed the next chunk of the document
    ///
    /// `is_final` marks the end of input; incomplete markup is an error
    /// then, and held back for the next chunk otherwise. The final feed
    /// fails if elements are still open or no element was seen.
    pub fn feed(&mut self, chunk: &[u8], is_final: bool) -> Result<()> {
        if let SessionState::Failed(err) = &self.state {
            return Err(err.clone());
        }
        if matches!(self.state, SessionState::Finished) {
            let err: Error = self.position_error(ErrorCode::Finished).into();
            return Err(self.fail(err));
        }

        trace!(len = chunk.len(), is_final, "feed");
        match self.tokenizer.feed(chunk, is_final, &mut self.dispatch) {
            Ok(()) if is_final => {
                let builder = std::mem::take(&mut self.dispatch.builder);
                match builder.finish() {
                    Ok(root) => {
                        debug!(tag = %root.tag, children = root.len(), "document complete");
                        self.root = Some(root);
                        self.state = SessionState::Finished;
                        Ok(())
                    }
                    Err(err) => Err(self.fail(err)),
                }
            }
            Ok(()) => {
                self.state = SessionState::Feeding;
                Ok(())
            }
            Err(e) => {
                let err = self.capture(e);
                Err(self.fail(err))
            }
        }
    }

    /// End the input if not done yet and return the root element
    pub fn finish(mut self) -> Result<Element> {
        if !matches!(self.state, SessionState::Finished) {
            self.feed(&[], true)?;
        }
        self.root.ok_or(Error::EmptyDocument)
    }

    /// Parse a complete document in one call
    pub fn parse_whole(mut self, data: &[u8]) -> Result<Element> {
        self.feed(data, true)?;
        self.finish()
    }

    /// Release the session without building a tree
    pub fn close(self) {
        trace!(state = ?self.state, "session closed");
    }

    /// Move to `Failed`, keeping a copy of `err` for later calls
    fn fail(&mut self, err: Error) -> Error {
        debug!(
            code = err.code(),
            line = self.tokenizer.current_line(),
            column = self.tokenizer.current_column(),
            error = %err,
            "session failed"
        );
        self.state = SessionState::Failed(err.clone());
        err
    }

    fn position_error(&self, code: ErrorCode) -> ParseError {
        ParseError::new(code, self.tokenizer.current_line(), self.tokenizer.current_column())
    }

    fn capture(&self, e: FeedError<Abort>) -> Error {
        match e {
            FeedError::Syntax(code) => self.position_error(code).into(),
            FeedError::Aborted(Abort::Tree(err)) => err,
            FeedError::Aborted(Abort::UndefinedEntity(name)) => Error::UndefinedEntity {
                name,
                line: self.tokenizer.current_line(),
                column: self.tokenizer.current_column(),
            },
        }
    }
}
