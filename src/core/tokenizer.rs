//! XML Tokenizer - push-style engine driving a [`TokenSink`]
//!
//! The tokenizer owns the byte-level work: decoding, markup scanning,
//! well-formedness checks that do not need the tree, attribute decoding and
//! namespace expansion. It reports what it finds, strictly in document
//! order, through four callbacks:
//! - `start_tag(name, attributes)`
//! - `end_tag(name)`
//! - `character_data(text)`
//! - `default_data(raw)` for everything else (comments, PIs, declarations,
//!   whitespace outside the root, and entity references it cannot resolve)
//!
//! Input may arrive in chunks. Markup or text that is incomplete at the end
//! of a non-final chunk is kept and re-scanned when more input arrives, so
//! chunk boundaries never change the events produced.

use tracing::trace;

use super::encoding::{Decoder, XmlEncoding};
use super::entities::{decode_attribute_value, normalize_newlines, parse_reference, Reference};
use super::namespace::{declared_prefix, NamespaceResolver};
use super::scanner::{is_name_char, is_name_start_char, is_whitespace, Scanner};

/// Tokenizer status codes (expat numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Syntax,
    NoElements,
    InvalidToken,
    UnclosedToken,
    PartialChar,
    TagMismatch,
    DuplicateAttribute,
    JunkAfterDocElement,
    UndefinedEntity,
    BadCharRef,
    MisplacedXmlPi,
    UnknownEncoding,
    UnclosedCdataSection,
    UnboundPrefix,
    UndeclaringPrefix,
    Aborted,
    Finished,
    ReservedPrefix,
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        match self {
            ErrorCode::Syntax => 2,
            ErrorCode::NoElements => 3,
            ErrorCode::InvalidToken => 4,
            ErrorCode::UnclosedToken => 5,
            ErrorCode::PartialChar => 6,
            ErrorCode::TagMismatch => 7,
            ErrorCode::DuplicateAttribute => 8,
            ErrorCode::JunkAfterDocElement => 9,
            ErrorCode::UndefinedEntity => 11,
            ErrorCode::BadCharRef => 14,
            ErrorCode::MisplacedXmlPi => 17,
            ErrorCode::UnknownEncoding => 18,
            ErrorCode::UnclosedCdataSection => 20,
            ErrorCode::UnboundPrefix => 27,
            ErrorCode::UndeclaringPrefix => 28,
            ErrorCode::Aborted => 35,
            ErrorCode::Finished => 36,
            ErrorCode::ReservedPrefix => 38,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Syntax => "syntax error",
            ErrorCode::NoElements => "no element found",
            ErrorCode::InvalidToken => "not well-formed (invalid token)",
            ErrorCode::UnclosedToken => "unclosed token",
            ErrorCode::PartialChar => "partial character",
            ErrorCode::TagMismatch => "mismatched tag",
            ErrorCode::DuplicateAttribute => "duplicate attribute",
            ErrorCode::JunkAfterDocElement => "junk after document element",
            ErrorCode::UndefinedEntity => "undefined entity",
            ErrorCode::BadCharRef => "reference to invalid character number",
            ErrorCode::MisplacedXmlPi => "XML or text declaration not at start of entity",
            ErrorCode::UnknownEncoding => "unknown encoding",
            ErrorCode::UnclosedCdataSection => "unclosed CDATA section",
            ErrorCode::UnboundPrefix => "unbound prefix",
            ErrorCode::UndeclaringPrefix => "must not undeclare prefix",
            ErrorCode::Aborted => "parsing aborted",
            ErrorCode::Finished => "parsing finished",
            ErrorCode::ReservedPrefix => "reserved prefix or namespace name misused",
        }
    }
}

/// Receiver of tokenizer events
///
/// Every callback gets the sink by `&mut self`, so per-session state travels
/// with the call. Returning an error stops the current feed immediately.
pub trait TokenSink {
    type Error;

    /// Called for a start tag, and for the start half of an empty-element tag
    ///
    /// # Arguments
    /// * `name` - Element name (`uri}local` when namespace-aware)
    /// * `attributes` - Name/value pairs in document order, values decoded
    fn start_tag(&mut self, name: &str, attributes: &[(String, String)]) -> Result<(), Self::Error>;

    /// Called for an end tag, and for the end half of an empty-element tag
    fn end_tag(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Called for character data; one text run may arrive in several calls
    fn character_data(&mut self, text: &str) -> Result<(), Self::Error>;

    /// Called for markup the tokenizer does not classify, verbatim
    fn default_data(&mut self, raw: &str) -> Result<(), Self::Error>;
}

/// Why a feed stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError<E> {
    /// The input is malformed
    Syntax(ErrorCode),
    /// A sink callback returned an error
    Aborted(E),
}

/// Outcome of scanning one token
enum Step {
    /// Token handled; scanning continues at this offset
    Consumed(usize),
    /// More input is needed; the code applies if none will come
    Incomplete(ErrorCode),
}

type StepResult<E> = Result<Step, FeedError<E>>;

/// Push tokenizer for one document
pub struct Tokenizer {
    decoder: Decoder,
    /// Decoded input not yet consumed
    buffer: String,
    /// Position (1-based) of the first unconsumed character
    line: usize,
    column: usize,
    last_was_cr: bool,
    depth: usize,
    seen_root: bool,
    consumed_any: bool,
    namespaces: Option<NamespaceResolver>,
    status: Option<ErrorCode>,
    finished: bool,
}

impl Tokenizer {
    /// Create a tokenizer
    ///
    /// # Arguments
    /// * `encoding` - Input encoding name; `None` detects it from the input
    /// * `namespace_aware` - Report names as `uri}local` and consume `xmlns` attributes
    pub fn new(encoding: Option<&str>, namespace_aware: bool) -> Self {
        let (declared, status) = match encoding {
            None => (None, None),
            Some(label) => match XmlEncoding::from_label(label) {
                Some(found) => (Some(found), None),
                None => (None, Some(ErrorCode::UnknownEncoding)),
            },
        };

        Tokenizer {
            decoder: Decoder::new(declared),
            buffer: String::new(),
            line: 1,
            column: 1,
            last_was_cr: false,
            depth: 0,
            seen_root: false,
            consumed_any: false,
            namespaces: namespace_aware.then(NamespaceResolver::new),
            status,
            finished: false,
        }
    }

    /// Line of the token being processed when the last feed failed
    pub fn current_line(&self) -> usize {
        self.line
    }

    /// Column (in characters) of the token being processed when the last feed failed
    pub fn current_column(&self) -> usize {
        self.column
    }

    /// The status the tokenizer stopped with, if it stopped
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.status
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Scan `chunk`, invoking `sink` for each complete token
    ///
    /// After a failed feed the tokenizer keeps failing with the same code.
    /// After a successful final feed it fails with [`ErrorCode::Finished`].
    pub fn feed<S: TokenSink>(
        &mut self,
        chunk: &[u8],
        is_final: bool,
        sink: &mut S,
    ) -> Result<(), FeedError<S::Error>> {
        if let Some(code) = self.status {
            return Err(FeedError::Syntax(code));
        }
        if self.finished {
            return Err(FeedError::Syntax(ErrorCode::Finished));
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        if let Err(code) = self.decoder.decode(chunk, is_final, &mut buffer) {
            return Err(self.fail(code));
        }

        let mut pos = 0;
        while pos < buffer.len() {
            match self.step(&buffer, pos, is_final, sink) {
                Ok(Step::Consumed(end)) => {
                    self.advance_position(&buffer[pos..end]);
                    self.consumed_any = true;
                    pos = end;
                }
                Ok(Step::Incomplete(code)) => {
                    if is_final {
                        return Err(self.fail(code));
                    }
                    trace!(held = buffer.len() - pos, "holding incomplete token");
                    break;
                }
                Err(FeedError::Syntax(code)) => return Err(self.fail(code)),
                Err(FeedError::Aborted(e)) => {
                    self.status = Some(ErrorCode::Aborted);
                    return Err(FeedError::Aborted(e));
                }
            }
        }

        buffer.drain(..pos);
        self.buffer = buffer;
        if is_final {
            self.finished = true;
        }
        Ok(())
    }

    fn fail<E>(&mut self, code: ErrorCode) -> FeedError<E> {
        self.status = Some(code);
        self.buffer.clear();
        FeedError::Syntax(code)
    }

    fn advance_position(&mut self, consumed: &str) {
        for c in consumed.chars() {
            match c {
                '\n' if self.last_was_cr => {}
                '\n' | '\r' => {
                    self.line += 1;
                    self.column = 1;
                }
                _ => self.column += 1,
            }
            self.last_was_cr = c == '\r';
        }
    }

    /// Scan the token starting at `pos`
    fn step<S: TokenSink>(&mut self, buf: &str, pos: usize, is_final: bool, sink: &mut S) -> StepResult<S::Error> {
        match buf.as_bytes()[pos] {
            b'<' => self.scan_markup(buf, pos, sink),
            b'&' => self.scan_reference(buf, pos, sink),
            _ => self.scan_text(buf, pos, is_final, sink),
        }
    }

    fn scan_markup<S: TokenSink>(&mut self, buf: &str, pos: usize, sink: &mut S) -> StepResult<S::Error> {
        let scanner = Scanner::new(buf.as_bytes(), pos);
        match scanner.peek_at(1) {
            None => Ok(Step::Incomplete(ErrorCode::UnclosedToken)),
            Some(b'?') => self.scan_pi(buf, pos, sink),
            Some(b'!') => self.scan_bang(buf, pos, sink),
            Some(b'/') => self.scan_end_tag(buf, pos, sink),
            Some(c) if is_name_start_char(c) => self.scan_start_tag(buf, pos, sink),
            Some(_) => Err(FeedError::Syntax(ErrorCode::InvalidToken)),
        }
    }

    /// Scan a processing instruction or the XML declaration
    fn scan_pi<S: TokenSink>(&mut self, buf: &str, pos: usize, sink: &mut S) -> StepResult<S::Error> {
        let mut scanner = Scanner::new(buf.as_bytes(), pos + 2);
        let Some(close) = scanner.find_seq(b"?>") else {
            return Ok(Step::Incomplete(ErrorCode::UnclosedToken));
        };
        let target = scanner
            .read_name()
            .ok_or(FeedError::Syntax(ErrorCode::InvalidToken))?;
        if target.eq_ignore_ascii_case(b"xml") && (target != b"xml" || self.consumed_any) {
            return Err(FeedError::Syntax(ErrorCode::MisplacedXmlPi));
        }

        let end = close + 2;
        sink.default_data(&buf[pos..end]).map_err(FeedError::Aborted)?;
        Ok(Step::Consumed(end))
    }

    /// Scan comments, CDATA sections and DOCTYPE declarations
    fn scan_bang<S: TokenSink>(&mut self, buf: &str, pos: usize, sink: &mut S) -> StepResult<S::Error> {
        let mut scanner = Scanner::new(buf.as_bytes(), pos);

        if scanner.starts_with(b"<!--") {
            scanner.advance(4);
            let Some(close) = scanner.find_seq(b"--") else {
                return Ok(Step::Incomplete(ErrorCode::UnclosedToken));
            };
            // "--" may only appear as part of the closing "-->"
            return match buf.as_bytes().get(close + 2) {
                None => Ok(Step::Incomplete(ErrorCode::UnclosedToken)),
                Some(b'>') => {
                    sink.default_data(&buf[pos..close + 3]).map_err(FeedError::Aborted)?;
                    Ok(Step::Consumed(close + 3))
                }
                Some(_) => Err(FeedError::Syntax(ErrorCode::InvalidToken)),
            };
        }

        if scanner.starts_with(b"<![CDATA[") {
            if self.depth == 0 {
                return Err(FeedError::Syntax(ErrorCode::InvalidToken));
            }
            scanner.advance(9);
            let Some(close) = scanner.find_seq(b"]]>") else {
                return Ok(Step::Incomplete(ErrorCode::UnclosedCdataSection));
            };
            let content = normalize_newlines(&buf[pos + 9..close]);
            if !content.is_empty() {
                sink.character_data(&content).map_err(FeedError::Aborted)?;
            }
            return Ok(Step::Consumed(close + 3));
        }

        if scanner.starts_with(b"<!DOCTYPE") {
            if self.seen_root {
                return Err(FeedError::Syntax(ErrorCode::InvalidToken));
            }
            return match find_doctype_end(buf.as_bytes(), pos + 9) {
                Some(close) => {
                    sink.default_data(&buf[pos..close + 1]).map_err(FeedError::Aborted)?;
                    Ok(Step::Consumed(close + 1))
                }
                None => Ok(Step::Incomplete(ErrorCode::UnclosedToken)),
            };
        }

        let partial = [b"<!--" as &[u8], b"<![CDATA[", b"<!DOCTYPE"]
            .iter()
            .any(|needle| scanner.is_prefix_of(needle));
        if partial {
            Ok(Step::Incomplete(ErrorCode::UnclosedToken))
        } else {
            Err(FeedError::Syntax(ErrorCode::InvalidToken))
        }
    }

    fn scan_end_tag<S: TokenSink>(&mut self, buf: &str, pos: usize, sink: &mut S) -> StepResult<S::Error> {
        let mut scanner = Scanner::new(buf.as_bytes(), pos + 2);
        let Some(close) = scanner.find_tag_end_quoted() else {
            return Ok(Step::Incomplete(ErrorCode::UnclosedToken));
        };
        let name_start = scanner.position();
        scanner
            .read_name()
            .ok_or(FeedError::Syntax(ErrorCode::InvalidToken))?;
        let name = &buf[name_start..scanner.position()];
        scanner.skip_whitespace();
        if scanner.position() != close {
            return Err(FeedError::Syntax(ErrorCode::InvalidToken));
        }
        if self.depth == 0 {
            return Err(FeedError::Syntax(ErrorCode::Syntax));
        }

        let name = match &mut self.namespaces {
            Some(resolver) => {
                let expanded = resolver.expand_element(name).map_err(FeedError::Syntax)?;
                resolver.pop_scope();
                expanded
            }
            None => name.to_string(),
        };
        self.depth -= 1;
        sink.end_tag(&name).map_err(FeedError::Aborted)?;
        Ok(Step::Consumed(close + 1))
    }

    fn scan_start_tag<S: TokenSink>(&mut self, buf: &str, pos: usize, sink: &mut S) -> StepResult<S::Error> {
        let bytes = buf.as_bytes();
        let mut scanner = Scanner::new(bytes, pos + 1);
        let Some(close) = scanner.find_tag_end_quoted() else {
            return Ok(Step::Incomplete(ErrorCode::UnclosedToken));
        };
        if self.depth == 0 && self.seen_root {
            return Err(FeedError::Syntax(ErrorCode::JunkAfterDocElement));
        }

        let name_start = scanner.position();
        scanner
            .read_name()
            .ok_or(FeedError::Syntax(ErrorCode::InvalidToken))?;
        let name = &buf[name_start..scanner.position()];

        let mut raw_attrs: Vec<(&str, String)> = Vec::new();
        let is_empty = loop {
            let separated = scanner.skip_whitespace() > 0;
            match scanner.peek() {
                Some(b'>') if scanner.position() == close => break false,
                Some(b'/') if scanner.position() + 1 == close => break true,
                Some(c) if is_name_start_char(c) && separated => {
                    let attr = scan_attribute(&mut scanner, buf).map_err(FeedError::Syntax)?;
                    if raw_attrs.iter().any(|(existing, _)| *existing == attr.0) {
                        return Err(FeedError::Syntax(ErrorCode::DuplicateAttribute));
                    }
                    raw_attrs.push(attr);
                }
                _ => return Err(FeedError::Syntax(ErrorCode::InvalidToken)),
            }
        };

        let (name, attributes) = match &mut self.namespaces {
            Some(resolver) => expand_start_tag(resolver, name, raw_attrs).map_err(FeedError::Syntax)?,
            None => (
                name.to_string(),
                raw_attrs
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect(),
            ),
        };

        self.seen_root = true;
        self.depth += 1;
        sink.start_tag(&name, &attributes).map_err(FeedError::Aborted)?;

        if is_empty {
            if let Some(resolver) = &mut self.namespaces {
                resolver.pop_scope();
            }
            self.depth -= 1;
            sink.end_tag(&name).map_err(FeedError::Aborted)?;
        }
        Ok(Step::Consumed(close + 1))
    }

    /// Scan an `&...;` reference in content
    fn scan_reference<S: TokenSink>(&mut self, buf: &str, pos: usize, sink: &mut S) -> StepResult<S::Error> {
        if self.depth == 0 {
            return Err(FeedError::Syntax(self.outside_root_error()));
        }
        let bytes = buf.as_bytes();
        let body_end = bytes[pos + 1..]
            .iter()
            .position(|&b| !(is_name_char(b) || b == b'#'))
            .map(|i| pos + 1 + i);

        let semi = match body_end {
            None => return Ok(Step::Incomplete(ErrorCode::UnclosedToken)),
            Some(i) if bytes[i] == b';' => i,
            Some(_) => return Err(FeedError::Syntax(ErrorCode::InvalidToken)),
        };

        match parse_reference(&buf[pos + 1..semi]).map_err(FeedError::Syntax)? {
            Reference::Char(c) => {
                let mut utf8 = [0u8; 4];
                sink.character_data(c.encode_utf8(&mut utf8))
                    .map_err(FeedError::Aborted)?;
            }
            Reference::Predefined(text) => sink.character_data(text).map_err(FeedError::Aborted)?,
            Reference::Named(_) => sink
                .default_data(&buf[pos..semi + 1])
                .map_err(FeedError::Aborted)?,
        }
        Ok(Step::Consumed(semi + 1))
    }

    /// Scan a run of plain text up to the next `<` or `&`
    fn scan_text<S: TokenSink>(
        &mut self,
        buf: &str,
        pos: usize,
        is_final: bool,
        sink: &mut S,
    ) -> StepResult<S::Error> {
        let scanner = Scanner::new(buf.as_bytes(), pos);
        let end = match scanner.find_text_boundary() {
            Some(end) => end,
            // The run may continue in the next chunk
            None if !is_final => return Ok(Step::Incomplete(ErrorCode::UnclosedToken)),
            None => buf.len(),
        };
        let run = &buf[pos..end];

        if self.depth == 0 {
            if !run.bytes().all(is_whitespace) {
                return Err(FeedError::Syntax(self.outside_root_error()));
            }
            sink.default_data(run).map_err(FeedError::Aborted)?;
            return Ok(Step::Consumed(end));
        }

        if run.contains("]]>") {
            return Err(FeedError::Syntax(ErrorCode::InvalidToken));
        }
        sink.character_data(&normalize_newlines(run))
            .map_err(FeedError::Aborted)?;
        Ok(Step::Consumed(end))
    }

    fn outside_root_error(&self) -> ErrorCode {
        if self.seen_root {
            ErrorCode::JunkAfterDocElement
        } else {
            ErrorCode::Syntax
        }
    }
}

/// Scan `name = "value"`, returning the raw name and decoded value
fn scan_attribute<'a>(scanner: &mut Scanner<'_>, buf: &'a str) -> Result<(&'a str, String), ErrorCode> {
    let name_start = scanner.position();
    scanner.read_name().ok_or(ErrorCode::InvalidToken)?;
    let name = &buf[name_start..scanner.position()];

    scanner.skip_whitespace();
    if scanner.peek() != Some(b'=') {
        return Err(ErrorCode::InvalidToken);
    }
    scanner.advance(1);
    scanner.skip_whitespace();

    let quote = scanner.peek().ok_or(ErrorCode::InvalidToken)?;
    if quote != b'"' && quote != b'\'' {
        return Err(ErrorCode::InvalidToken);
    }
    scanner.advance(1);
    let value_start = scanner.position();
    let value_end = scanner.find_byte(quote).ok_or(ErrorCode::InvalidToken)?;
    scanner.set_position(value_end + 1);

    let value = decode_attribute_value(&buf[value_start..value_end])?;
    Ok((name, value.into_owned()))
}

/// Apply namespace declarations and expand the element and attribute names
fn expand_start_tag(
    resolver: &mut NamespaceResolver,
    name: &str,
    raw_attrs: Vec<(&str, String)>,
) -> Result<(String, Vec<(String, String)>), ErrorCode> {
    resolver.push_scope();
    for (key, value) in &raw_attrs {
        if let Some(prefix) = declared_prefix(key) {
            resolver.declare(prefix, value)?;
        }
    }

    let name = resolver.expand_element(name)?;
    let mut attributes: Vec<(String, String)> = Vec::with_capacity(raw_attrs.len());
    for (key, value) in raw_attrs {
        if declared_prefix(key).is_some() {
            continue;
        }
        let key = resolver.expand_attribute(key)?;
        if attributes.iter().any(|(existing, _)| *existing == key) {
            return Err(ErrorCode::DuplicateAttribute);
        }
        attributes.push((key, value));
    }
    Ok((name, attributes))
}

/// Find the closing '>' of a DOCTYPE, skipping quoted literals and the internal subset
fn find_doctype_end(input: &[u8], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;

    for (i, &b) in input.iter().enumerate().skip(from) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'[') => depth += 1,
            (None, b']') => depth = depth.saturating_sub(1),
            (None, b'>') if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}
