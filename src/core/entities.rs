//! XML Entity Decoding
//!
//! Handles the references the tokenizer resolves on its own:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Any other named reference is left for the session's entity table.

use memchr::{memchr, memchr3};
use std::borrow::Cow;

use super::scanner::{is_name_char, is_name_start_char};
use super::tokenizer::ErrorCode;

/// A classified `&...;` reference (body without `&` and `;`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    /// Numeric character reference
    Char(char),
    /// One of the five predefined entities
    Predefined(&'static str),
    /// Any other entity name
    Named(&'a str),
}

/// Classify the body of a reference
pub fn parse_reference(body: &str) -> Result<Reference<'_>, ErrorCode> {
    if let Some(digits) = body.strip_prefix('#') {
        return decode_numeric_entity(digits).map(Reference::Char);
    }
    if !is_xml_name(body) {
        return Err(ErrorCode::InvalidToken);
    }
    Ok(match predefined(body) {
        Some(text) => Reference::Predefined(text),
        None => Reference::Named(body),
    })
}

fn predefined(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        _ => None,
    }
}

/// Decode a numeric character reference (digits after `&#`)
fn decode_numeric_entity(entity: &str) -> Result<char, ErrorCode> {
    let codepoint = match entity.strip_prefix('x') {
        // Hexadecimal: &#xHHHH;
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            u32::from_str_radix(hex, 16).map_err(|_| ErrorCode::BadCharRef)?
        }
        // Decimal: &#DDDD;
        None if !entity.is_empty() && entity.bytes().all(|b| b.is_ascii_digit()) => {
            entity.parse::<u32>().map_err(|_| ErrorCode::BadCharRef)?
        }
        _ => return Err(ErrorCode::InvalidToken),
    };

    if !is_valid_xml_char(codepoint) {
        return Err(ErrorCode::BadCharRef);
    }
    char::from_u32(codepoint).ok_or(ErrorCode::BadCharRef)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

pub fn is_xml_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(&first) => is_name_start_char(first) && bytes[1..].iter().all(|&b| is_name_char(b)),
        None => false,
    }
}

/// Normalize line endings: `\r\n` and lone `\r` become `\n`
pub fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if memchr(b'\r', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Decode an attribute value (without quotes)
///
/// Resolves built-in and character references, rejects `<`, and replaces
/// literal whitespace with spaces. Named entities are not available inside
/// attribute values.
pub fn decode_attribute_value(raw: &str) -> Result<Cow<'_, str>, ErrorCode> {
    let bytes = raw.as_bytes();
    // Fast path: nothing to decode or normalize
    if memchr3(b'&', b'<', b'\r', bytes).is_none() && !bytes.iter().any(|&b| b == b'\n' || b == b'\t') {
        return Ok(Cow::Borrowed(raw));
    }

    let normalized = normalize_newlines(raw);
    let mut result = String::with_capacity(normalized.len());
    let mut rest: &str = &normalized;

    while let Some(c) = rest.chars().next() {
        match c {
            '<' => return Err(ErrorCode::InvalidToken),
            '&' => {
                let semi = memchr(b';', rest.as_bytes()).ok_or(ErrorCode::InvalidToken)?;
                match parse_reference(&rest[1..semi])? {
                    Reference::Char(ch) => result.push(ch),
                    Reference::Predefined(text) => result.push_str(text),
                    Reference::Named(_) => return Err(ErrorCode::UndefinedEntity),
                }
                rest = &rest[semi + 1..];
                continue;
            }
            '\n' | '\t' => result.push(' '),
            _ => result.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }

    Ok(Cow::Owned(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_entities() {
        assert_eq!(parse_reference("lt"), Ok(Reference::Predefined("<")));
        assert_eq!(parse_reference("amp"), Ok(Reference::Predefined("&")));
    }

    #[test]
    fn test_numeric_decimal_and_hex() {
        assert_eq!(parse_reference("#65"), Ok(Reference::Char('A')));
        assert_eq!(parse_reference("#x41"), Ok(Reference::Char('A')));
        assert_eq!(parse_reference("#x1F600"), Ok(Reference::Char('😀')));
    }

    #[test]
    fn test_invalid_char_ref() {
        assert_eq!(parse_reference("#0"), Err(ErrorCode::BadCharRef));
        assert_eq!(parse_reference("#xD800"), Err(ErrorCode::BadCharRef));
        assert_eq!(parse_reference("#X41"), Err(ErrorCode::InvalidToken));
        assert_eq!(parse_reference("#"), Err(ErrorCode::InvalidToken));
    }

    #[test]
    fn test_unknown_entity_is_named() {
        assert_eq!(parse_reference("nbsp"), Ok(Reference::Named("nbsp")));
        assert_eq!(parse_reference("1bad"), Err(ErrorCode::InvalidToken));
    }

    #[test]
    fn test_attribute_value_plain_is_borrowed() {
        let value = decode_attribute_value("plain value").unwrap();
        assert!(matches!(value, Cow::Borrowed(_)));
    }

    #[test]
    fn test_attribute_value_decoding() {
        let value = decode_attribute_value("a&lt;b &#x26; c\r\nd\te").unwrap();
        assert_eq!(value, "a<b & c d e");
    }

    #[test]
    fn test_attribute_value_char_ref_newline_kept() {
        assert_eq!(decode_attribute_value("a&#10;b").unwrap(), "a\nb");
    }

    #[test]
    fn test_attribute_value_errors() {
        assert_eq!(decode_attribute_value("a<b"), Err(ErrorCode::InvalidToken));
        assert_eq!(decode_attribute_value("a&b"), Err(ErrorCode::InvalidToken));
        assert_eq!(decode_attribute_value("&custom;"), Err(ErrorCode::UndefinedEntity));
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\rc"), "a\nb\nc");
        assert!(matches!(normalize_newlines("a\nb"), Cow::Borrowed(_)));
    }
}
