//! XML Encoding Detection and Conversion
//!
//! Handles detection of UTF-16 and other encodings based on BOM and the
//! encoding name a session was configured with. Input arrives in chunks, so
//! conversion is incremental: incomplete byte sequences at the end of a
//! chunk are carried over to the next one.

use super::entities::is_valid_xml_char;
use super::tokenizer::ErrorCode;

/// Detect the encoding of XML input based on BOM or byte patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // No BOM - check for UTF-16 pattern (< followed by null or null followed by <)
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }

    /// Look up an encoding by its (case-insensitive) name
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => Some(XmlEncoding::Utf8),
            // Plain "UTF-16" is refined by the BOM once input arrives
            "utf-16" | "utf16" | "utf-16le" => Some(XmlEncoding::Utf16Le),
            "utf-16be" => Some(XmlEncoding::Utf16Be),
            "iso-8859-1" | "latin1" | "latin-1" => Some(XmlEncoding::Latin1),
            _ => None,
        }
    }

    fn is_utf16(self) -> bool {
        matches!(self, XmlEncoding::Utf16Le | XmlEncoding::Utf16Be)
    }
}

/// Incremental converter from the input encoding to UTF-8
#[derive(Debug)]
pub struct Decoder {
    encoding: Option<XmlEncoding>,
    /// Bytes of an incomplete sequence left over from the previous chunk
    carry: Vec<u8>,
    started: bool,
}

impl Decoder {
    /// Create a decoder; `None` detects the encoding from the first bytes
    pub fn new(encoding: Option<XmlEncoding>) -> Self {
        Decoder {
            encoding,
            carry: Vec::new(),
            started: false,
        }
    }

    /// The encoding in effect, once known
    pub fn encoding(&self) -> Option<XmlEncoding> {
        self.encoding
    }

    /// Convert `chunk` and append the result to `out`
    pub fn decode(&mut self, chunk: &[u8], is_final: bool, out: &mut String) -> Result<(), ErrorCode> {
        self.carry.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.carry);
        let mut start = 0;

        if !self.started {
            // A UTF-8 BOM is three bytes long
            if bytes.len() < 3 && !is_final {
                self.carry = bytes;
                return Ok(());
            }
            let detected = XmlEncoding::detect(&bytes);
            let encoding = match self.encoding {
                None => detected,
                Some(declared) if declared.is_utf16() && detected.is_utf16() => detected,
                Some(declared) => declared,
            };
            start = bom_len(&bytes, encoding);
            self.encoding = Some(encoding);
            self.started = true;
        }

        let mark = out.len();
        match self.encoding.unwrap_or(XmlEncoding::Utf8) {
            XmlEncoding::Utf8 => self.decode_utf8(&bytes[start..], is_final, out)?,
            XmlEncoding::Latin1 => out.extend(bytes[start..].iter().map(|&b| b as char)),
            XmlEncoding::Utf16Le => self.decode_utf16(&bytes[start..], is_final, out, u16::from_le_bytes)?,
            XmlEncoding::Utf16Be => self.decode_utf16(&bytes[start..], is_final, out, u16::from_be_bytes)?,
        }

        if out[mark..].chars().any(|c| !is_valid_xml_char(c as u32)) {
            return Err(ErrorCode::InvalidToken);
        }
        Ok(())
    }

    fn decode_utf8(&mut self, bytes: &[u8], is_final: bool, out: &mut String) -> Result<(), ErrorCode> {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                out.push_str(text);
                Ok(())
            }
            Err(e) => {
                let valid = e.valid_up_to();
                // valid_up_to guarantees this prefix is well-formed
                out.push_str(std::str::from_utf8(&bytes[..valid]).map_err(|_| ErrorCode::InvalidToken)?);
                match e.error_len() {
                    Some(_) => Err(ErrorCode::InvalidToken),
                    None if is_final => Err(ErrorCode::PartialChar),
                    None => {
                        self.carry = bytes[valid..].to_vec();
                        Ok(())
                    }
                }
            }
        }
    }

    fn decode_utf16(
        &mut self,
        bytes: &[u8],
        is_final: bool,
        out: &mut String,
        unit: fn([u8; 2]) -> u16,
    ) -> Result<(), ErrorCode> {
        let mut units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|chunk| unit([chunk[0], chunk[1]]))
            .collect();
        let mut keep = bytes.len() % 2;

        // A high surrogate at the end waits for its partner
        if let Some(&last) = units.last() {
            if (0xD800..0xDC00).contains(&last) && !is_final {
                units.pop();
                keep += 2;
            }
        }
        if keep > 0 {
            if is_final {
                return Err(ErrorCode::PartialChar);
            }
            self.carry = bytes[bytes.len() - keep..].to_vec();
        }

        for c in char::decode_utf16(units) {
            out.push(c.map_err(|_| ErrorCode::InvalidToken)?);
        }
        Ok(())
    }
}

fn bom_len(input: &[u8], encoding: XmlEncoding) -> usize {
    match encoding {
        XmlEncoding::Utf8 if input.starts_with(&[0xEF, 0xBB, 0xBF]) => 3,
        XmlEncoding::Utf16Le if input.starts_with(&[0xFF, 0xFE]) => 2,
        XmlEncoding::Utf16Be if input.starts_with(&[0xFE, 0xFF]) => 2,
        _ => 0,
    }
}
