//! Character repertoire checks shared by both renderers.
//!
//! * PDF output uses the base-14 Type 1 fonts with `WinAnsiEncoding`
//!   (Windows-1252). A character outside that code page has no byte.
//! * DOCX output is XML 1.0, which cannot carry most C0 control characters
//!   or the non-characters U+FFFE / U+FFFF, even escaped.
//!
//! What happens to a character that does not fit is decided by
//! [`EncodingPolicy`]; [`CharGuard`] applies it and counts substitutions.

use crate::config::{EncodingPolicy, OutputFormat};
use crate::error::RenderError;

/// Byte substituted for a character WinAnsiEncoding cannot represent.
pub const PDF_REPLACEMENT: u8 = b'?';

/// Windows-1252 bytes 0x80–0x9F that map to code points above U+00FF.
const WINANSI_HIGH: [(char, u8); 27] = [
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

/// WinAnsiEncoding byte for a printable character, if it has one.
///
/// Control characters (including tab and newline) return `None`; layout
/// handles line structure before text reaches the encoder.
pub fn winansi_byte(ch: char) -> Option<u8> {
    match ch {
        ' '..='~' | '\u{A0}'..='\u{FF}' => Some(ch as u8),
        _ => WINANSI_HIGH
            .iter()
            .find(|(c, _)| *c == ch)
            .map(|(_, b)| *b),
    }
}

/// Whether XML 1.0 allows `ch` in character data.
pub fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r')
        || (ch >= '\u{20}' && ch != '\u{FFFE}' && ch != '\u{FFFF}')
}

/// Applies an [`EncodingPolicy`] to characters a format rejects.
#[derive(Debug)]
pub struct CharGuard {
    format: OutputFormat,
    policy: EncodingPolicy,
    replaced: usize,
}

impl CharGuard {
    pub fn new(format: OutputFormat, policy: EncodingPolicy) -> Self {
        Self {
            format,
            policy,
            replaced: 0,
        }
    }

    /// Record an unsupported character. `Ok(())` means the caller should
    /// substitute (or drop) it and carry on.
    pub fn reject(&mut self, ch: char, segment: usize) -> Result<(), RenderError> {
        match self.policy {
            EncodingPolicy::Strict => Err(RenderError::Unencodable {
                format: self.format,
                ch,
                segment,
            }),
            EncodingPolicy::Replace => {
                self.replaced += 1;
                Ok(())
            }
        }
    }

    /// Number of characters substituted so far.
    pub fn replaced(&self) -> usize {
        self.replaced
    }
}
