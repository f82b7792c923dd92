//! Parser for the sectioned key/value measurement payload.
//!
//! ```text
//! ; produced by the field unit
//! [MESURES]
//! T1=25
//! [CRC]
//! T1=156
//! ```
//!
//! Lines are trimmed, blank lines and lines starting with `#` or `;` are
//! comments, `[NAME]` switches the current section and everything else is a
//! `key<sep>value` pair split on `=` or `:`. Values are kept verbatim (no
//! trimming, no unquoting) because checksums are computed over the raw text.

use crate::error::{Result, SealwatchError};
use std::collections::HashMap;
use std::io::BufRead;

const COMMENT_CHARS: &[char] = &['#', ';'];
const SEPARATOR_CHARS: &[char] = &['=', ':'];
const QUOTE_CHARS: &[char] = &['"', '\''];

/// Section names routed into a [`MeasurementSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionNames {
    pub measurements: &'static str,
    pub checksums: &'static str,
}

impl Default for SectionNames {
    fn default() -> Self {
        Self {
            measurements: "MESURES",
            checksums: "CRC",
        }
    }
}

/// Measured values and their declared checksums, keyed by token.
///
/// Keys iterate in order of first appearance in the measurements section;
/// a repeated key keeps its original position but takes the latest value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementSet {
    order: Vec<String>,
    measurements: HashMap<String, String>,
    checksums: HashMap<String, String>,
}

impl MeasurementSet {
    /// Parse a payload from any buffered reader.
    ///
    /// # Errors
    ///
    /// Returns [`SealwatchError::Load`] if the reader fails mid-stream.
    pub fn load<R: BufRead>(mut reader: R, sections: SectionNames) -> Result<Self> {
        let mut set = Self::default();
        let mut current_section: Option<String> = None;
        let mut chunk = Vec::new();

        loop {
            chunk.clear();
            let read = reader
                .read_until(b'\n', &mut chunk)
                .map_err(|e| SealwatchError::Load(e.to_string()))?;
            if read == 0 {
                break;
            }

            let text = std::str::from_utf8(&chunk)
                .map_err(|e| SealwatchError::Load(format!("Payload is not valid UTF-8: {e}")))?;
            // A line ends at `\n`, `\r\n` or a lone `\r`.
            for line in text.strip_suffix('\n').unwrap_or(text).split('\r') {
                set.feed_line(line, &mut current_section, sections);
            }
        }

        Ok(set)
    }

    fn feed_line(&mut self, line: &str, current_section: &mut Option<String>, sections: SectionNames) {
        let line = trim_control(line);

        if is_comment_line(line) {
            return;
        }

        if let Some(section) = section_name(line) {
            *current_section = Some(section.to_owned());
            return;
        }

        let (key, value) = split_entry(line);
        match current_section.as_deref() {
            Some(s) if s == sections.measurements => self.insert_measurement(key, value),
            Some(s) if s == sections.checksums => {
                self.checksums.insert(key, value);
            }
            // Entries outside the two known sections carry no meaning.
            _ => {}
        }
    }

    /// Parse a payload that is already decoded into a string.
    ///
    /// # Errors
    ///
    /// Never fails for in-memory text; the signature mirrors [`Self::load`].
    pub fn parse(text: &str, sections: SectionNames) -> Result<Self> {
        Self::load(text.as_bytes(), sections)
    }

    fn insert_measurement(&mut self, key: String, value: String) {
        if !self.measurements.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.measurements.insert(key, value);
    }

    /// Raw measured value for `key`.
    pub fn measurement(&self, key: &str) -> Option<&str> {
        self.measurements.get(key).map(String::as_str)
    }

    /// Declared checksum for `key`.
    pub fn declared_checksum(&self, key: &str) -> Option<&str> {
        self.checksums.get(key).map(String::as_str)
    }

    /// Measurement keys in first-appearance order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of distinct measurement keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of distinct checksum keys.
    pub fn checksum_count(&self) -> usize {
        self.checksums.len()
    }
}

/// Strip leading/trailing control characters and spaces (`<= U+0020`).
fn trim_control(s: &str) -> &str {
    s.trim_matches(|c: char| c <= ' ')
}

fn is_comment_line(line: &str) -> bool {
    line.chars()
        .next()
        .is_none_or(|first| COMMENT_CHARS.contains(&first))
}

fn section_name(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']')
}

fn split_entry(line: &str) -> (String, String) {
    let (key, value) = match find_separator(line) {
        Some(index) => {
            let (key, rest) = line.split_at(index);
            // Separators are single-byte ASCII characters.
            (key, rest.get(1..).unwrap_or_default())
        }
        None => (line, ""),
    };

    let key = trim_control(key);
    let key = if key.is_empty() { " " } else { key };
    (key.to_owned(), value.to_owned())
}

/// Byte index of the separator that splits key from value.
///
/// A separator directly in front of the first quote (ignoring whitespace)
/// wins over earlier separators; otherwise the first separator wins.
fn find_separator(line: &str) -> Option<usize> {
    line.find(QUOTE_CHARS)
        .and_then(|quote| separator_before_quote(line, quote))
        .or_else(|| line.find(SEPARATOR_CHARS))
}

fn separator_before_quote(line: &str, quote: usize) -> Option<usize> {
    let before = line.get(..quote)?;
    let (index, ch) = before.char_indices().rev().find(|(_, c)| !c.is_whitespace())?;
    SEPARATOR_CHARS.contains(&ch).then_some(index)
}
