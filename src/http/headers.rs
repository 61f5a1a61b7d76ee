//! Header field storage and the header-line grammar.
//!
//! A [`Headers`] value holds the fields of one message, keyed by lower-cased
//! field-name. Repeated field-names are folded into a single value joined by
//! `", "` in the order they were seen.

use std::collections::HashMap;
use std::collections::hash_map;

use thiserror::Error;

const CRLF: &[u8] = b"\r\n";

/// Errors raised while parsing a single header line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The line has no `:` separator.
    #[error("invalid header format")]
    InvalidFormat,
    /// Whitespace sits between the field-name and the colon (`Host : x`).
    #[error("invalid header key format: whitespace before colon")]
    WhitespaceBeforeColon,
    /// The field-name is empty or contains a non-token character.
    #[error("invalid header key: {0:?}")]
    InvalidKey(String),
}

/// Header fields of one HTTP message.
///
/// Keys are always stored lower-case. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses at most one header line from the front of `data`.
    ///
    /// Returns `(bytes_consumed, done)`:
    ///
    /// - `(0, false)` when no CRLF is buffered yet; feed more bytes and retry.
    /// - `(2, true)` when `data` starts with the empty line closing the header section.
    /// - `(line_len + 2, false)` after storing one field.
    ///
    /// # Example
    ///
    /// ```
    /// # use rawhttp::http::headers::Headers;
    /// let mut headers = Headers::new();
    /// let (n, done) = headers.parse(b"Host: localhost:42069\r\n\r\n").unwrap();
    /// assert_eq!(n, 23);
    /// assert!(!done);
    /// assert_eq!(headers.get("host"), Some("localhost:42069"));
    /// ```
    pub fn parse(&mut self, data: &[u8]) -> Result<(usize, bool), HeaderError> {
        let Some(line_end) = find_crlf(data) else {
            return Ok((0, false));
        };

        if line_end == 0 {
            return Ok((CRLF.len(), true));
        }

        self.parse_line(&data[..line_end])?;
        Ok((line_end + CRLF.len(), false))
    }

    fn parse_line(&mut self, line: &[u8]) -> Result<(), HeaderError> {
        let line = line.trim_ascii_spaces();

        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(HeaderError::InvalidFormat)?;
        let (key, value) = (&line[..colon], &line[colon + 1..]);

        if key.ends_with(b" ") {
            return Err(HeaderError::WhitespaceBeforeColon);
        }

        if key.is_empty() || !key.iter().all(|&b| is_token_char(b)) {
            return Err(HeaderError::InvalidKey(
                String::from_utf8_lossy(key).into_owned(),
            ));
        }

        // Token characters are ASCII, so the key is valid UTF-8.
        let key = String::from_utf8_lossy(key);
        let value = String::from_utf8_lossy(value.trim_ascii_spaces());

        self.set(&key, &value);
        Ok(())
    }

    /// Stores a field, appending to an existing value with `", "`.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.entry(name.to_ascii_lowercase()) {
            hash_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.push_str(", ");
                existing.push_str(value);
            }
            hash_map::Entry::Vacant(entry) => {
                entry.insert(value.to_string());
            }
        }
    }

    /// Stores a field, overwriting any existing value.
    pub fn replace(&mut self, name: &str, value: &str) {
        self.fields
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    /// Removes a field, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(&name.to_ascii_lowercase())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    /// Iterates `(lower-case name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// `tchar` from RFC 9110: letters, digits and ``!#$%&'*+-.^_`|~``.
pub fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

trait TrimSpaces {
    fn trim_ascii_spaces(&self) -> &Self;
}

impl TrimSpaces for [u8] {
    /// Trims only `' '`, leaving tabs and other whitespace in place.
    fn trim_ascii_spaces(&self) -> &[u8] {
        let start = self.iter().position(|&b| b != b' ').unwrap_or(self.len());
        let end = self.iter().rposition(|&b| b != b' ').map_or(start, |i| i + 1);
        &self[start..end]
    }
}
