//! HTTP headers abstraction for [`Request`](crate::http::request::Request)
//! and the [`ResponseWriter`](crate::http::response::ResponseWriter).
//!
//! Field names are always stored lowercase, so every lookup is
//! case-insensitive. A name that occurs more than once keeps a single
//! entry: successive values are joined with one space (`"a b"`, not
//! `"a, b"`).
//!
//! [`Headers::parse`] consumes raw header lines incrementally. It can be
//! called again and again as bytes arrive, as long as the caller drops the
//! prefix reported as consumed.
//!
//! Serialization ([`Headers::stringify`]) emits entries sorted by name so the
//! wire output is deterministic.

use indexmap::IndexMap;
use thiserror::Error;

const CRLF: &[u8] = b"\r\n";
const WHITESPACE: &[u8] = b" \t";
const SPECIAL_CHARS: &[u8] = b"!#$%&'*+-.^_`|~";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("whitespace before colon in header field name")]
    InvalidFieldValue,

    #[error("invalid character in header field name {0:?}")]
    InvalidFieldName(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: IndexMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self {
            headers: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Replaces any existing value for `name`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.headers.shift_remove(&name.to_ascii_lowercase())
    }

    /// Adds a value, merging with an existing entry using a single space.
    pub fn append(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        match self.headers.get_mut(&key) {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(value);
            }
            None => {
                self.headers.insert(key, value.to_string());
            }
        }
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Serializes every entry as `name: value\r\n`, sorted by name.
    /// The terminating blank line is left to the caller.
    pub fn stringify(&self) -> String {
        let mut entries: Vec<(&String, &String)> = self.headers.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut result = String::new();
        for (name, value) in entries {
            result.push_str(name);
            result.push_str(": ");
            result.push_str(value);
            result.push_str("\r\n");
        }
        result
    }

    /// Parses as many complete header lines from `data` as possible.
    ///
    /// Returns the number of bytes consumed and whether the blank line ending
    /// the header section was reached. `(0, false)` means no complete line is
    /// available yet. Lines without a colon are skipped.
    pub fn parse(&mut self, data: &[u8]) -> Result<(usize, bool), HeaderError> {
        let mut read = 0;

        loop {
            let rest = &data[read..];
            let Some(line_end) = find_crlf(rest) else {
                return Ok((read, false));
            };

            // Blank line: end of the header section
            if line_end == 0 {
                return Ok((read + CRLF.len(), true));
            }

            if let Some((name, value)) = parse_header_line(&rest[..line_end])? {
                self.append(&name, &value);
            }

            read += line_end + CRLF.len();
        }
    }
}

pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF)
}

fn parse_header_line(line: &[u8]) -> Result<Option<(String, String)>, HeaderError> {
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        return Ok(None);
    };
    let (name, value) = (&line[..colon], &line[colon + 1..]);

    if name.iter().any(|b| WHITESPACE.contains(b)) {
        return Err(HeaderError::InvalidFieldValue);
    }

    // ": value" has no name at all and is rejected like any other bad name
    if name.is_empty() || !name.iter().all(|&b| is_token_char(b)) {
        return Err(HeaderError::InvalidFieldName(
            String::from_utf8_lossy(name).into_owned(),
        ));
    }

    let name = String::from_utf8_lossy(name).into_owned();
    let value = String::from_utf8_lossy(trim_whitespace(value)).into_owned();
    Ok(Some((name, value)))
}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || SPECIAL_CHARS.contains(&b)
}

fn trim_whitespace(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !WHITESPACE.contains(first) {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !WHITESPACE.contains(last) {
            break;
        }
        bytes = rest;
    }
    bytes
}
