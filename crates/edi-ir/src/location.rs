//! Source locations and located values
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in the decoded source stream
///
/// `offset` counts decoded characters after any byte-order mark; `line` and
/// `column` are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Character offset from the start of the decoded stream
    pub offset: usize,

    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

impl Location {
    /// Create a new location
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// The location of the first character of a stream
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A decoded string together with the span it was read from
///
/// `begin` is the location of the first consumed character and `end` the
/// location of the last one. Empty values carry the location of the delimiter
/// that closed them in both fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedValue {
    /// Decoded text with release characters resolved
    pub value: String,

    /// Location of the first character
    pub begin: Location,

    /// Location of the last character
    pub end: Location,
}

impl LocatedValue {
    /// Create a located value
    pub fn new(value: impl Into<String>, begin: Location, end: Location) -> Self {
        Self {
            value: value.into(),
            begin,
            end,
        }
    }

    /// An empty value anchored at a single location
    pub fn empty_at(at: Location) -> Self {
        Self::new(String::new(), at, at)
    }

    /// Borrow the text
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whether the text is empty
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for LocatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
