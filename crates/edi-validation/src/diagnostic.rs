//! Typed, located, templated parse diagnostics
//!
//! A [`ParseError`] records a diagnostic kind plus the locations and data
//! items it refers to. The human-readable message is rendered lazily from a
//! template looked up in a [`MessageCatalog`]. Templates reference recorded
//! values with placeholders:
//!
//! | Placeholder     | Resolves to                       |
//! |-----------------|-----------------------------------|
//! | `{L<n>.line}`   | line of the n-th location         |
//! | `{L<n>.column}` | column of the n-th location       |
//! | `{L<n>.offset}` | character offset of the n-th one  |
//! | `{D<n>}`        | the n-th data item                |

use edi_ir::Location;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Severity of a diagnostic
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// Annotation that does not affect correctness
    Info,
    /// Non-blocking schema notice
    Warning,
    /// Structural or schema violation; parsing continues
    Error,
    /// Unrecoverable; the parse is aborted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        })
    }
}

/// Diagnostic keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    UnknownEncoding,
    UnsupportedEncoding,
    MalformedInput,
    TruncatedServiceStringAdvice,
    TruncatedHeader,
    UnknownSyntaxLevel,
    UnknownSyntaxVersion,
    UnterminatedSegment,
    InvalidNestingIndicator,
    InvalidCharacter,
    EmptySegmentTag,
    UnexpectedSegment,
    MissingSegment,
    MessageIdMismatch,
    FgIdMismatch,
    InterchangeIdMismatch,
    NumberOfSegmentsMismatch,
    NumberOfMessagesMismatch,
    UnknownSegment,
    UnknownKey,
    ExpectedElementNotFound,
    ExpectedSubElementNotFound,
    IncompleteSegment,
    IncompleteElement,
    ExtraElementFound,
    ExtraSubElementFound,
    SchemaWarning,
    NonSignificantRelease,
}

impl ErrorKind {
    /// Stable key name, e.g. `MESSAGE_ID_MISMATCH`
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::UnknownEncoding => "UNKNOWN_ENCODING",
            ErrorKind::UnsupportedEncoding => "UNSUPPORTED_ENCODING",
            ErrorKind::MalformedInput => "MALFORMED_INPUT",
            ErrorKind::TruncatedServiceStringAdvice => "TRUNCATED_SERVICE_STRING_ADVICE",
            ErrorKind::TruncatedHeader => "TRUNCATED_HEADER",
            ErrorKind::UnknownSyntaxLevel => "UNKNOWN_SYNTAX_LEVEL",
            ErrorKind::UnknownSyntaxVersion => "UNKNOWN_SYNTAX_VERSION",
            ErrorKind::UnterminatedSegment => "UNTERMINATED_SEGMENT",
            ErrorKind::InvalidNestingIndicator => "INVALID_NESTING_INDICATOR",
            ErrorKind::InvalidCharacter => "INVALID_CHARACTER",
            ErrorKind::EmptySegmentTag => "EMPTY_SEGMENT_TAG",
            ErrorKind::UnexpectedSegment => "UNEXPECTED_SEGMENT",
            ErrorKind::MissingSegment => "MISSING_SEGMENT",
            ErrorKind::MessageIdMismatch => "MESSAGE_ID_MISMATCH",
            ErrorKind::FgIdMismatch => "FG_ID_MISMATCH",
            ErrorKind::InterchangeIdMismatch => "INTERCHANGE_ID_MISMATCH",
            ErrorKind::NumberOfSegmentsMismatch => "NUMBER_OF_SEGMENTS_MISMATCH",
            ErrorKind::NumberOfMessagesMismatch => "NUMBER_OF_MESSAGES_MISMATCH",
            ErrorKind::UnknownSegment => "UNKNOWN_SEGMENT",
            ErrorKind::UnknownKey => "UNKNOWN_KEY",
            ErrorKind::ExpectedElementNotFound => "EXPECTED_ELEMENT_NOT_FOUND",
            ErrorKind::ExpectedSubElementNotFound => "EXPECTED_SUB_ELEMENT_NOT_FOUND",
            ErrorKind::IncompleteSegment => "INCOMPLETE_SEGMENT",
            ErrorKind::IncompleteElement => "INCOMPLETE_ELEMENT",
            ErrorKind::ExtraElementFound => "EXTRA_ELEMENT_FOUND",
            ErrorKind::ExtraSubElementFound => "EXTRA_SUB_ELEMENT_FOUND",
            ErrorKind::SchemaWarning => "SCHEMA_WARNING",
            ErrorKind::NonSignificantRelease => "NON_SIGNIFICANT_RELEASE",
        }
    }

    /// Severity a diagnostic of this kind is recorded with
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            ErrorKind::UnknownEncoding
            | ErrorKind::UnsupportedEncoding
            | ErrorKind::MalformedInput
            | ErrorKind::TruncatedServiceStringAdvice
            | ErrorKind::TruncatedHeader
            | ErrorKind::UnknownSyntaxLevel
            | ErrorKind::UnknownSyntaxVersion
            | ErrorKind::UnterminatedSegment
            | ErrorKind::InvalidNestingIndicator
            | ErrorKind::InvalidCharacter => Severity::Fatal,
            ErrorKind::SchemaWarning => Severity::Warning,
            ErrorKind::NonSignificantRelease => Severity::Info,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source of message templates
///
/// Passed explicitly to every rendering call, so concurrent parses never
/// share formatting state.
pub trait MessageCatalog {
    /// Template for `kind`, or `None` when the catalog has no entry
    fn template(&self, kind: ErrorKind) -> Option<&str>;
}

/// Built-in English templates
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCatalog;

impl MessageCatalog for DefaultCatalog {
    fn template(&self, kind: ErrorKind) -> Option<&str> {
        Some(match kind {
            ErrorKind::UnknownEncoding => {
                "Unable to determine the character encoding: expected a byte-order mark or an interchange header, found '{D0}'"
            }
            ErrorKind::UnsupportedEncoding => "Character encoding {D0} is not supported",
            ErrorKind::MalformedInput => {
                "Malformed {D0} byte sequence near line {L0.line}, column {L0.column}"
            }
            ErrorKind::TruncatedServiceStringAdvice => {
                "Service string advice is truncated: expected 6 characters after UNA, found {D0}"
            }
            ErrorKind::TruncatedHeader => {
                "Interchange header is truncated before the syntax identifier at line {L0.line}, column {L0.column}"
            }
            ErrorKind::UnknownSyntaxLevel => {
                "Unknown syntax identifier '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::UnknownSyntaxVersion => {
                "Unknown syntax version '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::UnterminatedSegment => {
                "Segment '{D0}' starting at line {L0.line}, column {L0.column} is not terminated before the end of the input"
            }
            ErrorKind::InvalidNestingIndicator => {
                "Invalid explicit nesting indicator '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::InvalidCharacter => {
                "Character {D0} at line {L0.line}, column {L0.column} is not allowed by syntax level {D1}"
            }
            ErrorKind::EmptySegmentTag => {
                "Segment without a tag at line {L0.line}, column {L0.column}"
            }
            ErrorKind::UnexpectedSegment => {
                "Unexpected segment '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::MissingSegment => {
                "Missing segment '{D0}' to close '{D1}' opened at line {L0.line}, column {L0.column}"
            }
            ErrorKind::MessageIdMismatch => {
                "Message reference '{D1}' at line {L1.line}, column {L1.column} does not match '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::FgIdMismatch => {
                "Functional group reference '{D1}' at line {L1.line}, column {L1.column} does not match '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::InterchangeIdMismatch => {
                "Interchange control reference '{D1}' at line {L1.line}, column {L1.column} does not match '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::NumberOfSegmentsMismatch | ErrorKind::NumberOfMessagesMismatch => {
                "Declared count '{D0}' at line {L0.line}, column {L0.column} does not match the number of {D2} ({D1})"
            }
            ErrorKind::UnknownSegment => {
                "Unknown segment '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::UnknownKey => {
                "No schema for message '{D0}' at line {L0.line}, column {L0.column}"
            }
            ErrorKind::ExpectedElementNotFound => {
                "Expected element {D1} of segment '{D0}' after line {L0.line}, column {L0.column}"
            }
            ErrorKind::ExpectedSubElementNotFound => {
                "Expected component {D1} of element {D2} in segment '{D0}' after line {L0.line}, column {L0.column}"
            }
            ErrorKind::IncompleteSegment => {
                "Segment '{D0}' ends at line {L0.line}, column {L0.column} but expects more elements: {D1}"
            }
            ErrorKind::IncompleteElement => {
                "Element {D2} of segment '{D0}' ends at line {L0.line}, column {L0.column} but expects more components: {D1}"
            }
            ErrorKind::ExtraElementFound => {
                "Segment '{D0}' has {D1} unexpected element(s) after line {L0.line}, column {L0.column}"
            }
            ErrorKind::ExtraSubElementFound => {
                "Element {D2} of segment '{D0}' has {D1} unexpected component(s) after line {L0.line}, column {L0.column}"
            }
            ErrorKind::SchemaWarning => {
                "Segment '{D0}' at line {L0.line}, column {L0.column}: {D1}"
            }
            ErrorKind::NonSignificantRelease => {
                "Release character before '{D0}' at line {L0.line}, column {L0.column} is not significant and was kept"
            }
        })
    }
}

impl<S: std::hash::BuildHasher> MessageCatalog for HashMap<ErrorKind, String, S> {
    fn template(&self, kind: ErrorKind) -> Option<&str> {
        self.get(&kind).map(String::as_str)
    }
}

/// A diagnostic recorded during one parse call
///
/// Locations, data, and notes may be appended while the parse runs; each
/// append drops the cached message so the next request renders it again.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{severity} [{kind}]: {}", self.message())]
pub struct ParseError {
    severity: Severity,
    kind: ErrorKind,
    locations: Vec<Location>,
    data: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    notes: Vec<String>,
    #[serde(skip)]
    rendered: OnceLock<String>,
}

impl ParseError {
    /// Create a diagnostic with the kind's default severity
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            severity: kind.default_severity(),
            kind,
            locations: Vec::new(),
            data: Vec::new(),
            notes: Vec::new(),
            rendered: OnceLock::new(),
        }
    }

    /// Override the severity
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Builder form of [`ParseError::push_location`]
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.push_location(location);
        self
    }

    /// Builder form of [`ParseError::push_data`]
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.push_data(data);
        self
    }

    /// Builder form of [`ParseError::push_note`]
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.push_note(note);
        self
    }

    /// Append a location
    pub fn push_location(&mut self, location: Location) -> &mut Self {
        self.locations.push(location);
        self.rendered.take();
        self
    }

    /// Append a data item
    pub fn push_data(&mut self, data: impl Into<String>) -> &mut Self {
        self.data.push(data.into());
        self.rendered.take();
        self
    }

    /// Append a note, rendered as a parenthetical suffix
    pub fn push_note(&mut self, note: impl Into<String>) -> &mut Self {
        self.notes.push(note.into());
        self.rendered.take();
        self
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    #[must_use]
    pub fn data(&self) -> &[String] {
        &self.data
    }

    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// First recorded location, if any
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        self.locations.first().copied()
    }

    /// Message rendered with the [`DefaultCatalog`], cached until the next append
    pub fn message(&self) -> &str {
        self.rendered
            .get_or_init(|| self.render(&DefaultCatalog))
    }

    /// Message rendered with an explicit catalog; not cached
    #[must_use]
    pub fn message_with(&self, catalog: &dyn MessageCatalog) -> String {
        self.render(catalog)
    }

    fn render(&self, catalog: &dyn MessageCatalog) -> String {
        let mut message = match catalog.template(self.kind) {
            Some(template) => Template::compile(template).format(&self.locations, &self.data),
            None => self.kind.name().to_string(),
        };
        if !self.notes.is_empty() {
            message.push_str(" (");
            message.push_str(&self.notes.join("; "));
            message.push(')');
        }
        message
    }
}

impl PartialEq for ParseError {
    fn eq(&self, other: &Self) -> bool {
        self.severity == other.severity
            && self.kind == other.kind
            && self.locations == other.locations
            && self.data == other.data
            && self.notes == other.notes
    }
}

impl Eq for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Placeholder {
    Line(usize),
    Column(usize),
    Offset(usize),
    Data(usize),
}

impl Placeholder {
    fn parse(inner: &str) -> Option<Self> {
        if let Some(index) = inner.strip_prefix('D') {
            return index.parse().ok().map(Placeholder::Data);
        }
        let (index, field) = inner.strip_prefix('L')?.split_once('.')?;
        let index = index.parse().ok()?;
        match field {
            "line" => Some(Placeholder::Line(index)),
            "column" => Some(Placeholder::Column(index)),
            "offset" => Some(Placeholder::Offset(index)),
            _ => None,
        }
    }

    fn resolve(self, locations: &[Location], data: &[String]) -> String {
        let missing = || "?".to_string();
        match self {
            Placeholder::Line(i) => locations.get(i).map_or_else(missing, |l| l.line.to_string()),
            Placeholder::Column(i) => locations
                .get(i)
                .map_or_else(missing, |l| l.column.to_string()),
            Placeholder::Offset(i) => locations
                .get(i)
                .map_or_else(missing, |l| l.offset.to_string()),
            Placeholder::Data(i) => data.get(i).cloned().unwrap_or_else(missing),
        }
    }
}

enum Piece<'t> {
    Text(&'t str),
    Arg(usize),
}

/// A template split into literal text and argument slots
///
/// Each distinct placeholder gets one argument index on first encounter;
/// later references reuse it, so every argument is resolved once.
struct Template<'t> {
    pieces: Vec<Piece<'t>>,
    args: Vec<Placeholder>,
}

impl<'t> Template<'t> {
    fn compile(template: &'t str) -> Self {
        let mut pieces = Vec::new();
        let mut args = Vec::new();
        let mut assigned: HashMap<Placeholder, usize> = HashMap::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            match Placeholder::parse(&rest[open + 1..close]) {
                Some(placeholder) => {
                    if open > 0 {
                        pieces.push(Piece::Text(&rest[..open]));
                    }
                    let index = *assigned.entry(placeholder).or_insert_with(|| {
                        args.push(placeholder);
                        args.len() - 1
                    });
                    pieces.push(Piece::Arg(index));
                }
                None => pieces.push(Piece::Text(&rest[..=close])),
            }
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            pieces.push(Piece::Text(rest));
        }

        Self { pieces, args }
    }

    fn format(&self, locations: &[Location], data: &[String]) -> String {
        let values: Vec<String> = self
            .args
            .iter()
            .map(|p| p.resolve(locations, data))
            .collect();
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Arg(index) => out.push_str(&values[*index]),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mismatch() -> ParseError {
        ParseError::new(ErrorKind::MessageIdMismatch)
            .at(Location::new(9, 2, 5))
            .at(Location::new(80, 6, 8))
            .with_data("123")
            .with_data("124")
    }

    #[test]
    fn test_default_severity() {
        assert_eq!(ParseError::new(ErrorKind::TruncatedHeader).severity(), Severity::Fatal);
        assert_eq!(ParseError::new(ErrorKind::UnknownSegment).severity(), Severity::Error);
        assert_eq!(ParseError::new(ErrorKind::SchemaWarning).severity(), Severity::Warning);
        assert_eq!(
            ParseError::new(ErrorKind::NonSignificantRelease).severity(),
            Severity::Info
        );
    }

    #[test]
    fn test_render_resolves_locations_and_data() {
        assert_eq!(
            mismatch().message(),
            "Message reference '124' at line 6, column 8 does not match '123' at line 2, column 5"
        );
    }

    #[test]
    fn test_append_invalidates_cached_message() {
        let mut error = ParseError::new(ErrorKind::UnknownSegment)
            .at(Location::new(0, 1, 1))
            .with_data("XYZ");
        assert_eq!(error.message(), "Unknown segment 'XYZ' at line 1, column 1");

        error.push_note("segment skipped");
        assert_eq!(
            error.message(),
            "Unknown segment 'XYZ' at line 1, column 1 (segment skipped)"
        );
    }

    #[test]
    fn test_repeated_placeholder_uses_one_argument() {
        let template = Template::compile("{D0}-{L0.line}-{D0}-{L0.line}");
        assert_eq!(template.args, vec![Placeholder::Data(0), Placeholder::Line(0)]);
        assert_eq!(
            template.format(&[Location::new(0, 3, 1)], &["x".to_string()]),
            "x-3-x-3"
        );
    }

    #[test]
    fn test_unknown_braces_are_literal_and_missing_values_are_marked() {
        let template = Template::compile("{oops} {D4} {L1.offset}");
        assert_eq!(template.format(&[], &[]), "{oops} ? ?");
    }

    #[test]
    fn test_missing_template_falls_back_to_kind_name() {
        let catalog: HashMap<ErrorKind, String> = HashMap::new();
        assert_eq!(mismatch().message_with(&catalog), "MESSAGE_ID_MISMATCH");
    }

    #[test]
    fn test_custom_catalog() {
        let mut catalog = HashMap::new();
        catalog.insert(
            ErrorKind::MessageIdMismatch,
            "Referenz {D1} != {D0} (Zeile {L1.line})".to_string(),
        );
        assert_eq!(
            mismatch().with_note("x").message_with(&catalog),
            "Referenz 124 != 123 (Zeile 6) (x)"
        );
    }

    #[test]
    fn test_kind_serializes_as_key_name() {
        let json = serde_json::to_string(&ErrorKind::FgIdMismatch).unwrap();
        assert_eq!(json, "\"FG_ID_MISMATCH\"");
        for kind in [
            ErrorKind::NumberOfSegmentsMismatch,
            ErrorKind::ExpectedSubElementNotFound,
            ErrorKind::TruncatedServiceStringAdvice,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }

    #[test]
    fn test_error_display_names_severity_and_kind() {
        let error = ParseError::new(ErrorKind::MessageIdMismatch)
            .at(Location::new(0, 1, 1))
            .at(Location::new(30, 2, 1))
            .with_data("M1")
            .with_data("M2");
        let boxed: Box<dyn std::error::Error> = Box::new(error.clone());

        assert_eq!(
            boxed.to_string(),
            format!("error [MESSAGE_ID_MISMATCH]: {}", error.message())
        );
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_equality_ignores_render_cache() {
        let a = mismatch();
        let b = mismatch();
        let _ = a.message();
        assert_eq!(a, b);
    }
}
