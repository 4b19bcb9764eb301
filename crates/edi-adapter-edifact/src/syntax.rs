//! EDIFACT syntax definitions and delimiter handling
//!
//! This module handles the service string advice (UNA), the default
//! separators, and the syntax identifier read from the UNB header.

use crate::encoding::Charset;
use crate::lexer::Cursor;
use edi_ir::Location;
use edi_validation::{ErrorKind, ParseError};
use serde::Serialize;
use std::fmt;

/// Default EDIFACT separators (when no UNA is present)
pub const DEFAULT_COMPONENT_SEPARATOR: char = ':';
pub const DEFAULT_ELEMENT_SEPARATOR: char = '+';
pub const DEFAULT_DECIMAL_MARK: char = '.';
pub const DEFAULT_RELEASE_CHARACTER: char = '?';
pub const DEFAULT_RESERVED: char = ' ';
pub const DEFAULT_SEGMENT_TERMINATOR: char = '\'';

/// Separators used for lexing EDIFACT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Separators {
    /// Component separator (default ':')
    pub component: char,
    /// Element separator (default '+')
    pub element: char,
    /// Decimal mark (default '.')
    pub decimal: char,
    /// Release character (default '?')
    pub release: char,
    /// Reserved position, a repetition separator in syntax version 4
    pub reserved: char,
    /// Segment terminator (default '\'')
    pub terminator: char,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            component: DEFAULT_COMPONENT_SEPARATOR,
            element: DEFAULT_ELEMENT_SEPARATOR,
            decimal: DEFAULT_DECIMAL_MARK,
            release: DEFAULT_RELEASE_CHARACTER,
            reserved: DEFAULT_RESERVED,
            terminator: DEFAULT_SEGMENT_TERMINATOR,
        }
    }
}

impl Separators {
    /// Separators from the six characters following `UNA`
    pub fn from_una(advice: &[char]) -> Option<Self> {
        match *advice {
            [component, element, decimal, release, reserved, terminator, ..] => Some(Self {
                component,
                element,
                decimal,
                release,
                reserved,
                terminator,
            }),
            _ => None,
        }
    }

    /// The `UNA` service string advice for these separators
    pub fn to_una(&self) -> String {
        [
            'U',
            'N',
            'A',
            self.component,
            self.element,
            self.decimal,
            self.release,
            self.reserved,
            self.terminator,
        ]
        .iter()
        .collect()
    }

    /// Characters a release character may escape without being kept
    pub fn is_significant(&self, c: char) -> bool {
        c == self.component
            || c == self.element
            || c == self.decimal
            || c == self.terminator
            || c == self.release
    }

    /// Whether `c` ends a value
    pub fn is_delimiter(&self, c: char) -> bool {
        c == self.component || c == self.element || c == self.terminator
    }

    /// Check if a character needs escaping inside a value
    pub fn is_special(&self, c: char) -> bool {
        self.is_delimiter(c) || c == self.release
    }

    /// Escape `value` so it lexes back to itself
    pub fn escape(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            if self.is_special(c) {
                out.push(self.release);
            }
            out.push(c);
        }
        out
    }

    /// Whether `c` is one of the active separators
    pub fn contains(&self, c: char) -> bool {
        self.is_significant(c) || c == self.reserved
    }
}

/// Syntax level, the last letter of the syntax identifier (`UNOA` .. `UNOY`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyntaxLevel {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    W,
    X,
    Y,
}

/// Punctuation allowed by level A besides letters, digits, and space
const LEVEL_A_PUNCTUATION: &str = ".,-()/='+:?!\"%&*;<>";

impl SyntaxLevel {
    /// Level named by a syntax identifier such as `UNOC`
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let mut letters = identifier.strip_prefix("UNO")?.chars();
        let level = match letters.next()? {
            'A' => SyntaxLevel::A,
            'B' => SyntaxLevel::B,
            'C' => SyntaxLevel::C,
            'D' => SyntaxLevel::D,
            'E' => SyntaxLevel::E,
            'F' => SyntaxLevel::F,
            'G' => SyntaxLevel::G,
            'H' => SyntaxLevel::H,
            'I' => SyntaxLevel::I,
            'J' => SyntaxLevel::J,
            'K' => SyntaxLevel::K,
            'W' => SyntaxLevel::W,
            'X' => SyntaxLevel::X,
            'Y' => SyntaxLevel::Y,
            _ => return None,
        };
        letters.next().is_none().then_some(level)
    }

    pub fn letter(self) -> char {
        match self {
            SyntaxLevel::A => 'A',
            SyntaxLevel::B => 'B',
            SyntaxLevel::C => 'C',
            SyntaxLevel::D => 'D',
            SyntaxLevel::E => 'E',
            SyntaxLevel::F => 'F',
            SyntaxLevel::G => 'G',
            SyntaxLevel::H => 'H',
            SyntaxLevel::I => 'I',
            SyntaxLevel::J => 'J',
            SyntaxLevel::K => 'K',
            SyntaxLevel::W => 'W',
            SyntaxLevel::X => 'X',
            SyntaxLevel::Y => 'Y',
        }
    }

    /// Charset implied by the level when no byte-order mark is present
    ///
    /// Level X (ISO 2022 code extension) has no decoder.
    pub fn charset(self) -> Option<Charset> {
        Some(match self {
            SyntaxLevel::A | SyntaxLevel::B => Charset::Ascii,
            SyntaxLevel::C => Charset::Latin1,
            SyntaxLevel::D => Charset::Latin2,
            SyntaxLevel::E => Charset::Cyrillic,
            SyntaxLevel::F => Charset::Greek,
            SyntaxLevel::G => Charset::Latin3,
            SyntaxLevel::H => Charset::Latin4,
            SyntaxLevel::I => Charset::Arabic,
            SyntaxLevel::J => Charset::Hebrew,
            SyntaxLevel::K => Charset::Latin5,
            SyntaxLevel::W | SyntaxLevel::Y => Charset::Utf8,
            SyntaxLevel::X => return None,
        })
    }

    /// Whether `c` belongs to the level's character repertoire
    pub fn allows(self, c: char) -> bool {
        match self {
            SyntaxLevel::A => {
                c.is_ascii_uppercase()
                    || c.is_ascii_digit()
                    || c == ' '
                    || LEVEL_A_PUNCTUATION.contains(c)
            }
            SyntaxLevel::B => c == ' ' || c.is_ascii_graphic(),
            _ => !c.is_control(),
        }
    }
}

impl fmt::Display for SyntaxLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UNO{}", self.letter())
    }
}

/// Syntax identifier and version from UNB element S001
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxIdentifier {
    pub level: SyntaxLevel,
    /// Syntax version number, 1 to 4
    pub version: u8,
}

impl SyntaxIdentifier {
    /// Identifier text such as `UNOC`
    pub fn identifier(&self) -> String {
        self.level.to_string()
    }
}

/// What the start of an interchange announces about its syntax
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAdvice {
    pub separators: Separators,
    /// Whether the separators came from an explicit UNA
    pub explicit: bool,
    pub syntax: SyntaxIdentifier,
    /// Characters up to the end of the UNA segment, or 0 without one
    pub skip: usize,
}

/// Read the service string advice and the syntax identifier
///
/// `text` is the decoded start of the interchange, after any byte-order
/// mark. The UNA characters are taken verbatim.
///
/// # Errors
///
/// A fatal [`ParseError`] when the UNA or the UNB header is truncated, when
/// neither starts the text, or when the syntax level or version is unknown.
pub fn read_service_advice(text: &str) -> std::result::Result<ServiceAdvice, ParseError> {
    let mut cursor = Cursor::new();
    let chars: Vec<(char, Location)> = text.chars().map(|c| (c, cursor.advance(c))).collect();
    let end = cursor.location();
    let at = |i: usize| chars.get(i).map_or(end, |&(_, location)| location);
    let char_at = |i: usize| chars.get(i).map(|&(c, _)| c);
    let starts_with = |i: usize, literal: &str| {
        literal
            .chars()
            .enumerate()
            .all(|(k, c)| char_at(i + k) == Some(c))
    };
    let skip_whitespace = |mut i: usize| {
        while char_at(i).is_some_and(char::is_whitespace) {
            i += 1;
        }
        i
    };

    let mut i = skip_whitespace(0);
    let mut separators = Separators::default();
    let mut explicit = false;
    let mut skip = 0;

    if starts_with(i, "UNA") {
        let advice: Vec<char> = chars.iter().skip(i + 3).take(6).map(|&(c, _)| c).collect();
        separators = Separators::from_una(&advice).ok_or_else(|| {
            ParseError::new(ErrorKind::TruncatedServiceStringAdvice)
                .at(at(i))
                .with_data(advice.len().to_string())
        })?;
        explicit = true;
        skip = i + 9;
        i = skip_whitespace(skip);
    } else if !starts_with(i, "UNB") {
        let found: String = chars.iter().skip(i).take(3).map(|&(c, _)| c).collect();
        return Err(ParseError::new(ErrorKind::UnknownEncoding)
            .at(at(i))
            .with_data(found.escape_default().to_string()));
    }

    let truncated = |i: usize, note: &str| {
        ParseError::new(ErrorKind::TruncatedHeader)
            .at(at(i))
            .with_note(note)
    };

    if !starts_with(i, "UNB") {
        return Err(truncated(i, "expected UNB"));
    }
    if char_at(i + 3) != Some(separators.element) {
        return Err(truncated(i + 3, "expected the syntax identifier"));
    }

    let read_value = |start: usize| {
        let mut j = start;
        while let Some(c) = char_at(j) {
            if separators.is_delimiter(c) {
                break;
            }
            j += 1;
        }
        let value: String = chars[start.min(chars.len())..j.min(chars.len())]
            .iter()
            .map(|&(c, _)| c)
            .collect();
        (value, j)
    };

    let id_start = i + 4;
    let (identifier, j) = read_value(id_start);
    let Some(delimiter) = char_at(j) else {
        return Err(truncated(j, "syntax identifier"));
    };
    let level = SyntaxLevel::from_identifier(&identifier).ok_or_else(|| {
        ParseError::new(ErrorKind::UnknownSyntaxLevel)
            .at(at(id_start))
            .with_data(identifier.as_str())
    })?;

    if delimiter != separators.component {
        return Err(ParseError::new(ErrorKind::UnknownSyntaxVersion)
            .at(at(j))
            .with_data(""));
    }
    let (version, k) = read_value(j + 1);
    if char_at(k).is_none() {
        return Err(truncated(k, "syntax version"));
    }
    let version = match version.as_str() {
        "1" => 1,
        "2" => 2,
        "3" => 3,
        "4" => 4,
        _ => {
            return Err(ParseError::new(ErrorKind::UnknownSyntaxVersion)
                .at(at(j + 1))
                .with_data(version));
        }
    };

    Ok(ServiceAdvice {
        separators,
        explicit,
        syntax: SyntaxIdentifier { level, version },
        skip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_separators() {
        let sep = Separators::default();
        assert_eq!(sep.component, ':');
        assert_eq!(sep.element, '+');
        assert_eq!(sep.decimal, '.');
        assert_eq!(sep.release, '?');
        assert_eq!(sep.terminator, '\'');
        assert_eq!(sep.to_una(), "UNA:+.? '");
    }

    #[test]
    fn test_una_custom_separators() {
        let advice = read_service_advice("UNA*=_# ~UNB=UNOC*3=").unwrap();
        let sep = advice.separators;
        assert!(advice.explicit);
        assert_eq!(advice.skip, 9);
        assert_eq!(sep.component, '*');
        assert_eq!(sep.element, '=');
        assert_eq!(sep.decimal, '_');
        assert_eq!(sep.release, '#');
        assert_eq!(sep.terminator, '~');
        assert_eq!(advice.syntax.level, SyntaxLevel::C);
        assert_eq!(advice.syntax.version, 3);
    }

    #[test]
    fn test_defaults_without_una() {
        let advice = read_service_advice("\nUNB+UNOA:2+SENDER").unwrap();
        assert!(!advice.explicit);
        assert_eq!(advice.skip, 0);
        assert_eq!(advice.separators, Separators::default());
        assert_eq!(advice.syntax.identifier(), "UNOA");
    }

    #[test]
    fn test_truncated_una() {
        let err = read_service_advice("UNA:+.").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedServiceStringAdvice);
        assert_eq!(err.data()[0], "3");
    }

    #[test]
    fn test_truncated_header() {
        for text in ["UNA:+.? '", "UNB", "UNB+UNO", "UNB+UNOC:"] {
            let err = read_service_advice(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TruncatedHeader, "{text}");
        }
    }

    #[test]
    fn test_unknown_level_and_version() {
        let err = read_service_advice("UNB+UNOZ:3+").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSyntaxLevel);
        assert_eq!(err.data()[0], "UNOZ");
        assert_eq!(err.location(), Some(Location::new(4, 1, 5)));

        let err = read_service_advice("UNB+UNOA:7+").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSyntaxVersion);
        assert_eq!(err.data()[0], "7");

        let err = read_service_advice("UNB+UNOA+").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSyntaxVersion);
    }

    #[test]
    fn test_level_repertoire() {
        assert!(SyntaxLevel::A.allows('Z'));
        assert!(SyntaxLevel::A.allows('?'));
        assert!(!SyntaxLevel::A.allows('a'));
        assert!(!SyntaxLevel::A.allows('\n'));
        assert!(SyntaxLevel::B.allows('a'));
        assert!(!SyntaxLevel::B.allows('é'));
        assert!(SyntaxLevel::C.allows('é'));
        assert!(!SyntaxLevel::C.allows('\u{7}'));
    }

    #[test]
    fn test_level_charsets() {
        assert_eq!(SyntaxLevel::from_identifier("UNOC"), Some(SyntaxLevel::C));
        assert_eq!(SyntaxLevel::from_identifier("UNOCC"), None);
        assert_eq!(SyntaxLevel::C.charset(), Some(Charset::Latin1));
        assert_eq!(SyntaxLevel::Y.charset(), Some(Charset::Utf8));
        assert_eq!(SyntaxLevel::X.charset(), None);
    }

    #[test]
    fn test_escape() {
        let sep = Separators::default();
        assert_eq!(sep.escape("A+B?C'D:E.F"), "A?+B??C?'D?:E.F");
    }
}
