//! Streaming segment lexer
//!
//! Decoded characters are read in fixed-size chunks and split into segment
//! tokens in a single pass. Every tag and component carries the locations
//! of its first and last character.

use crate::encoding::{CharDecoder, Malformed};
use crate::syntax::{Separators, SyntaxLevel};
use edi_ir::{Element, LocatedValue, Location, SegmentToken};
use edi_validation::{ErrorCollector, ErrorKind, ParseError};
use std::io::{self, Read};
use tracing::trace;

/// Running location over decoded characters
///
/// The first line-break character seen (CR or LF) becomes the line
/// separator for the rest of the stream; the other one has zero width.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor {
    location: Location,
    newline: Option<char>,
}

impl Cursor {
    pub(crate) fn new() -> Self {
        Self {
            location: Location::start(),
            newline: None,
        }
    }

    /// Current location, where the next character will be
    pub(crate) fn location(&self) -> Location {
        self.location
    }

    /// Consume `c` and return its location
    pub(crate) fn advance(&mut self, c: char) -> Location {
        let at = self.location;
        self.location.offset += 1;
        if c == '\r' || c == '\n' {
            let newline = *self.newline.get_or_insert(c);
            if c == newline {
                self.location.line += 1;
                self.location.column = 1;
            }
        } else {
            self.location.column += 1;
        }
        at
    }
}

/// Failure to produce the next character
#[derive(Debug)]
pub(crate) enum StreamError {
    Io(io::Error),
    Malformed,
}

/// Decoded characters of a byte reader, refilled one chunk at a time
pub(crate) struct CharStream<R> {
    reader: R,
    decoder: CharDecoder,
    chunk: Vec<u8>,
    decoded: String,
    pos: usize,
    eof: bool,
    malformed: bool,
}

impl<R: Read> CharStream<R> {
    pub(crate) fn new(reader: R, decoder: CharDecoder, buffer_size: usize) -> Self {
        Self {
            reader,
            decoder,
            chunk: vec![0; buffer_size.max(16)],
            decoded: String::new(),
            pos: 0,
            eof: false,
            malformed: false,
        }
    }

    pub(crate) fn next_char(&mut self) -> Result<Option<char>, StreamError> {
        loop {
            if let Some(c) = self.decoded[self.pos..].chars().next() {
                self.pos += c.len_utf8();
                return Ok(Some(c));
            }
            if self.malformed {
                return Err(StreamError::Malformed);
            }
            if self.eof {
                return Ok(None);
            }
            self.refill()?;
        }
    }

    fn refill(&mut self) -> Result<(), StreamError> {
        self.decoded.clear();
        self.pos = 0;

        let read = loop {
            match self.reader.read(&mut self.chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(StreamError::Io(e)),
            }
        };
        self.eof = read == 0;
        if let Err(Malformed) = self
            .decoder
            .decode(&self.chunk[..read], self.eof, &mut self.decoded)
        {
            self.malformed = true;
        }
        Ok(())
    }
}

/// Fatal lexing outcome
#[derive(Debug)]
pub enum LexError {
    Io(io::Error),
    Fatal(ParseError),
}

impl From<io::Error> for LexError {
    fn from(e: io::Error) -> Self {
        LexError::Io(e)
    }
}

impl From<ParseError> for LexError {
    fn from(e: ParseError) -> Self {
        LexError::Fatal(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    Tag,
    Nesting,
    Component,
    SubElement,
}

/// A value being collected
struct Pending {
    text: String,
    anchor: Location,
    begin: Option<Location>,
    end: Location,
}

impl Pending {
    fn new(anchor: Location) -> Self {
        Self {
            text: String::new(),
            anchor,
            begin: None,
            end: anchor,
        }
    }

    fn push(&mut self, c: char, at: Location) {
        self.text.push(c);
        self.begin.get_or_insert(at);
        self.end = at;
    }

    fn finish(self) -> LocatedValue {
        match self.begin {
            Some(begin) => LocatedValue::new(self.text, begin, self.end),
            None => LocatedValue::empty_at(self.anchor),
        }
    }
}

/// Splits decoded characters into segment tokens
pub struct Lexer<R> {
    stream: CharStream<R>,
    cursor: Cursor,
    separators: Separators,
    repertoire: Option<SyntaxLevel>,
    skip: usize,
}

impl<R: Read> Lexer<R> {
    pub(crate) fn new(stream: CharStream<R>, separators: Separators) -> Self {
        Self {
            stream,
            cursor: Cursor::new(),
            separators,
            repertoire: None,
            skip: 0,
        }
    }

    /// Reject characters outside `level`'s repertoire
    pub(crate) fn with_repertoire(mut self, level: SyntaxLevel) -> Self {
        self.repertoire = Some(level);
        self
    }

    /// Consume `count` characters before the first token (the UNA advice)
    pub(crate) fn skipping(mut self, count: usize) -> Self {
        self.skip = count;
        self
    }

    /// Location after the last consumed character
    pub fn location(&self) -> Location {
        self.cursor.location()
    }

    fn next_char(&mut self) -> Result<Option<(char, Location)>, LexError> {
        match self.stream.next_char() {
            Ok(Some(c)) => Ok(Some((c, self.cursor.advance(c)))),
            Ok(None) => Ok(None),
            Err(StreamError::Io(e)) => Err(LexError::Io(e)),
            Err(StreamError::Malformed) => Err(ParseError::new(ErrorKind::MalformedInput)
                .at(self.cursor.location())
                .with_data(self.stream.decoder.charset().name())
                .into()),
        }
    }

    fn check_repertoire(&self, c: char, at: Location) -> Result<(), LexError> {
        match self.repertoire {
            Some(level) if !level.allows(c) && !self.separators.contains(c) => {
                Err(ParseError::new(ErrorKind::InvalidCharacter)
                    .at(at)
                    .with_data(format!("U+{:04X}", u32::from(c)))
                    .with_data(level.to_string())
                    .into())
            }
            _ => Ok(()),
        }
    }

    /// Next segment token, or `None` at the end of the stream
    ///
    /// Tokens with an empty tag are reported and skipped.
    ///
    /// # Errors
    ///
    /// A fatal [`ParseError`] for malformed input, characters outside the
    /// strict repertoire, an invalid nesting indicator, or an unterminated
    /// segment; I/O errors from the reader.
    pub fn next_token(
        &mut self,
        collector: &mut ErrorCollector,
    ) -> Result<Option<SegmentToken>, LexError> {
        while self.skip > 0 {
            if self.next_char()?.is_none() {
                return Ok(None);
            }
            self.skip -= 1;
        }

        loop {
            match self.lex_segment(collector)? {
                Lexed::Token(token) => return Ok(Some(token)),
                Lexed::EmptyTag(at) => {
                    collector.report(ErrorKind::EmptySegmentTag, at);
                }
                Lexed::End => return Ok(None),
            }
        }
    }

    fn lex_segment(&mut self, collector: &mut ErrorCollector) -> Result<Lexed, LexError> {
        let sep = self.separators;
        let mut state = State::Outside;
        let mut escaped: Option<Location> = None;
        let mut tag = Pending::new(Location::start());
        let mut nesting = String::new();
        let mut value = Pending::new(Location::start());
        let mut components: Vec<LocatedValue> = Vec::new();
        let mut token: Option<SegmentToken> = None;

        while let Some((c, at)) = self.next_char()? {
            // line breaks between segments are layout, not content
            if state == State::Outside && c.is_whitespace() {
                continue;
            }
            self.check_repertoire(c, at)?;

            if let Some(release_at) = escaped.take() {
                if state == State::Nesting {
                    return Err(invalid_nesting(&nesting, c, at));
                }
                if !sep.is_significant(c) {
                    value_or_tag(state, &mut tag, &mut value).push(sep.release, release_at);
                    collector
                        .report(ErrorKind::NonSignificantRelease, release_at)
                        .push_data(c.to_string());
                }
                value_or_tag(state, &mut tag, &mut value).push(c, at);
                continue;
            }

            if state == State::Outside {
                state = State::Tag;
                tag = Pending::new(at);
            }

            if c == sep.release {
                escaped = Some(at);
                continue;
            }

            match state {
                State::Outside | State::Tag => {
                    if !sep.is_delimiter(c) {
                        tag.push(c, at);
                        continue;
                    }
                    let tag = std::mem::replace(&mut tag, Pending::new(at));
                    if tag.begin.is_none() {
                        if c == sep.terminator {
                            return Ok(Lexed::EmptyTag(at));
                        }
                        // skip to the terminator, then report
                        self.skip_segment(at)?;
                        return Ok(Lexed::EmptyTag(at));
                    }
                    let next = SegmentToken::new(tag.finish());
                    if c == sep.terminator {
                        return Ok(Lexed::Token(next));
                    }
                    token = Some(next);
                    if c == sep.component {
                        state = State::Nesting;
                    } else {
                        state = State::Component;
                        value = Pending::new(at);
                    }
                }
                State::Nesting => {
                    if c.is_ascii_digit() {
                        nesting.push(c);
                        continue;
                    }
                    if (c != sep.element && c != sep.terminator) || nesting.is_empty() {
                        return Err(invalid_nesting(&nesting, c, at));
                    }
                    let level = nesting
                        .parse::<u32>()
                        .map_err(|_| invalid_nesting(&nesting, c, at))?;
                    if let Some(token) = token.as_mut() {
                        token.nesting = Some(level);
                    }
                    if c == sep.terminator {
                        return Ok(finish(token));
                    }
                    state = State::Component;
                    value = Pending::new(at);
                }
                State::Component | State::SubElement => {
                    if !sep.is_delimiter(c) {
                        value.push(c, at);
                        continue;
                    }
                    components.push(std::mem::replace(&mut value, Pending::new(at)).finish());
                    if c == sep.component {
                        state = State::SubElement;
                        continue;
                    }
                    if let (Some(token), Some(element)) = (
                        token.as_mut(),
                        Element::from_components(std::mem::take(&mut components)),
                    ) {
                        token.elements.push(element);
                    }
                    if c == sep.terminator {
                        return Ok(finish(token));
                    }
                    state = State::Component;
                }
            }
        }

        if state == State::Outside {
            return Ok(Lexed::End);
        }
        let (name, begin) = match &token {
            Some(token) => (token.tag().to_string(), token.begin()),
            None => (tag.text.clone(), tag.begin.unwrap_or(tag.anchor)),
        };
        Err(ParseError::new(ErrorKind::UnterminatedSegment)
            .at(begin)
            .with_data(name)
            .into())
    }

    /// Consume up to and including the next unescaped terminator
    fn skip_segment(&mut self, begin: Location) -> Result<(), LexError> {
        let mut escaped = false;
        while let Some((c, at)) = self.next_char()? {
            self.check_repertoire(c, at)?;
            if escaped {
                escaped = false;
            } else if c == self.separators.release {
                escaped = true;
            } else if c == self.separators.terminator {
                return Ok(());
            }
        }
        Err(ParseError::new(ErrorKind::UnterminatedSegment)
            .at(begin)
            .with_data("")
            .into())
    }
}

enum Lexed {
    Token(SegmentToken),
    EmptyTag(Location),
    End,
}

fn finish(token: Option<SegmentToken>) -> Lexed {
    match token {
        Some(token) => {
            trace!(tag = token.tag(), elements = token.elements.len(), "Lexed segment");
            Lexed::Token(token)
        }
        None => Lexed::End,
    }
}

fn value_or_tag<'a>(state: State, tag: &'a mut Pending, value: &'a mut Pending) -> &'a mut Pending {
    match state {
        State::Tag | State::Outside | State::Nesting => tag,
        State::Component | State::SubElement => value,
    }
}

fn invalid_nesting(digits: &str, found: char, at: Location) -> LexError {
    let mut indicator = digits.to_string();
    indicator.push(found);
    ParseError::new(ErrorKind::InvalidNestingIndicator)
        .at(at)
        .with_data(indicator)
        .into()
}

/// Lex a complete in-memory interchange body with the given separators
///
/// Intended for callers that already know the separators; the stream is
/// decoded as UTF-8 text and no UNA segment is skipped.
///
/// # Errors
///
/// The first fatal lexing error.
pub fn tokenize(
    text: &str,
    separators: Separators,
    collector: &mut ErrorCollector,
) -> Result<Vec<SegmentToken>, LexError> {
    let decoder = CharDecoder::new(crate::encoding::Charset::Utf8)
        .ok_or_else(|| io::Error::other("UTF-8 decoder unavailable"))?;
    let stream = CharStream::new(text.as_bytes(), decoder, 4096);
    let mut lexer = Lexer::new(stream, separators);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token(collector)? {
        tokens.push(token);
    }
    Ok(tokens)
}
