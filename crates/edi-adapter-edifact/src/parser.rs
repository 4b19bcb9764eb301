//! EDIFACT streaming parser
//!
//! Ties the pieces together: the encoding is sniffed from a bounded prefix,
//! the service string advice and syntax identifier are read from the decoded
//! prefix, and the prefix is then chained back in front of the reader so the
//! lexer sees the whole stream exactly once. Tokens flow to the sink and then
//! to the [`StructuralValidator`].

use crate::encoding::{self, CharDecoder, Charset};
use crate::lexer::{CharStream, LexError, Lexer};
use crate::sink::{NoopSink, ParseSink};
use crate::structure::StructuralValidator;
use crate::syntax::{self, Separators, SyntaxIdentifier};
use crate::{Error, Result};
use edi_ir::{Document, Location};
use edi_schema::SchemaLookup;
use edi_validation::{DiagnosticSummary, ErrorCollector, ErrorKind, ParseError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Parser settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Reject characters outside the syntax level's repertoire
    pub strict: bool,
    /// Bytes read from the input per chunk
    pub buffer_size: usize,
    /// Bytes inspected for the byte-order mark, UNA, and UNB header
    pub max_prefix: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict: false,
            buffer_size: 8192,
            max_prefix: 512,
        }
    }
}

/// Result of a completed parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseOutcome {
    pub document: Document,
    /// Non-fatal diagnostics, in the order they were raised
    pub errors: Vec<ParseError>,
    /// Charset the stream was decoded with
    pub encoding: Charset,
    pub syntax: SyntaxIdentifier,
    pub separators: Separators,
}

impl ParseOutcome {
    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary::from_errors(&self.errors)
    }

    /// Whether no error-level diagnostic was raised
    pub fn is_valid(&self) -> bool {
        self.summary().errors == 0
    }
}

struct Parsed {
    document: Document,
    encoding: Charset,
    syntax: SyntaxIdentifier,
    separators: Separators,
}

/// Streaming EDIFACT parser
///
/// One instance parses one input at a time; all per-parse state lives in the
/// call, so an instance can be reused for the next input.
#[derive(Debug, Clone, Default)]
pub struct EdifactParser {
    config: ParserConfig,
}

impl EdifactParser {
    /// Create a parser with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse one interchange from `reader`
    ///
    /// # Errors
    ///
    /// [`Error::Fatal`] when a fatal diagnostic aborts the parse, carrying
    /// the diagnostics raised before it; [`Error::Io`] when reading fails.
    pub fn parse<R: Read>(
        &mut self,
        reader: R,
        schema: &dyn SchemaLookup,
        sink: &mut dyn ParseSink,
    ) -> Result<ParseOutcome> {
        let mut collector = ErrorCollector::new();
        match self.run(reader, schema, sink, &mut collector) {
            Ok(parsed) => {
                let errors = collector.into_errors();
                debug!(
                    encoding = %parsed.encoding,
                    syntax = %parsed.syntax.identifier(),
                    messages = parsed.document.metadata.message_refs.len(),
                    diagnostics = errors.len(),
                    "Parsed interchange"
                );
                Ok(ParseOutcome {
                    document: parsed.document,
                    errors,
                    encoding: parsed.encoding,
                    syntax: parsed.syntax,
                    separators: parsed.separators,
                })
            }
            Err(LexError::Fatal(error)) => {
                warn!(kind = %error.kind(), "Parse aborted: {}", error.message());
                Err(Error::fatal(error, collector.into_errors()))
            }
            Err(LexError::Io(e)) => Err(Error::Io(e)),
        }
    }

    /// Parse an in-memory interchange without a sink
    ///
    /// # Errors
    ///
    /// See [`EdifactParser::parse`].
    pub fn parse_slice(&mut self, data: &[u8], schema: &dyn SchemaLookup) -> Result<ParseOutcome> {
        self.parse(data, schema, &mut NoopSink)
    }

    /// Parse a file, recording its path as the document source
    ///
    /// # Errors
    ///
    /// See [`EdifactParser::parse`]; opening the file may also fail.
    pub fn parse_file(
        &mut self,
        path: &Path,
        schema: &dyn SchemaLookup,
        sink: &mut dyn ParseSink,
    ) -> Result<ParseOutcome> {
        let file = File::open(path)?;
        let mut outcome = self.parse(BufReader::new(file), schema, sink)?;
        outcome.document.metadata.source = Some(path.display().to_string());
        Ok(outcome)
    }

    fn run<R: Read>(
        &self,
        mut reader: R,
        schema: &dyn SchemaLookup,
        sink: &mut dyn ParseSink,
        collector: &mut ErrorCollector,
    ) -> std::result::Result<Parsed, LexError> {
        let mut prefix = Vec::with_capacity(self.config.max_prefix);
        let limit = u64::try_from(self.config.max_prefix).unwrap_or(u64::MAX);
        reader.by_ref().take(limit).read_to_end(&mut prefix)?;

        let sniffed = encoding::sniff(&prefix)?;
        prefix.drain(..sniffed.bom_len);

        let header = encoding::decode_prefix(sniffed.charset.unwrap_or(Charset::Latin1), &prefix);
        let advice = syntax::read_service_advice(&header)?;

        let encoding = sniffed
            .charset
            .or_else(|| advice.syntax.level.charset())
            .ok_or_else(|| unsupported(advice.syntax.identifier()))?;
        let decoder = CharDecoder::new(encoding).ok_or_else(|| unsupported(encoding.name()))?;
        debug!(
            %encoding,
            syntax = %advice.syntax.identifier(),
            version = advice.syntax.version,
            explicit_separators = advice.explicit,
            "Detected interchange syntax"
        );

        let stream = CharStream::new(
            io::Cursor::new(prefix).chain(reader),
            decoder,
            self.config.buffer_size,
        );
        let mut lexer = Lexer::new(stream, advice.separators).skipping(advice.skip);
        if self.config.strict {
            lexer = lexer.with_repertoire(advice.syntax.level);
        }

        let mut validator = StructuralValidator::new(schema);
        while let Some(token) = lexer.next_token(collector)? {
            sink.on_segment(&token);
            validator.accept(&token, collector, sink);
        }

        let mut document = validator.finish(lexer.location(), collector);
        document.metadata.encoding = Some(encoding.name().to_string());
        Ok(Parsed {
            document,
            encoding,
            syntax: advice.syntax,
            separators: advice.separators,
        })
    }
}

fn unsupported(what: impl Into<String>) -> ParseError {
    ParseError::new(ErrorKind::UnsupportedEncoding)
        .at(Location::start())
        .with_data(what)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::EventLog;
    use edi_schema::SchemaRegistry;
    use edi_validation::Severity;

    const ORDERS: &str = "UNA:+.? 'UNB+UNOC:3+SENDER+RECIPIENT+240315:1030+REF1'\n\
UNH+M1+ORDERS:D:96A:UN'\nBGM+220+ORDER1'\nUNT+3+M1'\nUNZ+1+REF1'\n";

    fn fatal(result: Result<ParseOutcome>) -> (ParseError, Vec<ParseError>) {
        match result {
            Err(Error::Fatal { error, partial }) => (*error, partial),
            other => panic!("expected a fatal error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_without_schema_checks() {
        let registry = SchemaRegistry::new();
        let mut parser = EdifactParser::new();
        let outcome = parser.parse_slice(ORDERS.as_bytes(), &registry).unwrap();

        assert_eq!(outcome.encoding, Charset::Latin1);
        assert_eq!(outcome.syntax.identifier(), "UNOC");
        assert_eq!(outcome.syntax.version, 3);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind(), ErrorKind::UnknownKey);
        assert!(!outcome.is_valid());
        assert_eq!(outcome.document.metadata.encoding.as_deref(), Some("ISO-8859-1"));
        assert_eq!(outcome.document.messages().count(), 1);
    }

    #[test]
    fn test_locations_follow_lines() {
        let registry = SchemaRegistry::new();
        let mut log = EventLog::new();
        EdifactParser::new()
            .parse(ORDERS.as_bytes(), &registry, &mut log)
            .unwrap();

        let bgm = log.segments().find(|t| t.tag() == "BGM").unwrap();
        assert_eq!(bgm.begin().line, 3);
        assert_eq!(bgm.begin().column, 1);
        assert_eq!(log.segments().next().unwrap().tag(), "UNB");
    }

    #[test]
    fn test_small_chunks_give_same_outcome() {
        let registry = SchemaRegistry::new();
        let expected = EdifactParser::new()
            .parse_slice(ORDERS.as_bytes(), &registry)
            .unwrap();
        let config = ParserConfig {
            buffer_size: 3,
            max_prefix: 64,
            ..ParserConfig::default()
        };
        let outcome = EdifactParser::with_config(config)
            .parse_slice(ORDERS.as_bytes(), &registry)
            .unwrap();
        assert_eq!(outcome, expected);
    }

    #[test]
    fn test_unknown_encoding_is_fatal() {
        let registry = SchemaRegistry::new();
        let (error, partial) = fatal(EdifactParser::new().parse_slice(b"HELLO", &registry));
        assert_eq!(error.kind(), ErrorKind::UnknownEncoding);
        assert_eq!(error.severity(), Severity::Fatal);
        assert!(partial.is_empty());
    }

    #[test]
    fn test_unsupported_level_without_bom() {
        let registry = SchemaRegistry::new();
        let text = "UNB+UNOX:3+S+R+240315:1030+REF1'";
        let (error, _) = fatal(EdifactParser::new().parse_slice(text.as_bytes(), &registry));
        assert_eq!(error.kind(), ErrorKind::UnsupportedEncoding);
        assert_eq!(error.data(), ["UNOX"]);
    }

    #[test]
    fn test_strict_mode_rejects_lowercase_in_level_a() {
        let registry = SchemaRegistry::new();
        let text = "UNB+UNOA:3+S+R+240315:1030+REF1'UNH+M1+ORDERS:D:96A:UN'BGM+220+order'";
        let config = ParserConfig {
            strict: true,
            ..ParserConfig::default()
        };
        let (error, partial) =
            fatal(EdifactParser::with_config(config).parse_slice(text.as_bytes(), &registry));
        assert_eq!(error.kind(), ErrorKind::InvalidCharacter);
        assert_eq!(error.data(), ["U+006F", "UNOA"]);
        assert_eq!(
            partial.iter().map(ParseError::kind).collect::<Vec<_>>(),
            [ErrorKind::UnknownKey]
        );

        let outcome = EdifactParser::new().parse_slice(text.as_bytes(), &registry).unwrap();
        assert!(outcome.errors.iter().all(|e| e.kind() != ErrorKind::InvalidCharacter));
    }

    #[test]
    fn test_config_from_json() {
        let config: ParserConfig = serde_json::from_str(r#"{"strict": true}"#).unwrap();
        assert!(config.strict);
        assert_eq!(config.buffer_size, ParserConfig::default().buffer_size);
    }

    #[test]
    fn test_parse_file_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.edi");
        std::fs::write(&path, ORDERS).unwrap();

        let registry = SchemaRegistry::new();
        let outcome = EdifactParser::new()
            .parse_file(&path, &registry, &mut NoopSink)
            .unwrap();
        assert_eq!(
            outcome.document.metadata.source.as_deref(),
            Some(path.display().to_string().as_str())
        );
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = EdifactParser::new().parse_file(
            &dir.path().join("missing.edi"),
            &SchemaRegistry::new(),
            &mut NoopSink,
        );
        match result {
            Err(error @ Error::Io(_)) => assert!(error.diagnostic().is_none()),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }
}
