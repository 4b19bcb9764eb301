#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

//! # edi-adapter-edifact
//!
//! Streaming UN/EDIFACT interchange parser with envelope validation.
//!
//! The parser detects the character encoding from a byte-order mark or the
//! syntax identifier, reads the delimiters from the service string advice,
//! tokenizes the stream with source locations, and validates the
//! interchange, group, and message envelopes. Segments inside messages are
//! checked against a [`SchemaLookup`](edi_schema::SchemaLookup).
//!
//! ```
//! use edi_adapter_edifact::EdifactParser;
//! use edi_schema::SchemaRegistry;
//!
//! let text = "UNB+UNOA:3+SENDER+RECIPIENT+240315:1030+1'UNZ+0+1'";
//! let outcome = EdifactParser::new()
//!     .parse_slice(text.as_bytes(), &SchemaRegistry::new())
//!     .unwrap();
//! assert!(outcome.errors.is_empty());
//! assert_eq!(outcome.document.metadata.sender.as_deref(), Some("SENDER"));
//! ```

pub mod encoding;
pub mod envelopes;
pub mod lexer;
pub mod parser;
pub mod sink;
pub mod structure;
pub mod syntax;

pub use encoding::Charset;
pub use envelopes::{Header, HierarchyNode};
pub use lexer::{LexError, Lexer, tokenize};
pub use parser::{EdifactParser, ParseOutcome, ParserConfig};
pub use sink::{EventLog, NoopSink, ParseSink, StructuralEvent};
pub use structure::StructuralValidator;
pub use syntax::{Separators, SyntaxIdentifier, SyntaxLevel};

use edi_validation::ParseError;
use thiserror::Error;

/// Errors that abort an EDIFACT parse
#[derive(Error, Debug)]
pub enum Error {
    /// A fatal diagnostic, with the diagnostics raised before it
    #[error("{error}")]
    Fatal {
        error: Box<ParseError>,
        partial: Vec<ParseError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a fatal diagnostic
    pub fn fatal(error: ParseError, partial: Vec<ParseError>) -> Self {
        Error::Fatal {
            error: Box::new(error),
            partial,
        }
    }

    /// The fatal diagnostic, if this is one
    pub fn diagnostic(&self) -> Option<&ParseError> {
        match self {
            Error::Fatal { error, .. } => Some(error),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
