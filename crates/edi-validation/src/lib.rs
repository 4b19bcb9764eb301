#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-validation
//!
//! Diagnostics and schema validation for EDIFACT segments.
//!
//! Every problem found while parsing an interchange is recorded as a
//! [`ParseError`]: a kind, the locations and data it refers to, and a
//! message rendered lazily from a [`MessageCatalog`] template. The
//! [`SegmentSchemaValidator`] checks the element layout of segment tokens
//! against schema specs and builds their tree nodes.
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_ir::{LocatedValue, Location, SegmentToken};
//! use edi_schema::{ElementSpec, SegmentSpec};
//! use edi_validation::{ErrorCollector, ErrorKind, SegmentSchemaValidator};
//!
//! let at = Location::new(0, 1, 1);
//! let token = SegmentToken::new(LocatedValue::new("UNS", at, Location::new(2, 1, 3)));
//! let spec = SegmentSpec::new("UNS", vec![ElementSpec::mandatory("0081")]);
//!
//! let mut collector = ErrorCollector::new();
//! let node = SegmentSchemaValidator::new().validate_segment(&token, &spec, &mut collector);
//!
//! assert_eq!(node.name, "UNS");
//! assert!(collector.contains(ErrorKind::IncompleteSegment));
//! ```

pub mod diagnostic;
pub mod engine;
pub mod reporter;

pub use diagnostic::{DefaultCatalog, ErrorKind, MessageCatalog, ParseError, Severity};
pub use engine::SegmentSchemaValidator;
pub use reporter::{DiagnosticSummary, ErrorCollector};

/// Validate one segment token against its spec with a fresh collector
pub fn validate_segment(
    token: &edi_ir::SegmentToken,
    spec: &edi_schema::SegmentSpec,
) -> (edi_ir::Node, Vec<ParseError>) {
    let mut collector = ErrorCollector::new();
    let node = SegmentSchemaValidator::new().validate_segment(token, spec, &mut collector);
    (node, collector.into_errors())
}
