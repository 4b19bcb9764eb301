#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-ir
//!
//! Located values, segment tokens, and the structured tree produced when an
//! EDIFACT interchange is parsed.
//!
//! Everything here is format-neutral plumbing shared by the lexer, the
//! validators, and consumers of the parse result.

/// Document container and interchange metadata.
pub mod document;
/// Source locations and located values.
pub mod location;
/// Tree node model used for the structured interchange.
pub mod node;
/// Lexical segment tokens.
pub mod token;

/// Primary parse result type.
pub use document::{Document, DocumentMetadata};
/// Location primitives.
pub use location::{LocatedValue, Location};
/// Node primitives for the tree structure.
pub use node::{Node, NodeType};
/// Lexer output.
pub use token::{Element, SegmentToken};
