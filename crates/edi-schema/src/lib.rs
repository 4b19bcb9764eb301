//! # edi-schema
//!
//! Segment-definition schemas for EDIFACT validation.
//!
//! A [`Schema`] holds the element layout of every segment of one directory
//! (e.g. `D96A`). Schemas are loaded from YAML or JSON by [`SchemaLoader`] and
//! queried during a parse through the [`SchemaLookup`] capability.

pub mod loader;
pub mod model;
pub mod registry;

pub use loader::SchemaLoader;
pub use model::{
    ComponentSpec, ElementSpec, MessageContext, Schema, SegmentSpec, SlotSpec, ANY_DIRECTORY,
};
pub use registry::{ConcurrentSchemaRegistry, SchemaLookup, SchemaRegistry};

use thiserror::Error;

/// Errors that can occur when working with schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
