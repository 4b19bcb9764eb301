//! Document representation of a parsed interchange
#![allow(clippy::must_use_candidate)] // Builder/constructor API intentionally omits pervasive #[must_use].

use crate::node::{Node, NodeType};
use serde::{Deserialize, Serialize};

/// The structured result of parsing one interchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Root node of the document
    pub root: Node,

    /// Document-level metadata
    pub metadata: DocumentMetadata,
}

/// Metadata captured from the interchange envelope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source identifier (file path or stream name)
    pub source: Option<String>,

    /// Syntax identifier from UNB (e.g. `UNOC`)
    pub syntax_identifier: Option<String>,

    /// Syntax version number from UNB
    pub syntax_version: Option<String>,

    /// Character encoding used to decode the stream
    pub encoding: Option<String>,

    /// Interchange sender identification
    pub sender: Option<String>,

    /// Interchange recipient identification
    pub recipient: Option<String>,

    /// Interchange control reference
    pub interchange_ref: Option<String>,

    /// Date and time of preparation
    pub prepared_at: Option<chrono::NaiveDateTime>,

    /// Whether the interchange uses functional groups
    pub uses_groups: Option<bool>,

    /// Message reference numbers, in order of closing
    pub message_refs: Vec<String>,
}

impl Document {
    /// Create a document with an empty root
    pub fn new() -> Self {
        Self {
            root: Node::new("ROOT", NodeType::Root),
            metadata: DocumentMetadata::default(),
        }
    }

    /// Create a document with the given root and metadata
    pub fn with_metadata(root: Node, metadata: DocumentMetadata) -> Self {
        Self { root, metadata }
    }

    /// Interchange nodes
    pub fn interchanges(&self) -> impl Iterator<Item = &Node> {
        self.root.descendants_of(NodeType::Interchange)
    }

    /// Message nodes, in document order
    pub fn messages(&self) -> impl Iterator<Item = &Node> {
        self.root.descendants_of(NodeType::Message)
    }

    /// Segment nodes, in document order
    pub fn segments(&self) -> impl Iterator<Item = &Node> {
        self.root.descendants_of(NodeType::Segment)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
