//! Node types for the structured interchange tree

use crate::location::{LocatedValue, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node in the interchange tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name (segment tag, element or component id)
    pub name: String,

    /// Node type
    pub node_type: NodeType,

    /// Decoded value, for elements and components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Child nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,

    /// Node attributes (header fields, flags)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Location of the first character covered by this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<Location>,

    /// Location of the last character covered by this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Location>,
}

/// Types of nodes in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// Root of the document
    Root,

    /// Interchange envelope (UNB/UNZ)
    Interchange,

    /// Functional group envelope (UNG/UNE)
    FunctionalGroup,

    /// Message envelope (UNH/UNT)
    Message,

    /// Individual segment
    Segment,

    /// Data element (simple or composite)
    Element,

    /// Component within a composite element
    Component,
}

impl Node {
    /// Create a new node
    #[must_use]
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            value: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            begin: None,
            end: None,
        }
    }

    /// Create a leaf node from a located value
    #[must_use]
    pub fn leaf(name: impl Into<String>, node_type: NodeType, value: &LocatedValue) -> Self {
        let mut node = Self::new(name, node_type);
        node.value = Some(value.value.clone());
        node.begin = Some(value.begin);
        node.end = Some(value.end);
        node
    }

    /// Add a child node
    pub fn add_child(&mut self, child: Node) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Set an attribute
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Read an attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Set the covered span
    pub fn set_span(&mut self, begin: Location, end: Location) -> &mut Self {
        self.begin = Some(begin);
        self.end = Some(end);
        self
    }

    /// Find a child by name
    #[must_use]
    pub fn find_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Find all children by name
    #[must_use]
    pub fn find_children(&self, name: &str) -> Vec<&Node> {
        self.children.iter().filter(|c| c.name == name).collect()
    }

    /// Depth-first iterator over this node and all descendants
    pub fn descendants(&self) -> impl Iterator<Item = &Node> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// All descendants of the given type, in document order
    pub fn descendants_of(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.descendants().filter(move |n| n.node_type == node_type)
    }
}
