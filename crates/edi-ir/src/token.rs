//! Lexical segment tokens
#![allow(clippy::must_use_candidate)]

use crate::location::{LocatedValue, Location};
use serde::{Deserialize, Serialize};

/// One positional data element of a segment
///
/// A simple element has exactly one component; a composite has several. An
/// element is never empty: construction always supplies the first component,
/// and deserialization rejects an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LocatedValue>", into = "Vec<LocatedValue>")]
pub struct Element {
    components: Vec<LocatedValue>,
}

impl Element {
    /// Create an element from its first component
    pub fn new(first: LocatedValue) -> Self {
        Self {
            components: vec![first],
        }
    }

    /// Build an element from a list of components, `None` if the list is empty
    pub fn from_components(components: Vec<LocatedValue>) -> Option<Self> {
        if components.is_empty() {
            None
        } else {
            Some(Self { components })
        }
    }

    /// Append a component
    pub fn push(&mut self, component: LocatedValue) {
        self.components.push(component);
    }

    /// All components in order
    pub fn components(&self) -> &[LocatedValue] {
        &self.components
    }

    /// The first component
    pub fn first(&self) -> &LocatedValue {
        &self.components[0]
    }

    /// Component at `index`
    pub fn component(&self, index: usize) -> Option<&LocatedValue> {
        self.components.get(index)
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false; kept for API symmetry with collections
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the element has more than one component
    pub fn is_composite(&self) -> bool {
        self.components.len() > 1
    }

    /// A single empty component: the explicit "not supplied" marker
    pub fn is_empty_marker(&self) -> bool {
        self.components.len() == 1 && self.components[0].is_empty()
    }

    /// Location of the first character
    pub fn begin(&self) -> Location {
        self.components[0].begin
    }

    /// Location of the last character
    pub fn end(&self) -> Location {
        self.components[self.components.len() - 1].end
    }
}

impl TryFrom<Vec<LocatedValue>> for Element {
    type Error = &'static str;

    fn try_from(components: Vec<LocatedValue>) -> Result<Self, Self::Error> {
        Self::from_components(components).ok_or("an element needs at least one component")
    }
}

impl From<Element> for Vec<LocatedValue> {
    fn from(element: Element) -> Self {
        element.components
    }
}

/// A fully lexed segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentToken {
    /// Segment tag, never empty
    pub tag: LocatedValue,

    /// Data elements in order
    pub elements: Vec<Element>,

    /// Explicit nesting indicator (`TAG:n+...`), if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nesting: Option<u32>,
}

impl SegmentToken {
    /// Create a token with no elements
    pub fn new(tag: LocatedValue) -> Self {
        Self {
            tag,
            elements: Vec::new(),
            nesting: None,
        }
    }

    /// Segment tag text
    pub fn tag(&self) -> &str {
        self.tag.as_str()
    }

    /// Element at `index`
    pub fn element(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    /// Component `component` of element `element`
    pub fn value(&self, element: usize, component: usize) -> Option<&LocatedValue> {
        self.elements.get(element)?.component(component)
    }

    /// Text of component `component` of element `element`, empty when absent
    pub fn text(&self, element: usize, component: usize) -> &str {
        self.value(element, component).map_or("", LocatedValue::as_str)
    }

    /// Location where the segment starts
    pub fn begin(&self) -> Location {
        self.tag.begin
    }

    /// Location of the last consumed value
    pub fn end(&self) -> Location {
        self.elements.last().map_or(self.tag.end, Element::end)
    }
}
