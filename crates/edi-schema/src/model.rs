//! Schema model definitions

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Occurrence bounds shared by element and component specifications
pub trait SlotSpec {
    /// Identifier used in diagnostics (e.g. `C002`, `1004`)
    fn id(&self) -> &str;

    /// Minimum number of occurrences
    fn min_occurs(&self) -> usize;

    /// Maximum number of occurrences
    fn max_occurs(&self) -> usize;

    /// Whether at least one occurrence is required
    fn is_mandatory(&self) -> bool {
        self.min_occurs() > 0
    }

    /// `ID (M)` or `ID (C)`
    fn annotated(&self) -> String {
        let usage = if self.is_mandatory() { 'M' } else { 'C' };
        format!("{} ({})", self.id(), usage)
    }
}

/// Specification of one component of a composite element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    pub id: String,
    pub name: Option<String>,
    pub min_occurs: usize,
    pub max_occurs: usize,
}

/// Specification of one data element slot of a segment
///
/// `components` is present only for composite elements. Components cannot
/// nest further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub id: String,
    pub name: Option<String>,
    pub min_occurs: usize,
    pub max_occurs: usize,
    pub components: Option<Vec<ComponentSpec>>,
}

/// Ordered element layout of one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpec {
    pub tag: String,
    pub name: Option<String>,
    pub elements: Vec<ElementSpec>,
    /// Schema-level notice reported as a warning when the segment is used
    /// (e.g. "marked for deletion")
    pub notice: Option<String>,
}

impl ComponentSpec {
    /// A conditional component occurring at most once
    pub fn optional(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            min_occurs: 0,
            max_occurs: 1,
        }
    }

    /// A mandatory component occurring exactly once
    pub fn mandatory(id: impl Into<String>) -> Self {
        Self {
            min_occurs: 1,
            ..Self::optional(id)
        }
    }
}

impl ElementSpec {
    /// A conditional simple element occurring at most once
    pub fn optional(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            min_occurs: 0,
            max_occurs: 1,
            components: None,
        }
    }

    /// A mandatory simple element occurring exactly once
    pub fn mandatory(id: impl Into<String>) -> Self {
        Self {
            min_occurs: 1,
            ..Self::optional(id)
        }
    }

    /// Set the occurrence bounds
    #[must_use]
    pub fn occurs(mut self, min: usize, max: usize) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    /// Turn this element into a composite with the given components
    #[must_use]
    pub fn with_components(mut self, components: Vec<ComponentSpec>) -> Self {
        self.components = Some(components);
        self
    }

    /// Whether the element is a composite
    pub fn is_composite(&self) -> bool {
        self.components.is_some()
    }
}

impl SlotSpec for ComponentSpec {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_occurs(&self) -> usize {
        self.min_occurs
    }

    fn max_occurs(&self) -> usize {
        self.max_occurs
    }
}

impl SlotSpec for ElementSpec {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_occurs(&self) -> usize {
        self.min_occurs
    }

    fn max_occurs(&self) -> usize {
        self.max_occurs
    }
}

impl SegmentSpec {
    /// Create a segment spec
    pub fn new(tag: impl Into<String>, elements: Vec<ElementSpec>) -> Self {
        Self {
            tag: tag.into(),
            name: None,
            elements,
            notice: None,
        }
    }

    /// Attach a schema notice
    #[must_use]
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

/// Message identification taken from the message header, used to select
/// which schema applies
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MessageContext {
    /// Message type (e.g. `ORDERS`)
    pub message_type: String,
    /// Message version number (e.g. `D`)
    pub version: String,
    /// Message release number (e.g. `96A`)
    pub release: String,
    /// Controlling agency (e.g. `UN`)
    pub agency: String,
    /// Association assigned code (e.g. `EAN008`)
    pub association: Option<String>,
}

impl MessageContext {
    /// Create a context from the four mandatory identifier parts
    pub fn new(
        message_type: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
        agency: impl Into<String>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            version: version.into(),
            release: release.into(),
            agency: agency.into(),
            association: None,
        }
    }

    /// Directory key combining version and release (e.g. `D96A`)
    pub fn directory(&self) -> String {
        format!("{}{}", self.version, self.release)
    }
}

impl fmt::Display for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.message_type, self.version, self.release, self.agency
        )?;
        if let Some(association) = &self.association {
            write!(f, ":{association}")?;
        }
        Ok(())
    }
}

/// Directory matching every message
pub const ANY_DIRECTORY: &str = "*";

/// A set of segment specifications for one directory
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    /// Directory key (e.g. `D96A`), or [`ANY_DIRECTORY`]
    pub version: String,
    /// Message types covered; empty means every type in the directory
    pub message_types: Vec<String>,
    segments: Vec<Arc<SegmentSpec>>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            message_types: Vec::new(),
            segments: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Restrict the schema to the given message types
    #[must_use]
    pub fn for_messages(mut self, message_types: Vec<String>) -> Self {
        self.message_types = message_types;
        self
    }

    /// Add segments; a later spec for the same tag replaces the earlier one
    #[must_use]
    pub fn with_segments(mut self, segments: Vec<SegmentSpec>) -> Self {
        for segment in segments {
            self.insert(segment);
        }
        self
    }

    /// Insert or replace a segment spec
    pub fn insert(&mut self, segment: SegmentSpec) {
        let segment = Arc::new(segment);
        match self.index.get(&segment.tag) {
            Some(&i) => self.segments[i] = segment,
            None => {
                self.index.insert(segment.tag.clone(), self.segments.len());
                self.segments.push(segment);
            }
        }
    }

    /// Name and version, used as the cache key
    pub fn qualified_name(&self) -> String {
        format!("{}: {}", self.name, self.version)
    }

    /// Segment spec by tag
    pub fn segment(&self, tag: &str) -> Option<&Arc<SegmentSpec>> {
        self.index.get(tag).map(|&i| &self.segments[i])
    }

    /// All segment specs in insertion order
    pub fn segments(&self) -> &[Arc<SegmentSpec>] {
        &self.segments
    }

    /// Whether this schema applies to any message (service segments)
    pub fn is_generic(&self) -> bool {
        self.version == ANY_DIRECTORY && self.message_types.is_empty()
    }

    /// Whether this schema covers messages with the given identification
    pub fn applies_to(&self, context: Option<&MessageContext>) -> bool {
        let Some(context) = context else {
            return self.is_generic();
        };
        let directory_matches =
            self.version == ANY_DIRECTORY || self.version == context.directory();
        let type_matches = self.message_types.is_empty()
            || self.message_types.iter().any(|t| *t == context.message_type);
        directory_matches && type_matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation() {
        assert_eq!(ElementSpec::mandatory("1004").annotated(), "1004 (M)");
        assert_eq!(ComponentSpec::optional("1131").annotated(), "1131 (C)");
    }

    #[test]
    fn test_insert_replaces_same_tag() {
        let mut schema = Schema::new("TEST", "D96A");
        schema.insert(SegmentSpec::new("BGM", vec![ElementSpec::optional("C002")]));
        schema.insert(SegmentSpec::new("BGM", vec![ElementSpec::mandatory("1004")]));
        assert_eq!(schema.segments().len(), 1);
        assert_eq!(schema.segment("BGM").unwrap().elements[0].id, "1004");
    }

    #[test]
    fn test_applies_to_directory_and_type() {
        let ctx = MessageContext::new("ORDERS", "D", "96A", "UN");
        let orders = Schema::new("EANCOM", "D96A").for_messages(vec!["ORDERS".to_string()]);
        let invoic = Schema::new("EANCOM", "D96A").for_messages(vec!["INVOIC".to_string()]);
        let other_dir = Schema::new("EANCOM", "D01B");
        let generic = Schema::new("SERVICE", ANY_DIRECTORY);

        assert!(orders.applies_to(Some(&ctx)));
        assert!(!invoic.applies_to(Some(&ctx)));
        assert!(!other_dir.applies_to(Some(&ctx)));
        assert!(generic.applies_to(Some(&ctx)));
        assert!(generic.applies_to(None));
        assert!(!orders.applies_to(None));
    }

    #[test]
    fn test_message_context_display() {
        let mut ctx = MessageContext::new("ORDERS", "D", "96A", "UN");
        assert_eq!(ctx.to_string(), "ORDERS:D:96A:UN");
        ctx.association = Some("EAN008".to_string());
        assert_eq!(ctx.to_string(), "ORDERS:D:96A:UN:EAN008");
        assert_eq!(ctx.directory(), "D96A");
    }
}
