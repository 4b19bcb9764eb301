//! Schema registries and the segment lookup capability

use crate::model::{MessageContext, Schema, SegmentSpec};
use dashmap::DashMap;
use std::sync::Arc;

/// Resolves segment specifications during a parse
///
/// Implementations are shared read-only between concurrent parses.
pub trait SchemaLookup: Send + Sync {
    /// Spec for `tag` within the given message, if any
    fn lookup(&self, tag: &str, context: Option<&MessageContext>) -> Option<Arc<SegmentSpec>>;

    /// Whether any schema covers this message identification
    fn supports(&self, _context: &MessageContext) -> bool {
        true
    }
}

impl<T: SchemaLookup + ?Sized> SchemaLookup for Arc<T> {
    fn lookup(&self, tag: &str, context: Option<&MessageContext>) -> Option<Arc<SegmentSpec>> {
        (**self).lookup(tag, context)
    }

    fn supports(&self, context: &MessageContext) -> bool {
        (**self).supports(context)
    }
}

impl<T: SchemaLookup + ?Sized> SchemaLookup for &T {
    fn lookup(&self, tag: &str, context: Option<&MessageContext>) -> Option<Arc<SegmentSpec>> {
        (**self).lookup(tag, context)
    }

    fn supports(&self, context: &MessageContext) -> bool {
        (**self).supports(context)
    }
}

/// Ordered collection of schemas answering segment lookups
///
/// Schemas are consulted in registration order; message-specific schemas are
/// preferred over generic ones so a directory can override service segments.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<Arc<Schema>>,
}

impl SchemaRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema
    pub fn register(&mut self, schema: impl Into<Arc<Schema>>) {
        self.schemas.push(schema.into());
    }

    /// Get a schema by qualified name
    pub fn get(&self, qualified_name: &str) -> Option<&Arc<Schema>> {
        self.schemas
            .iter()
            .find(|s| s.qualified_name() == qualified_name)
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schema is registered
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaLookup for SchemaRegistry {
    fn lookup(&self, tag: &str, context: Option<&MessageContext>) -> Option<Arc<SegmentSpec>> {
        let specific = self
            .schemas
            .iter()
            .filter(|s| !s.is_generic() && s.applies_to(context));
        let generic = self.schemas.iter().filter(|s| s.is_generic());
        specific
            .chain(generic)
            .find_map(|s| s.segment(tag).cloned())
    }

    /// Generic service schemas do not count as covering a message
    fn supports(&self, context: &MessageContext) -> bool {
        self.schemas
            .iter()
            .any(|s| !s.is_generic() && s.applies_to(Some(context)))
    }
}

/// Thread-safe schema cache keyed by qualified name
#[derive(Debug, Default)]
pub struct ConcurrentSchemaRegistry {
    schemas: DashMap<String, Arc<Schema>>,
}

impl ConcurrentSchemaRegistry {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a schema under `name`
    pub fn register(&self, name: impl Into<String>, schema: Arc<Schema>) {
        self.schemas.insert(name.into(), schema);
    }

    /// Cached schema by name
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `name` is cached
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Number of cached schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
