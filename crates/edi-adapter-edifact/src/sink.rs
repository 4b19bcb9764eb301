//! Structural event sinks
//!
//! A sink observes a parse as it happens. `on_segment` fires as soon as a
//! token is lexed, before any validation; the other callbacks fire when the
//! corresponding envelope is closed by its trailer.

use crate::envelopes::HierarchyNode;
use edi_ir::SegmentToken;
use serde::Serialize;
use std::sync::mpsc::SyncSender;

/// An event emitted while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StructuralEvent {
    Segment(SegmentToken),
    Message(HierarchyNode),
    Group(HierarchyNode),
    Interchange(HierarchyNode),
}

/// Receives structural events during a parse
///
/// All callbacks default to doing nothing.
pub trait ParseSink {
    fn on_segment(&mut self, _token: &SegmentToken) {}

    fn on_message(&mut self, _message: &HierarchyNode) {}

    fn on_group(&mut self, _group: &HierarchyNode) {}

    fn on_interchange(&mut self, _interchange: &HierarchyNode) {}
}

/// Sink that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ParseSink for NoopSink {}

/// Sink that records every event in order
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    pub events: Vec<StructuralEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed messages, in order
    pub fn messages(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.events.iter().filter_map(|event| match event {
            StructuralEvent::Message(node) => Some(node),
            _ => None,
        })
    }

    /// Lexed segment tokens, in order
    pub fn segments(&self) -> impl Iterator<Item = &SegmentToken> {
        self.events.iter().filter_map(|event| match event {
            StructuralEvent::Segment(token) => Some(token),
            _ => None,
        })
    }
}

impl ParseSink for EventLog {
    fn on_segment(&mut self, token: &SegmentToken) {
        self.events.push(StructuralEvent::Segment(token.clone()));
    }

    fn on_message(&mut self, message: &HierarchyNode) {
        self.events.push(StructuralEvent::Message(message.clone()));
    }

    fn on_group(&mut self, group: &HierarchyNode) {
        self.events.push(StructuralEvent::Group(group.clone()));
    }

    fn on_interchange(&mut self, interchange: &HierarchyNode) {
        self.events
            .push(StructuralEvent::Interchange(interchange.clone()));
    }
}

/// Forwards events over a bounded channel
///
/// A disconnected receiver is ignored so the parse can still complete.
impl ParseSink for SyncSender<StructuralEvent> {
    fn on_segment(&mut self, token: &SegmentToken) {
        let _ = self.send(StructuralEvent::Segment(token.clone()));
    }

    fn on_message(&mut self, message: &HierarchyNode) {
        let _ = self.send(StructuralEvent::Message(message.clone()));
    }

    fn on_group(&mut self, group: &HierarchyNode) {
        let _ = self.send(StructuralEvent::Group(group.clone()));
    }

    fn on_interchange(&mut self, interchange: &HierarchyNode) {
        let _ = self.send(StructuralEvent::Interchange(interchange.clone()));
    }
}
