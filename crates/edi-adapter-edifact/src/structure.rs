//! Interchange hierarchy validation
//!
//! Tracks the open interchange, functional group, and message while tokens
//! arrive, checks trailer references and control counts, and assembles the
//! document tree. Ordinary segments inside a message are delegated to the
//! [`SegmentSchemaValidator`].

use crate::envelopes::{
    self, GroupHeader, Header, HierarchyNode, InterchangeHeader, MessageHeader,
};
use crate::sink::ParseSink;
use edi_ir::{Document, DocumentMetadata, LocatedValue, Location, Node, NodeType, SegmentToken};
use edi_schema::{MessageContext, SchemaLookup};
use edi_validation::{ErrorCollector, ErrorKind, SegmentSchemaValidator};
use tracing::trace;

/// Interchange, group, and message
const MAX_DEPTH: usize = 3;

/// Validates the envelope structure of one interchange
pub struct StructuralValidator<'s> {
    schema: &'s dyn SchemaLookup,
    segments: SegmentSchemaValidator,
    stack: Vec<HierarchyNode>,
    uses_groups: Option<bool>,
    finished: bool,
    root: Node,
    metadata: DocumentMetadata,
    /// Identification of the open message
    context: Option<MessageContext>,
    /// Whether the open message is checked against the schema
    checked: bool,
}

impl<'s> StructuralValidator<'s> {
    pub fn new(schema: &'s dyn SchemaLookup) -> Self {
        Self {
            schema,
            segments: SegmentSchemaValidator::new(),
            stack: Vec::with_capacity(MAX_DEPTH),
            uses_groups: None,
            finished: false,
            root: Node::new("ROOT", NodeType::Root),
            metadata: DocumentMetadata::default(),
            context: None,
            checked: false,
        }
    }

    /// Whether functional groups are used, once known
    pub fn uses_groups(&self) -> Option<bool> {
        self.uses_groups
    }

    /// Number of open envelopes
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Process the next segment token
    pub fn accept(
        &mut self,
        token: &SegmentToken,
        collector: &mut ErrorCollector,
        sink: &mut dyn ParseSink,
    ) {
        match token.tag() {
            "UNB" => self.open_interchange(token, collector),
            "UNG" => self.open_group(token, collector),
            "UNH" => self.open_message(token, collector),
            "UNT" => self.close_message(token, collector, sink),
            "UNE" => self.close_group(token, collector, sink),
            "UNZ" => self.close_interchange(token, collector, sink),
            _ => self.segment(token, collector),
        }
    }

    /// Report envelopes left open and build the document
    ///
    /// Each open node gets one `MISSING_SEGMENT`, innermost first, and is
    /// attached to the tree marked `closed="false"`.
    pub fn finish(mut self, end: Location, collector: &mut ErrorCollector) -> Document {
        while let Some(mut open) = self.stack.pop() {
            collector
                .report(ErrorKind::MissingSegment, open.opened_at)
                .push_location(end)
                .push_data(open.header.closing_tag())
                .push_data(open.header.opening_tag());
            trace!(
                tag = open.header.opening_tag(),
                reference = open.header.reference().as_str(),
                "Envelope left open"
            );
            open.node.set_attribute("closed", "false");
            open.node.set_span(open.opened_at, end);
            self.attach(open.node);
        }
        self.metadata.uses_groups = self.uses_groups;
        Document::with_metadata(self.root, self.metadata)
    }

    fn unexpected(token: &SegmentToken, collector: &mut ErrorCollector) {
        collector
            .report(ErrorKind::UnexpectedSegment, token.begin())
            .push_data(token.tag());
    }

    fn top(&self) -> Option<&Header> {
        self.stack.last().map(|open| &open.header)
    }

    fn top_mut(&mut self) -> Option<&mut HierarchyNode> {
        self.stack.last_mut()
    }

    fn attach(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.node.add_child(node);
            }
            None => {
                self.root.add_child(node);
            }
        }
    }

    /// Service segment node, validated when a generic spec exists
    fn service_node(&self, token: &SegmentToken, collector: &mut ErrorCollector) -> Node {
        match self.schema.lookup(token.tag(), None) {
            Some(spec) => self.segments.validate_segment(token, &spec, collector),
            None => self.segments.unchecked_segment(token),
        }
    }

    fn push(&mut self, header: Header, token: &SegmentToken, collector: &mut ErrorCollector) {
        let mut open = HierarchyNode::open(header, token.begin());
        trace!(
            tag = token.tag(),
            reference = open.header.reference().as_str(),
            depth = self.stack.len() + 1,
            "Opened envelope"
        );
        let header_node = self.service_node(token, collector);
        open.node.add_child(header_node);
        self.stack.push(open);
    }

    fn open_interchange(&mut self, token: &SegmentToken, collector: &mut ErrorCollector) {
        if !self.stack.is_empty() || self.finished {
            Self::unexpected(token, collector);
            return;
        }
        let header = envelopes::interchange_header(token);
        self.record_interchange(&header);
        self.push(Header::Interchange(header), token, collector);
    }

    fn record_interchange(&mut self, header: &InterchangeHeader) {
        let metadata = &mut self.metadata;
        metadata.syntax_identifier = Some(header.syntax_identifier.clone());
        metadata.syntax_version = Some(header.syntax_version.clone());
        metadata.sender = Some(header.sender.to_string());
        metadata.recipient = Some(header.recipient.to_string());
        metadata.interchange_ref = Some(header.control_ref.value.clone());
        metadata.prepared_at = header.prepared_at;
    }

    fn open_group(&mut self, token: &SegmentToken, collector: &mut ErrorCollector) {
        let in_interchange = matches!(self.top(), Some(Header::Interchange(_)));
        if !in_interchange || self.uses_groups == Some(false) {
            Self::unexpected(token, collector);
            return;
        }
        self.uses_groups = Some(true);
        let header: GroupHeader = envelopes::group_header(token);
        self.push(Header::Group(header), token, collector);
    }

    fn open_message(&mut self, token: &SegmentToken, collector: &mut ErrorCollector) {
        let allowed = match self.top() {
            Some(Header::Interchange(_)) => self.uses_groups != Some(true),
            Some(Header::Group(_)) => true,
            Some(Header::Message(_)) | None => false,
        };
        if !allowed {
            Self::unexpected(token, collector);
            return;
        }
        if self.uses_groups.is_none() {
            self.uses_groups = Some(false);
        }

        let header: MessageHeader = envelopes::message_header(token);
        let context = header.identifier.context();
        self.checked = self.schema.supports(&context);
        if !self.checked {
            collector
                .report(ErrorKind::UnknownKey, header.message_ref.begin)
                .push_data(context.to_string());
        }
        self.context = Some(context);

        self.push(Header::Message(header), token, collector);
        if let Some(open) = self.top_mut() {
            open.count = 1;
        }
    }

    /// Check a trailer reference against the header's
    fn check_reference(
        kind: ErrorKind,
        opened: &LocatedValue,
        closed: &LocatedValue,
        collector: &mut ErrorCollector,
    ) {
        if opened.value != closed.value {
            collector
                .report(kind, opened.begin)
                .push_location(closed.begin)
                .push_data(opened.as_str())
                .push_data(closed.as_str());
        }
    }

    /// Check a declared control count; a non-numeric count is a mismatch
    fn check_count(
        kind: ErrorKind,
        declared: &LocatedValue,
        counted: usize,
        what: &str,
        collector: &mut ErrorCollector,
    ) {
        if declared.as_str().trim().parse::<usize>().ok() != Some(counted) {
            collector
                .report(kind, declared.begin)
                .push_data(declared.as_str())
                .push_data(counted.to_string())
                .push_data(what);
        }
    }

    /// Pop the top envelope, record its trailer, and attach it
    fn close(&mut self, token: &SegmentToken, collector: &mut ErrorCollector) -> Option<HierarchyNode> {
        let trailer_node = self.service_node(token, collector);
        let mut closed = self.stack.pop()?;
        closed.node.add_child(trailer_node);
        closed.close(token.end());
        trace!(
            tag = token.tag(),
            reference = closed.header.reference().as_str(),
            count = closed.count,
            "Closed envelope"
        );
        Some(closed)
    }

    fn adopt(&mut self, closed: HierarchyNode) {
        if let Some(parent) = self.top_mut() {
            parent.count += 1;
        }
        self.attach(closed.node);
    }

    fn close_message(
        &mut self,
        token: &SegmentToken,
        collector: &mut ErrorCollector,
        sink: &mut dyn ParseSink,
    ) {
        let Some(open) = self.top_mut() else {
            Self::unexpected(token, collector);
            return;
        };
        let Header::Message(header) = &open.header else {
            Self::unexpected(token, collector);
            return;
        };
        open.count += 1;
        let counted = open.count;
        let trailer = envelopes::trailer(token);
        Self::check_reference(
            ErrorKind::MessageIdMismatch,
            &header.message_ref,
            &trailer.reference,
            collector,
        );
        Self::check_count(
            ErrorKind::NumberOfSegmentsMismatch,
            &trailer.count,
            counted,
            "segments",
            collector,
        );

        if let Some(closed) = self.close(token, collector) {
            if let Some(message) = closed.message() {
                self.metadata
                    .message_refs
                    .push(message.message_ref.value.clone());
            }
            sink.on_message(&closed);
            self.adopt(closed);
        }
        self.context = None;
        self.checked = false;
    }

    fn close_group(
        &mut self,
        token: &SegmentToken,
        collector: &mut ErrorCollector,
        sink: &mut dyn ParseSink,
    ) {
        let Some(open) = self.stack.last() else {
            Self::unexpected(token, collector);
            return;
        };
        let Header::Group(header) = &open.header else {
            Self::unexpected(token, collector);
            return;
        };
        let trailer = envelopes::trailer(token);
        Self::check_reference(
            ErrorKind::FgIdMismatch,
            &header.control_ref,
            &trailer.reference,
            collector,
        );
        Self::check_count(
            ErrorKind::NumberOfMessagesMismatch,
            &trailer.count,
            open.count,
            "messages",
            collector,
        );

        if let Some(closed) = self.close(token, collector) {
            sink.on_group(&closed);
            self.adopt(closed);
        }
    }

    fn close_interchange(
        &mut self,
        token: &SegmentToken,
        collector: &mut ErrorCollector,
        sink: &mut dyn ParseSink,
    ) {
        let Some(open) = self.stack.last() else {
            Self::unexpected(token, collector);
            return;
        };
        let Header::Interchange(header) = &open.header else {
            Self::unexpected(token, collector);
            return;
        };
        let trailer = envelopes::trailer(token);
        Self::check_reference(
            ErrorKind::InterchangeIdMismatch,
            &header.control_ref,
            &trailer.reference,
            collector,
        );
        let children = if self.uses_groups == Some(true) {
            "groups"
        } else {
            "messages"
        };
        Self::check_count(
            ErrorKind::NumberOfSegmentsMismatch,
            &trailer.count,
            open.count,
            children,
            collector,
        );

        if let Some(closed) = self.close(token, collector) {
            sink.on_interchange(&closed);
            self.adopt(closed);
        }
        self.finished = true;
    }

    fn segment(&mut self, token: &SegmentToken, collector: &mut ErrorCollector) {
        if !matches!(self.top(), Some(Header::Message(_))) {
            Self::unexpected(token, collector);
            return;
        }

        let node = if self.checked {
            let Some(spec) = self.schema.lookup(token.tag(), self.context.as_ref()) else {
                collector
                    .report(ErrorKind::UnknownSegment, token.begin())
                    .push_data(token.tag());
                return;
            };
            self.segments.validate_segment(token, &spec, collector)
        } else {
            self.segments.unchecked_segment(token)
        };

        if let Some(open) = self.top_mut() {
            open.count += 1;
            open.node.add_child(node);
        }
    }
}
