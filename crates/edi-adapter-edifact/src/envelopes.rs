//! EDIFACT envelope handling (UNB/UNZ, UNG/UNE, UNH/UNT)
//!
//! Header and trailer fields are extracted leniently from segment tokens:
//! missing values become empty strings or `None`, since the structural
//! validator reports envelope problems as diagnostics rather than failing.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use edi_ir::{Element, LocatedValue, Location, Node, NodeType, SegmentToken};
use edi_schema::MessageContext;
use serde::Serialize;

/// Party identifier (sender or recipient)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PartyId {
    /// Party identification (e.g., "5412345000013")
    pub id: String,
    /// Code qualifier (e.g., "14" for EAN International)
    pub qualifier: Option<String>,
    /// Internal identification (optional)
    pub internal_id: Option<String>,
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}:{}", self.id, qualifier),
            None => f.write_str(&self.id),
        }
    }
}

/// UNB - Interchange Header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterchangeHeader {
    /// Syntax identifier text (e.g., "UNOC")
    pub syntax_identifier: String,
    /// Syntax version number (e.g., "3")
    pub syntax_version: String,
    pub sender: PartyId,
    pub recipient: PartyId,
    /// Date and time of preparation, when it parses
    pub prepared_at: Option<NaiveDateTime>,
    /// Interchange control reference
    pub control_ref: LocatedValue,
    /// Application reference (optional)
    pub application_ref: Option<String>,
    /// Test indicator ("1" = test)
    pub test: bool,
}

/// UNG - Functional Group Header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupHeader {
    /// Message group identification (e.g., "INVOIC")
    pub group_id: String,
    pub sender: PartyId,
    pub recipient: PartyId,
    pub prepared_at: Option<NaiveDateTime>,
    /// Group reference number
    pub control_ref: LocatedValue,
    /// Controlling agency
    pub agency: Option<String>,
}

/// Message type identifier (composite S009 in UNH)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MessageIdentifier {
    /// Message type (e.g., "ORDERS", "DESADV", "INVOIC")
    pub message_type: String,
    /// Message version number (e.g., "D")
    pub version: String,
    /// Message release number (e.g., "96A", "01B")
    pub release: String,
    /// Controlling agency (e.g., "UN")
    pub agency: String,
    /// Association assigned code (e.g., "EAN008")
    pub association: Option<String>,
}

impl MessageIdentifier {
    /// Schema lookup context for this identifier
    pub fn context(&self) -> MessageContext {
        let mut context = MessageContext::new(
            self.message_type.as_str(),
            self.version.as_str(),
            self.release.as_str(),
            self.agency.as_str(),
        );
        context.association.clone_from(&self.association);
        context
    }
}

/// UNH - Message Header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageHeader {
    /// Message reference number
    pub message_ref: LocatedValue,
    pub identifier: MessageIdentifier,
    /// Common access reference (optional)
    pub common_access_ref: Option<String>,
}

/// UNT, UNE, or UNZ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trailer {
    /// Declared control count, raw
    pub count: LocatedValue,
    /// Reference that must match the header's
    pub reference: LocatedValue,
}

/// Header of an open or closed envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Header {
    Interchange(InterchangeHeader),
    Group(GroupHeader),
    Message(MessageHeader),
}

impl Header {
    /// Control reference the trailer must repeat
    pub fn reference(&self) -> &LocatedValue {
        match self {
            Header::Interchange(h) => &h.control_ref,
            Header::Group(h) => &h.control_ref,
            Header::Message(h) => &h.message_ref,
        }
    }

    /// Tag of the opening segment
    pub fn opening_tag(&self) -> &'static str {
        match self {
            Header::Interchange(_) => "UNB",
            Header::Group(_) => "UNG",
            Header::Message(_) => "UNH",
        }
    }

    /// Tag of the designated closing segment
    pub fn closing_tag(&self) -> &'static str {
        match self {
            Header::Interchange(_) => "UNZ",
            Header::Group(_) => "UNE",
            Header::Message(_) => "UNT",
        }
    }

    fn node_type(&self) -> NodeType {
        match self {
            Header::Interchange(_) => NodeType::Interchange,
            Header::Group(_) => NodeType::FunctionalGroup,
            Header::Message(_) => NodeType::Message,
        }
    }
}

/// One level of the interchange hierarchy
///
/// `count` holds closed children for interchanges and groups, and segments
/// (the header included) for messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    pub header: Header,
    pub count: usize,
    pub opened_at: Location,
    pub closed_at: Option<Location>,
    /// Structured subtree built so far
    pub node: Node,
}

impl HierarchyNode {
    /// Open a node at the location of its header segment
    pub fn open(header: Header, opened_at: Location) -> Self {
        let name = match &header {
            Header::Interchange(_) => "INTERCHANGE",
            Header::Group(_) => "GROUP",
            Header::Message(h) => h.identifier.message_type.as_str(),
        };
        let mut node = Node::new(name, header.node_type());
        node.set_attribute("reference", header.reference().as_str());
        match &header {
            Header::Interchange(h) => {
                node.set_attribute("sender", h.sender.to_string());
                node.set_attribute("recipient", h.recipient.to_string());
            }
            Header::Group(h) => {
                node.set_attribute("group", h.group_id.as_str());
            }
            Header::Message(h) => {
                node.set_attribute("type", h.identifier.message_type.as_str());
                node.set_attribute(
                    "directory",
                    format!("{}{}", h.identifier.version, h.identifier.release),
                );
            }
        }
        Self {
            header,
            count: 0,
            opened_at,
            closed_at: None,
            node,
        }
    }

    /// Record the closing location
    pub fn close(&mut self, closed_at: Location) {
        self.closed_at = Some(closed_at);
        self.node.set_span(self.opened_at, closed_at);
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// Message header, if this is a message
    pub fn message(&self) -> Option<&MessageHeader> {
        match &self.header {
            Header::Message(h) => Some(h),
            _ => None,
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract the UNB fields
pub fn interchange_header(token: &SegmentToken) -> InterchangeHeader {
    InterchangeHeader {
        syntax_identifier: token.text(0, 0).to_string(),
        syntax_version: token.text(0, 1).to_string(),
        sender: party_id(token.element(1)),
        recipient: party_id(token.element(2)),
        prepared_at: datetime(token.element(3)),
        control_ref: located(token, 4),
        application_ref: optional(token, 6, 0),
        test: token.text(10, 0) == "1",
    }
}

/// Extract the UNG fields
pub fn group_header(token: &SegmentToken) -> GroupHeader {
    GroupHeader {
        group_id: token.text(0, 0).to_string(),
        sender: party_id(token.element(1)),
        recipient: party_id(token.element(2)),
        prepared_at: datetime(token.element(3)),
        control_ref: located(token, 4),
        agency: optional(token, 5, 0),
    }
}

/// Extract the UNH fields
pub fn message_header(token: &SegmentToken) -> MessageHeader {
    MessageHeader {
        message_ref: located(token, 0),
        identifier: MessageIdentifier {
            message_type: token.text(1, 0).to_string(),
            version: token.text(1, 1).to_string(),
            release: token.text(1, 2).to_string(),
            agency: token.text(1, 3).to_string(),
            association: optional(token, 1, 4),
        },
        common_access_ref: optional(token, 2, 0),
    }
}

/// Extract count and reference from UNT, UNE, or UNZ
pub fn trailer(token: &SegmentToken) -> Trailer {
    Trailer {
        count: located(token, 0),
        reference: located(token, 1),
    }
}

/// First component of element `index`, or an empty value at the segment end
fn located(token: &SegmentToken, index: usize) -> LocatedValue {
    token
        .value(index, 0)
        .cloned()
        .unwrap_or_else(|| LocatedValue::empty_at(token.end()))
}

fn optional(token: &SegmentToken, element: usize, component: usize) -> Option<String> {
    Some(token.text(element, component))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn party_id(element: Option<&Element>) -> PartyId {
    let Some(element) = element else {
        return PartyId::default();
    };
    let component = |i: usize| {
        element
            .component(i)
            .filter(|v| !v.is_empty())
            .map(|v| v.value.clone())
    };
    PartyId {
        id: element.first().value.clone(),
        qualifier: component(1),
        internal_id: component(2),
    }
}

/// Date `YYMMDD` or `CCYYMMDD` and time `HHMM` or `HHMMSS`
fn datetime(element: Option<&Element>) -> Option<NaiveDateTime> {
    let element = element?;
    let date = element.first().as_str();
    let date = match date.len() {
        6 => NaiveDate::parse_from_str(date, "%y%m%d").ok()?,
        8 => NaiveDate::parse_from_str(date, "%Y%m%d").ok()?,
        _ => return None,
    };
    let time = element.component(1).map_or("", LocatedValue::as_str);
    let time = match time.len() {
        0 => NaiveTime::MIN,
        4 => NaiveTime::parse_from_str(time, "%H%M").ok()?,
        6 => NaiveTime::parse_from_str(time, "%H%M%S").ok()?,
        _ => return None,
    };
    Some(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::syntax::Separators;
    use edi_validation::ErrorCollector;

    fn token(text: &str) -> SegmentToken {
        let mut collector = ErrorCollector::new();
        tokenize(text, Separators::default(), &mut collector)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_interchange_header() {
        let unb = token("UNB+UNOC:3+5412345000013:14+4012345000009:14+240315:1030+REF001++ORDERS++++1'");
        let header = interchange_header(&unb);

        assert_eq!(header.syntax_identifier, "UNOC");
        assert_eq!(header.syntax_version, "3");
        assert_eq!(header.sender.id, "5412345000013");
        assert_eq!(header.sender.qualifier.as_deref(), Some("14"));
        assert_eq!(header.recipient.to_string(), "4012345000009:14");
        assert_eq!(header.control_ref.as_str(), "REF001");
        assert_eq!(header.application_ref.as_deref(), Some("ORDERS"));
        assert!(header.test);
        assert_eq!(
            header.prepared_at.unwrap().to_string(),
            "2024-03-15 10:30:00"
        );
    }

    #[test]
    fn test_century_date_and_bad_date() {
        let unb = token("UNB+UNOA:4+S+R+20240315:103005+1'");
        assert_eq!(
            interchange_header(&unb).prepared_at.unwrap().to_string(),
            "2024-03-15 10:30:05"
        );

        let unb = token("UNB+UNOA:4+S+R+991399:2500+1'");
        assert!(interchange_header(&unb).prepared_at.is_none());
    }

    #[test]
    fn test_message_header_context() {
        let unh = token("UNH+ME0001+ORDERS:D:96A:UN:EAN008'");
        let header = message_header(&unh);

        assert_eq!(header.message_ref.as_str(), "ME0001");
        let context = header.identifier.context();
        assert_eq!(context.directory(), "D96A");
        assert_eq!(context.association.as_deref(), Some("EAN008"));
    }

    #[test]
    fn test_group_header() {
        let ung = token("UNG+INVOIC+SENDER:ZZ+RECIP:ZZ+240315:1030+G1+UN+D:96A'");
        let header = group_header(&ung);
        assert_eq!(header.group_id, "INVOIC");
        assert_eq!(header.control_ref.as_str(), "G1");
        assert_eq!(header.agency.as_deref(), Some("UN"));
    }

    #[test]
    fn test_trailer_with_missing_reference() {
        let unt = token("UNT+5'");
        let trailer = trailer(&unt);
        assert_eq!(trailer.count.as_str(), "5");
        assert!(trailer.reference.is_empty());
        assert_eq!(trailer.reference.begin, unt.end());
    }

    #[test]
    fn test_hierarchy_node_attributes() {
        let unh = token("UNH+1+ORDERS:D:96A:UN'");
        let mut node = HierarchyNode::open(Header::Message(message_header(&unh)), unh.begin());
        assert_eq!(node.header.closing_tag(), "UNT");
        assert_eq!(node.node.name, "ORDERS");
        assert_eq!(node.node.attribute("type"), Some("ORDERS"));
        assert_eq!(node.node.attribute("directory"), Some("D96A"));
        assert!(!node.is_closed());

        node.close(Location::new(40, 3, 1));
        assert!(node.is_closed());
        assert_eq!(node.node.end, Some(Location::new(40, 3, 1)));
    }
}
