//! Positional schema validation of segment tokens
//!
//! Received elements are matched against the ordered element specs of a
//! segment, and components against the component specs of a composite.
//! Both levels share one walk; they differ only in which diagnostic kinds
//! they raise.

use crate::diagnostic::ErrorKind;
use crate::reporter::ErrorCollector;
use edi_ir::{Element, LocatedValue, Location, Node, NodeType, SegmentToken};
use edi_schema::{ElementSpec, SegmentSpec, SlotSpec};
use tracing::trace;

/// A received slot value, either an element or a component
trait Received {
    fn is_empty_marker(&self) -> bool;
    fn end(&self) -> Location;
}

impl Received for Element {
    fn is_empty_marker(&self) -> bool {
        Element::is_empty_marker(self)
    }

    fn end(&self) -> Location {
        Element::end(self)
    }
}

impl Received for LocatedValue {
    fn is_empty_marker(&self) -> bool {
        self.is_empty()
    }

    fn end(&self) -> Location {
        self.end
    }
}

/// Which nesting level a walk runs at
#[derive(Clone, Copy)]
enum Level<'a> {
    Segment,
    Element(&'a str),
}

impl Level<'_> {
    fn expected(self, tag: &str, spec: &dyn SlotSpec, at: Location, collector: &mut ErrorCollector) {
        match self {
            Level::Segment => {
                collector
                    .report(ErrorKind::ExpectedElementNotFound, at)
                    .push_data(tag)
                    .push_data(spec.annotated());
            }
            Level::Element(id) => {
                collector
                    .report(ErrorKind::ExpectedSubElementNotFound, at)
                    .push_data(tag)
                    .push_data(spec.annotated())
                    .push_data(id);
            }
        }
    }

    fn incomplete(self, tag: &str, missing: String, at: Location, collector: &mut ErrorCollector) {
        let error = match self {
            Level::Segment => collector.report(ErrorKind::IncompleteSegment, at),
            Level::Element(_) => collector.report(ErrorKind::IncompleteElement, at),
        };
        error.push_data(tag).push_data(missing);
        if let Level::Element(id) = self {
            error.push_data(id);
        }
    }

    fn extra(self, tag: &str, count: usize, at: Location, collector: &mut ErrorCollector) {
        let error = match self {
            Level::Segment => collector.report(ErrorKind::ExtraElementFound, at),
            Level::Element(_) => collector.report(ErrorKind::ExtraSubElementFound, at),
        };
        error.push_data(tag).push_data(count.to_string());
        if let Level::Element(id) = self {
            error.push_data(id);
        }
    }
}

/// Match `received` against `specs` in order
///
/// `accept` is called for every non-empty value together with the spec it
/// was matched to and the end of the value before it.
fn walk<S, R, F>(
    specs: &[S],
    received: &[R],
    anchor: Location,
    level: Level<'_>,
    tag: &str,
    collector: &mut ErrorCollector,
    mut accept: F,
) where
    S: SlotSpec,
    R: Received,
    F: FnMut(&S, &R, Location, &mut ErrorCollector),
{
    let mut pos = 0;
    let mut last_end = anchor;

    for (i, spec) in specs.iter().enumerate() {
        if pos >= received.len() {
            let remaining = &specs[i..];
            if remaining.iter().any(SlotSpec::is_mandatory) {
                let missing = remaining
                    .iter()
                    .map(SlotSpec::annotated)
                    .collect::<Vec<_>>()
                    .join(", ");
                level.incomplete(tag, missing, last_end, collector);
            }
            return;
        }

        let mut occurs = 0;
        while occurs < spec.max_occurs() && pos < received.len() {
            let item = &received[pos];
            if item.is_empty_marker() {
                if occurs == 0 && !spec.is_mandatory() {
                    // an omitted conditional slot
                    pos += 1;
                    last_end = item.end();
                    occurs = spec.min_occurs();
                    break;
                }
                if occurs < spec.min_occurs() {
                    level.expected(tag, spec, last_end, collector);
                }
            } else {
                accept(spec, item, last_end, collector);
            }
            pos += 1;
            last_end = item.end();
            occurs += 1;
        }

        if occurs < spec.min_occurs() {
            level.expected(tag, spec, last_end, collector);
        }
    }

    if pos < received.len() {
        level.extra(tag, received.len() - pos, last_end, collector);
    }
}

/// Validates segment tokens against their segment specs
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentSchemaValidator;

impl SegmentSchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `token` against `spec` and build its segment node
    ///
    /// Element and component nodes are named by their spec ids. Omitted
    /// values produce no node. A schema notice on the spec is reported as
    /// a warning.
    pub fn validate_segment(
        &self,
        token: &SegmentToken,
        spec: &SegmentSpec,
        collector: &mut ErrorCollector,
    ) -> Node {
        let tag = token.tag();
        trace!(tag, elements = token.elements.len(), "Validating segment");

        if let Some(notice) = &spec.notice {
            collector
                .report(ErrorKind::SchemaWarning, token.begin())
                .push_data(tag)
                .push_data(notice.as_str());
        }

        let mut children = Vec::new();
        walk(
            &spec.elements,
            &token.elements,
            token.tag.end,
            Level::Segment,
            tag,
            collector,
            |element_spec, element, anchor, collector| {
                children.push(element_node(tag, element_spec, element, anchor, collector));
            },
        );

        let mut node = segment_node(token);
        node.children = children;
        node
    }

    /// Build a segment node without schema checks
    ///
    /// Elements are named by position (`01`, `02`, ...) and components by
    /// position within their element.
    pub fn unchecked_segment(&self, token: &SegmentToken) -> Node {
        let mut node = segment_node(token);
        for (i, element) in token.elements.iter().enumerate() {
            let name = format!("{:02}", i + 1);
            if element.is_composite() {
                let mut composite = Node::new(name, NodeType::Element);
                composite.set_span(element.begin(), element.end());
                for (j, component) in element.components().iter().enumerate() {
                    composite.add_child(Node::leaf(
                        format!("{:02}", j + 1),
                        NodeType::Component,
                        component,
                    ));
                }
                node.add_child(composite);
            } else {
                node.add_child(Node::leaf(name, NodeType::Element, element.first()));
            }
        }
        node
    }
}

fn segment_node(token: &SegmentToken) -> Node {
    let mut node = Node::new(token.tag(), NodeType::Segment);
    node.set_span(token.begin(), token.end());
    if let Some(level) = token.nesting {
        node.set_attribute("nesting", level.to_string());
    }
    node
}

fn element_node(
    tag: &str,
    spec: &ElementSpec,
    element: &Element,
    anchor: Location,
    collector: &mut ErrorCollector,
) -> Node {
    match &spec.components {
        Some(components) => {
            let mut node = Node::new(&spec.id, NodeType::Element);
            node.set_span(element.begin(), element.end());
            walk(
                components,
                element.components(),
                anchor,
                Level::Element(&spec.id),
                tag,
                collector,
                |component_spec, value, _, _| {
                    node.add_child(Node::leaf(&component_spec.id, NodeType::Component, value));
                },
            );
            node
        }
        None => {
            if element.is_composite() {
                let first = element.first();
                collector
                    .report(ErrorKind::ExtraSubElementFound, first.end)
                    .push_data(tag)
                    .push_data((element.len() - 1).to_string())
                    .push_data(spec.id.as_str());
            }
            Node::leaf(&spec.id, NodeType::Element, element.first())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::ParseError;
    use edi_schema::ComponentSpec;

    /// Build a token from `TAG+a:b+c` style text on line 1, offsets by position
    fn token(text: &str) -> SegmentToken {
        let loc = |offset: usize| Location::new(offset, 1, offset + 1);
        let mut parts = text.split('+');
        let tag = parts.next().unwrap_or_default();
        let mut offset = 0;
        let mut token = SegmentToken::new(LocatedValue::new(
            tag,
            loc(0),
            loc(tag.len().saturating_sub(1)),
        ));
        offset += tag.len() + 1;
        for part in parts {
            let mut components = Vec::new();
            for component in part.split(':') {
                let value = if component.is_empty() {
                    LocatedValue::empty_at(loc(offset.saturating_sub(1)))
                } else {
                    LocatedValue::new(component, loc(offset), loc(offset + component.len() - 1))
                };
                components.push(value);
                offset += component.len() + 1;
            }
            token.elements.push(Element::from_components(components).unwrap());
        }
        token
    }

    fn bgm_spec() -> SegmentSpec {
        SegmentSpec::new(
            "BGM",
            vec![
                ElementSpec::optional("C002").with_components(vec![
                    ComponentSpec::optional("1001"),
                    ComponentSpec::optional("1131"),
                    ComponentSpec::optional("3055"),
                ]),
                ElementSpec::mandatory("1004"),
                ElementSpec::optional("1225"),
            ],
        )
    }

    fn run(text: &str, spec: &SegmentSpec) -> (Node, Vec<ParseError>) {
        let mut collector = ErrorCollector::new();
        let node = SegmentSchemaValidator::new().validate_segment(&token(text), spec, &mut collector);
        (node, collector.into_errors())
    }

    fn kinds(errors: &[ParseError]) -> Vec<ErrorKind> {
        errors.iter().map(ParseError::kind).collect()
    }

    #[test]
    fn test_valid_segment_builds_named_nodes() {
        let (node, errors) = run("BGM+220:9+4711+9", &bgm_spec());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(node.name, "BGM");
        let names: Vec<_> = node.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["C002", "1004", "1225"]);
        let c002 = &node.children[0];
        assert_eq!(c002.children[1].name, "1131");
        assert_eq!(c002.children[1].value.as_deref(), Some("9"));
    }

    #[test]
    fn test_omitted_optional_element_is_skipped() {
        let (node, errors) = run("BGM++4711", &bgm_spec());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].name, "1004");
    }

    #[test]
    fn test_incomplete_segment_lists_remaining_specs() {
        let spec = SegmentSpec::new(
            "BGM",
            vec![
                ElementSpec::optional("A"),
                ElementSpec::optional("C002"),
                ElementSpec::mandatory("1004"),
            ],
        );
        let (_, errors) = run("BGM+x", &spec);
        assert_eq!(kinds(&errors), [ErrorKind::IncompleteSegment]);
        assert_eq!(errors[0].data()[0], "BGM");
        assert_eq!(errors[0].data()[1], "C002 (C), 1004 (M)");
        assert_eq!(errors[0].location(), Some(Location::new(4, 1, 5)));
    }

    #[test]
    fn test_missing_optional_tail_is_fine() {
        let (_, errors) = run("BGM+220+4711", &bgm_spec());
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_empty_mandatory_element_is_expected() {
        let (_, errors) = run("BGM+220++9", &bgm_spec());
        assert_eq!(kinds(&errors), [ErrorKind::ExpectedElementNotFound]);
        assert_eq!(errors[0].data()[1], "1004 (M)");
        // end of the previous element
        assert_eq!(errors[0].location(), Some(Location::new(6, 1, 7)));
    }

    #[test]
    fn test_extra_elements_reported_once() {
        let (node, errors) = run("BGM+220+4711+9+X+Y", &bgm_spec());
        assert_eq!(kinds(&errors), [ErrorKind::ExtraElementFound]);
        assert_eq!(errors[0].data()[1], "2");
        assert_eq!(node.children.len(), 3);
    }

    #[test]
    fn test_components_on_simple_element() {
        let (_, errors) = run("BGM+220+4711:1", &bgm_spec());
        assert_eq!(kinds(&errors), [ErrorKind::ExtraSubElementFound]);
        assert_eq!(errors[0].data()[2], "1004");
    }

    #[test]
    fn test_component_level_errors() {
        let spec = SegmentSpec::new(
            "DTM",
            vec![ElementSpec::mandatory("C507").with_components(vec![
                ComponentSpec::mandatory("2005"),
                ComponentSpec::optional("2380"),
                ComponentSpec::mandatory("2379"),
            ])],
        );

        let (_, errors) = run("DTM+137:20240101", &spec);
        assert_eq!(kinds(&errors), [ErrorKind::IncompleteElement]);
        assert_eq!(errors[0].data()[1], "2379 (M)");
        assert_eq!(errors[0].data()[2], "C507");

        let (_, errors) = run("DTM+137:20240101:102:X", &spec);
        assert_eq!(kinds(&errors), [ErrorKind::ExtraSubElementFound]);

        let (_, errors) = run("DTM+:20240101:102", &spec);
        assert_eq!(kinds(&errors), [ErrorKind::ExpectedSubElementNotFound]);
    }

    #[test]
    fn test_repeating_element_consumes_up_to_max() {
        let spec = SegmentSpec::new(
            "FTX",
            vec![
                ElementSpec::mandatory("4451"),
                ElementSpec::optional("4440").occurs(1, 3),
            ],
        );
        let (node, errors) = run("FTX+AAI+a+b+c", &spec);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(node.find_children("4440").len(), 3);

        let (_, errors) = run("FTX+AAI+a+b+c+d", &spec);
        assert_eq!(kinds(&errors), [ErrorKind::ExtraElementFound]);
    }

    #[test]
    fn test_schema_notice_is_a_warning() {
        let spec = SegmentSpec::new("FTX", vec![ElementSpec::mandatory("4451")])
            .with_notice("marked for deletion");
        let (_, errors) = run("FTX+AAI", &spec);
        assert_eq!(kinds(&errors), [ErrorKind::SchemaWarning]);
        assert_eq!(errors[0].data()[1], "marked for deletion");
    }

    #[test]
    fn test_unchecked_segment_names_by_position() {
        let node = SegmentSchemaValidator::new().unchecked_segment(&token("LIN+1++4000862141404:SRS"));
        let names: Vec<_> = node.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["01", "02", "03"]);
        assert_eq!(node.children[2].children[1].value.as_deref(), Some("SRS"));
    }
}
