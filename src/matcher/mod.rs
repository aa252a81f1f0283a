//! Declarative, schema-driven AST extraction (§4.1).
//!
//! A [`MatcherNode`] tree describes the shape of statement AST one expects to find; matching it
//! against a real AST node produces an [`ASTIndex`] mapping each matcher's `matching_id` to a
//! [`NodeMatch`]. Every statement analyzer (§4.4) is built on top of this.

mod attribute_index;

pub use attribute_index::{AttributeIndex, AttributeIndexGuard};

use std::collections::HashMap;

use crate::syntax::{AttributeKey, NodeId, NodeType, Program};

/// Sentinel `matching_id`: match the shape but do not record a result for it.
pub const DISCARD: u32 = u32::MAX;

/// A declarative matcher node. Construct these with the `MatcherNode::*` builders; every variant
/// is plain owned data so matchers are trivially constructible ahead of time (§4.1 "Matchers must
/// be statically constructible").
#[derive(Debug, Clone)]
pub enum MatcherNode {
    Object {
        node_type: Option<NodeType>,
        fields: Vec<(AttributeKey, MatcherNode)>,
        matching_id: u32,
    },
    Array {
        elements: Vec<MatcherNode>,
        matching_id: u32,
    },
    StringRef {
        matching_id: u32,
    },
    Bool {
        matching_id: u32,
    },
    Ui32 {
        matching_id: u32,
    },
    Ui32Bitmap {
        matching_id: u32,
    },
    Enum {
        node_type: NodeType,
        matching_id: u32,
    },
    SelectByType {
        options: Vec<MatcherNode>,
    },
}

impl MatcherNode {
    pub fn object(node_type: Option<NodeType>, fields: Vec<(AttributeKey, MatcherNode)>) -> Self {
        MatcherNode::Object {
            node_type,
            fields,
            matching_id: DISCARD,
        }
    }

    pub fn array(elements: Vec<MatcherNode>) -> Self {
        MatcherNode::Array {
            elements,
            matching_id: DISCARD,
        }
    }

    pub fn string() -> Self {
        MatcherNode::StringRef { matching_id: DISCARD }
    }

    pub fn boolean() -> Self {
        MatcherNode::Bool { matching_id: DISCARD }
    }

    pub fn ui32() -> Self {
        MatcherNode::Ui32 { matching_id: DISCARD }
    }

    pub fn ui32_bitmap() -> Self {
        MatcherNode::Ui32Bitmap { matching_id: DISCARD }
    }

    pub fn enum_of(node_type: NodeType) -> Self {
        MatcherNode::Enum {
            node_type,
            matching_id: DISCARD,
        }
    }

    pub fn select_by_type(options: Vec<MatcherNode>) -> Self {
        MatcherNode::SelectByType { options }
    }

    /// Attaches a `matching_id` that this node's result will be recorded under in the
    /// [`ASTIndex`] (§4.1 "Attribute(key, ...)" / tagged matchers).
    pub fn with_id(mut self, id: u32) -> Self {
        match &mut self {
            MatcherNode::Object { matching_id, .. }
            | MatcherNode::Array { matching_id, .. }
            | MatcherNode::StringRef { matching_id }
            | MatcherNode::Bool { matching_id }
            | MatcherNode::Ui32 { matching_id }
            | MatcherNode::Ui32Bitmap { matching_id }
            | MatcherNode::Enum { matching_id, .. } => *matching_id = id,
            MatcherNode::SelectByType { .. } => {}
        }
        self
    }

    fn matching_id(&self) -> Option<u32> {
        match self {
            MatcherNode::Object { matching_id, .. }
            | MatcherNode::Array { matching_id, .. }
            | MatcherNode::StringRef { matching_id }
            | MatcherNode::Bool { matching_id }
            | MatcherNode::Ui32 { matching_id }
            | MatcherNode::Ui32Bitmap { matching_id }
            | MatcherNode::Enum { matching_id, .. } => {
                if *matching_id == DISCARD {
                    None
                } else {
                    Some(*matching_id)
                }
            }
            MatcherNode::SelectByType { .. } => None,
        }
    }

    fn expected_node_type(&self) -> Option<NodeType> {
        match self {
            MatcherNode::Object { node_type, .. } => *node_type,
            MatcherNode::Array { .. } => Some(NodeType::Array),
            MatcherNode::StringRef { .. } => Some(NodeType::StringRef),
            MatcherNode::Bool { .. } => Some(NodeType::Bool),
            MatcherNode::Ui32 { .. } => Some(NodeType::Ui32),
            MatcherNode::Ui32Bitmap { .. } => Some(NodeType::Ui32Bitmap),
            MatcherNode::Enum { node_type, .. } => Some(*node_type),
            MatcherNode::SelectByType { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Missing,
    TypeMismatch,
    Matched,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchedValue {
    None,
    Bool(bool),
    UInt(u32),
    Str(String),
}

impl MatchedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MatchedValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            MatchedValue::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MatchedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeMatch {
    pub status: MatchStatus,
    pub node_id: Option<NodeId>,
    pub data: MatchedValue,
}

impl NodeMatch {
    fn missing() -> Self {
        NodeMatch {
            status: MatchStatus::Missing,
            node_id: None,
            data: MatchedValue::None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched
    }
}

/// `matching_id -> NodeMatch` produced by one [`match_node`] call.
pub type ASTIndex = HashMap<u32, NodeMatch>;

/// `SelectAlt(id_a, id_b)`: prefer `id_a`'s match, fall back to `id_b`'s (§4.1).
pub fn select_alt<'a>(index: &'a ASTIndex, id_a: u32, id_b: u32) -> Option<&'a NodeMatch> {
    match index.get(&id_a) {
        Some(m) if m.is_matched() => Some(m),
        _ => index.get(&id_b).filter(|m| m.is_matched()),
    }
}

fn record(index: &mut ASTIndex, matching_id: Option<u32>, result: NodeMatch) {
    if let Some(id) = matching_id {
        index.insert(id, result);
    }
}

/// Marks `matcher` (and everything nested under it) as `Missing` in `index`, without visiting any
/// AST nodes. Used when an expected attribute key is absent from the actual object's children.
fn mark_missing(matcher: &MatcherNode, index: &mut ASTIndex) {
    record(index, matcher.matching_id(), NodeMatch::missing());
    match matcher {
        MatcherNode::Object { fields, .. } => {
            for (_, sub) in fields {
                mark_missing(sub, index);
            }
        }
        MatcherNode::Array { elements, .. } => {
            for sub in elements {
                mark_missing(sub, index);
            }
        }
        MatcherNode::SelectByType { options } => {
            for sub in options {
                mark_missing(sub, index);
            }
        }
        _ => {}
    }
}

/// Matches `matcher` against `node_id`, recording every tagged sub-match into `index`. Returns
/// `true` iff every `matching_id` reachable from `matcher` resolved to `Matched`
/// (`is_full_match`, §4.1).
pub fn match_node(
    program: &Program,
    source: &str,
    node_id: NodeId,
    matcher: &MatcherNode,
    attrs: &mut AttributeIndex,
    index: &mut ASTIndex,
) -> bool {
    let Some(node) = program.node(node_id) else {
        mark_missing(matcher, index);
        return false;
    };

    if let Some(expected) = matcher.expected_node_type() {
        if node.node_type != expected {
            record(
                index,
                matcher.matching_id(),
                NodeMatch {
                    status: MatchStatus::TypeMismatch,
                    node_id: Some(node_id),
                    data: MatchedValue::None,
                },
            );
            if let MatcherNode::Object { fields, .. } = matcher {
                for (_, sub) in fields {
                    mark_missing(sub, index);
                }
            }
            return false;
        }
    }

    match matcher {
        MatcherNode::Object { fields, .. } => {
            record(
                index,
                matcher.matching_id(),
                NodeMatch {
                    status: MatchStatus::Matched,
                    node_id: Some(node_id),
                    data: MatchedValue::None,
                },
            );
            let children = program.children(node);
            let resolved: Vec<Option<NodeId>> = {
                let guard = attrs.scope(node.children_begin_or_value, children);
                fields.iter().map(|(key, _)| guard.get(*key)).collect()
            };
            let mut full = true;
            for ((_, sub), child_id) in fields.iter().zip(resolved) {
                match child_id {
                    Some(child_id) => {
                        if !match_node(program, source, child_id, sub, attrs, index) {
                            full = false;
                        }
                    }
                    None => {
                        mark_missing(sub, index);
                        full = false;
                    }
                }
            }
            full
        }
        MatcherNode::Array { elements, .. } => {
            record(
                index,
                matcher.matching_id(),
                NodeMatch {
                    status: MatchStatus::Matched,
                    node_id: Some(node_id),
                    data: MatchedValue::None,
                },
            );
            let begin = node.children_begin_or_value;
            let count = node.children_count;
            let mut full = true;
            for (i, sub) in elements.iter().enumerate() {
                if (i as u32) < count {
                    if !match_node(program, source, begin + i as u32, sub, attrs, index) {
                        full = false;
                    }
                } else {
                    mark_missing(sub, index);
                    full = false;
                }
            }
            full
        }
        MatcherNode::StringRef { .. } => {
            let text = program.source_text(source, node.location).to_string();
            record(
                index,
                matcher.matching_id(),
                NodeMatch {
                    status: MatchStatus::Matched,
                    node_id: Some(node_id),
                    data: MatchedValue::Str(text),
                },
            );
            true
        }
        MatcherNode::Bool { .. } => {
            record(
                index,
                matcher.matching_id(),
                NodeMatch {
                    status: MatchStatus::Matched,
                    node_id: Some(node_id),
                    data: MatchedValue::Bool(node.value_bool()),
                },
            );
            true
        }
        MatcherNode::Ui32 { .. } | MatcherNode::Ui32Bitmap { .. } => {
            record(
                index,
                matcher.matching_id(),
                NodeMatch {
                    status: MatchStatus::Matched,
                    node_id: Some(node_id),
                    data: MatchedValue::UInt(node.value_ui32()),
                },
            );
            true
        }
        MatcherNode::Enum { .. } => {
            record(
                index,
                matcher.matching_id(),
                NodeMatch {
                    status: MatchStatus::Matched,
                    node_id: Some(node_id),
                    data: MatchedValue::UInt(node.value_ui32()),
                },
            );
            true
        }
        MatcherNode::SelectByType { options } => {
            for option in options {
                if option.expected_node_type() == Some(node.node_type) {
                    return match_node(program, source, node_id, option, attrs, index);
                }
            }
            for option in options {
                mark_missing(option, index);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Location, Node};

    fn string_node(text_loc: (u32, u32), key: AttributeKey) -> Node {
        Node {
            node_type: NodeType::StringRef,
            attribute_key: key,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(text_loc.0, text_loc.1),
        }
    }

    fn object_node(children_begin: u32, children_count: u32) -> Node {
        Node {
            node_type: NodeType::ObjectDashqlFetch,
            attribute_key: AttributeKey::NONE,
            parent: crate::syntax::NO_PARENT,
            children_begin_or_value: children_begin,
            children_count,
            location: Location::new(0, 20),
        }
    }

    #[test]
    fn test_object_matches_child_by_attribute_key() {
        let source = "http://example.com";
        let mut program = Program::default();
        program.nodes.push(object_node(1, 1));
        program
            .nodes
            .push(string_node((0, source.len() as u32), AttributeKey::DASHQL_FETCH_FROM_URI));

        let matcher = MatcherNode::object(
            Some(NodeType::ObjectDashqlFetch),
            vec![(
                AttributeKey::DASHQL_FETCH_FROM_URI,
                MatcherNode::string().with_id(1),
            )],
        );

        let mut attrs = AttributeIndex::new();
        let mut index = ASTIndex::new();
        let full = match_node(&program, source, 0, &matcher, &mut attrs, &mut index);
        assert!(full);
        let m = index.get(&1).unwrap();
        assert!(m.is_matched());
        assert_eq!(m.data.as_str(), Some(source));
    }

    #[test]
    fn test_missing_attribute_is_not_full_match() {
        let mut program = Program::default();
        program.nodes.push(object_node(1, 0));

        let matcher = MatcherNode::object(
            Some(NodeType::ObjectDashqlFetch),
            vec![(
                AttributeKey::DASHQL_FETCH_FROM_URI,
                MatcherNode::string().with_id(1),
            )],
        );
        let mut attrs = AttributeIndex::new();
        let mut index = ASTIndex::new();
        let full = match_node(&program, "", 0, &matcher, &mut attrs, &mut index);
        assert!(!full);
        assert_eq!(index.get(&1).unwrap().status, MatchStatus::Missing);
    }

    #[test]
    fn test_select_alt_prefers_first() {
        let mut index = ASTIndex::new();
        index.insert(
            1,
            NodeMatch {
                status: MatchStatus::Matched,
                node_id: Some(0),
                data: MatchedValue::UInt(3),
            },
        );
        index.insert(
            2,
            NodeMatch {
                status: MatchStatus::Matched,
                node_id: Some(1),
                data: MatchedValue::UInt(4),
            },
        );
        let chosen = select_alt(&index, 1, 2).unwrap();
        assert_eq!(chosen.data.as_uint(), Some(3));
        let fallback = select_alt(&index, 5, 2).unwrap();
        assert_eq!(fallback.data.as_uint(), Some(4));
    }
}
