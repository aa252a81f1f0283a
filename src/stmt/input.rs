//! INPUT statement analyzer (§4.4).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::board::{CardPosition, CardPositionRequest};
use crate::instance::ProgramInstance;
use crate::matcher::{match_node, ASTIndex, AttributeIndex, MatcherNode};
use crate::syntax::{AttributeKey, NodeType, StatementId};

use super::{read_card_position_request, read_type_name};

const COMPONENT_TYPE: u32 = 1;
const VALUE_TYPE: u32 = 2;
const NAME: u32 = 3;
const NESTED_ROW: u32 = 10;
const NESTED_COLUMN: u32 = 11;
const NESTED_WIDTH: u32 = 12;
const NESTED_HEIGHT: u32 = 13;
const FLAT_ROW: u32 = 20;
const FLAT_COLUMN: u32 = 21;
const FLAT_WIDTH: u32 = 22;
const FLAT_HEIGHT: u32 = 23;
const TITLE: u32 = 30;

/// An ordinal read from an `ENUM_INPUT_COMPONENT_TYPE` node; the taxonomy of component kinds
/// (text field, slider, dropdown, ...) is an external collaborator detail this core does not
/// need to name to plan and render statements correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct InputComponentType(pub u32);

/// Typed record produced by the INPUT statement analyzer (§4.4, §3.3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputStatement {
    pub statement_id: StatementId,
    pub component_type: Option<InputComponentType>,
    pub value_type: Option<String>,
    pub name: Option<String>,
    #[serde(skip)]
    pub requested_position: CardPositionRequest,
    pub specified_position: Option<CardPosition>,
    pub title: Option<String>,
}

fn matcher() -> MatcherNode {
    MatcherNode::object(
        Some(NodeType::ObjectDashqlInput),
        vec![
            (
                AttributeKey::DASHQL_INPUT_COMPONENT_TYPE,
                MatcherNode::enum_of(NodeType::EnumInputComponentType).with_id(COMPONENT_TYPE),
            ),
            (
                AttributeKey::DASHQL_INPUT_VALUE_TYPE,
                MatcherNode::object(None, vec![]).with_id(VALUE_TYPE),
            ),
            (
                AttributeKey::DASHQL_STATEMENT_NAME,
                MatcherNode::string().with_id(NAME),
            ),
            (
                AttributeKey::DSON_POSITION,
                MatcherNode::object(
                    Some(NodeType::ObjectDsonPosition),
                    vec![
                        (AttributeKey::DSON_POSITION_ROW, MatcherNode::ui32().with_id(NESTED_ROW)),
                        (
                            AttributeKey::DSON_POSITION_COLUMN,
                            MatcherNode::ui32().with_id(NESTED_COLUMN),
                        ),
                        (
                            AttributeKey::DSON_POSITION_WIDTH,
                            MatcherNode::ui32().with_id(NESTED_WIDTH),
                        ),
                        (
                            AttributeKey::DSON_POSITION_HEIGHT,
                            MatcherNode::ui32().with_id(NESTED_HEIGHT),
                        ),
                    ],
                ),
            ),
            (AttributeKey::DSON_ROW, MatcherNode::ui32().with_id(FLAT_ROW)),
            (AttributeKey::DSON_COLUMN, MatcherNode::ui32().with_id(FLAT_COLUMN)),
            (AttributeKey::DSON_WIDTH, MatcherNode::ui32().with_id(FLAT_WIDTH)),
            (AttributeKey::DSON_HEIGHT, MatcherNode::ui32().with_id(FLAT_HEIGHT)),
            (AttributeKey::DSON_TITLE, MatcherNode::string().with_id(TITLE)),
        ],
    )
}

impl InputStatement {
    /// `read_from(instance, stmt_id)` (§4.4): `None` if the statement root does not match the
    /// INPUT schema at all (wrong node type).
    pub fn read_from(instance: &ProgramInstance, stmt_id: StatementId) -> Option<Self> {
        let stmt = instance.program.statements.get(stmt_id as usize)?;
        let root_id = stmt.root_node;
        let root = instance.program.node(root_id)?;
        if root.node_type != NodeType::ObjectDashqlInput {
            return None;
        }

        let mut attrs = AttributeIndex::new();
        let mut index = ASTIndex::new();
        match_node(&instance.program, &instance.text, root_id, &matcher(), &mut attrs, &mut index);

        let component_type = index
            .get(&COMPONENT_TYPE)
            .filter(|m| m.is_matched())
            .and_then(|m| m.data.as_uint())
            .map(InputComponentType);

        let value_type = index
            .get(&VALUE_TYPE)
            .filter(|m| m.is_matched())
            .and_then(|m| m.node_id)
            .and_then(|id| instance.program.node(id))
            .and_then(|n| read_type_name(&instance.program, &instance.text, n));

        let name = index
            .get(&NAME)
            .filter(|m| m.is_matched())
            .and_then(|m| m.data.as_str())
            .map(|s| s.to_string());

        let title = index
            .get(&TITLE)
            .filter(|m| m.is_matched())
            .and_then(|m| m.data.as_str())
            .map(|s| s.to_string());

        let requested_position = read_card_position_request(
            &index,
            [NESTED_ROW, NESTED_COLUMN, NESTED_WIDTH, NESTED_HEIGHT],
            [FLAT_ROW, FLAT_COLUMN, FLAT_WIDTH, FLAT_HEIGHT],
        );

        Some(InputStatement {
            statement_id: stmt_id,
            component_type,
            value_type,
            name,
            requested_position,
            specified_position: None,
            title,
        })
    }

    /// `print_script(out)` (§4.4, §4.8): re-renders the statement's DSON options verbatim; the
    /// editor overlays position/title updates on top via the substring buffer, so this baseline
    /// render only needs to be a stable textual form, not a pretty-printer.
    pub fn print_script(&self, out: &mut String) {
        out.push_str("INPUT ");
        if let Some(name) = &self.name {
            out.push_str(name);
        }
        if let Some(pos) = &self.specified_position {
            out.push_str(&format!(
                " ( position = ({}, {}, {}, {}) )",
                pos.row, pos.column, pos.width, pos.height
            ));
        }
        out.push(';');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ScriptOptions;
    use crate::syntax::{AttributeKey, Location, Node, Program, Statement, StatementType, NO_PARENT};
    use std::rc::Rc;

    fn build_simple_input() -> (ProgramInstance, StatementId) {
        let source = "weather_country 5";
        let mut program = Program::default();
        // root: OBJECT_DASHQL_INPUT with one child: DASHQL_STATEMENT_NAME string ref
        program.nodes.push(Node {
            node_type: NodeType::ObjectDashqlInput,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: 1,
            location: Location::new(0, source.len() as u32),
        });
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::DASHQL_STATEMENT_NAME,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 15),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Input,
            root_node: 0,
            name: Default::default(),
        });
        let instance = ProgramInstance::empty(Rc::from(source), Rc::new(program), ScriptOptions::default());
        (instance, 0)
    }

    #[test]
    fn test_read_from_extracts_name() {
        let (instance, stmt_id) = build_simple_input();
        let input = InputStatement::read_from(&instance, stmt_id).unwrap();
        assert_eq!(input.name.as_deref(), Some("weather_country"));
        assert_eq!(input.requested_position, CardPositionRequest::default());
    }

    #[test]
    fn test_read_from_rejects_wrong_root_type() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::ObjectDashqlSet,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 0),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Input,
            root_node: 0,
            name: Default::default(),
        });
        let instance = ProgramInstance::empty(Rc::from(""), Rc::new(program), ScriptOptions::default());
        assert!(InputStatement::read_from(&instance, 0).is_none());
    }
}
