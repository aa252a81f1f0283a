//! VIZ statement analyzer (§4.4).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::board::CardPositionRequest;
use crate::instance::ProgramInstance;
use crate::linter::LinterMessage;
use crate::matcher::{match_node, ASTIndex, AttributeIndex, MatcherNode};
use crate::syntax::{AttributeKey, NodeType, QualifiedName, StatementId};

use super::read_card_position_request;

const TARGET: u32 = 1;
const COMPONENTS: u32 = 2;

const COMP_TYPE: u32 = 1;
const COMP_MODIFIERS: u32 = 2;
const NESTED_ROW: u32 = 10;
const NESTED_COLUMN: u32 = 11;
const NESTED_WIDTH: u32 = 12;
const NESTED_HEIGHT: u32 = 13;
const FLAT_ROW: u32 = 20;
const FLAT_COLUMN: u32 = 21;
const FLAT_WIDTH: u32 = 22;
const FLAT_HEIGHT: u32 = 23;
const COMP_TITLE: u32 = 30;

/// Ordinal read from an `ENUM_VIZ_COMPONENT_TYPE` node (chart kind: line, bar, table, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VizComponentType(pub u32);

/// One chart/table/etc. making up a VIZ statement (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VizComponent {
    pub component_type: Option<VizComponentType>,
    pub modifiers: u32,
    #[serde(skip)]
    pub requested_position: Option<CardPositionRequest>,
    pub title: Option<String>,
}

/// Typed record produced by the VIZ statement analyzer (§4.4, §3.3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VizStatement {
    pub statement_id: StatementId,
    pub target: QualifiedName,
    pub components: Vec<VizComponent>,
    #[serde(skip)]
    pub requested_position: CardPositionRequest,
    pub specified_position: Option<crate::board::CardPosition>,
    pub title: Option<String>,
}

fn root_matcher() -> MatcherNode {
    MatcherNode::object(
        Some(NodeType::ObjectDashqlViz),
        vec![
            (AttributeKey::DASHQL_VIZ_TARGET, MatcherNode::object(None, vec![]).with_id(TARGET)),
            (AttributeKey::DASHQL_VIZ_COMPONENTS, MatcherNode::array(vec![]).with_id(COMPONENTS)),
        ],
    )
}

fn component_matcher() -> MatcherNode {
    MatcherNode::object(
        Some(NodeType::ObjectDashqlVizComponent),
        vec![
            (
                AttributeKey::DASHQL_VIZ_COMPONENT_TYPE,
                MatcherNode::enum_of(NodeType::EnumVizComponentType).with_id(COMP_TYPE),
            ),
            (
                AttributeKey::DASHQL_VIZ_COMPONENT_MODIFIERS,
                MatcherNode::ui32_bitmap().with_id(COMP_MODIFIERS),
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
            (AttributeKey::DSON_TITLE, MatcherNode::string().with_id(COMP_TITLE)),
        ],
    )
}

/// True iff the per-coordinate matches produced any nonzero or present value at all — used to
/// decide whether a component "carries" a position (§4.4 "Supplemented Detail").
fn component_has_position(index: &ASTIndex) -> bool {
    [NESTED_ROW, NESTED_COLUMN, NESTED_WIDTH, NESTED_HEIGHT, FLAT_ROW, FLAT_COLUMN, FLAT_WIDTH, FLAT_HEIGHT]
        .iter()
        .any(|id| index.get(id).map(|m| m.is_matched()).unwrap_or(false))
}

impl VizStatement {
    /// `read_from(instance, stmt_id)` (§4.4). Only the first component that supplies any
    /// position/title coordinate claims the statement's `specified_position`/`title`; later
    /// components supplying either produce `KEY_NOT_UNIQUE` linter messages (§9 "Supplemented
    /// Detail").
    pub fn read_from(instance: &mut ProgramInstance, stmt_id: StatementId) -> Option<Self> {
        let stmt = instance.program.statements.get(stmt_id as usize)?;
        let root_id = stmt.root_node;
        let root = instance.program.node(root_id)?.clone();
        if root.node_type != NodeType::ObjectDashqlViz {
            return None;
        }

        let program = instance.program.clone();
        let mut attrs = AttributeIndex::new();
        let mut root_index = ASTIndex::new();
        match_node(&program, &instance.text, root_id, &root_matcher(), &mut attrs, &mut root_index);

        let mut target = root_index
            .get(&TARGET)
            .filter(|m| m.is_matched())
            .and_then(|m| m.node_id)
            .map(|id| instance.read_qualified_name(id, true))
            .unwrap_or_default();
        target.index_value.clear();

        let mut components = Vec::new();
        let mut claimed = false;
        let mut requested_position = CardPositionRequest::default();
        let mut title: Option<String> = None;

        if let Some(array_node_id) = root_index.get(&COMPONENTS).filter(|m| m.is_matched()).and_then(|m| m.node_id) {
            if let Some(array_node) = program.node(array_node_id).cloned() {
                let children = program.children(&array_node);
                let begin = array_node.children_begin_or_value;
                for (offset, _) in children.iter().enumerate() {
                    let child_id = begin + offset as u32;
                    let mut comp_index = ASTIndex::new();
                    match_node(&program, &instance.text, child_id, &component_matcher(), &mut attrs, &mut comp_index);

                    let component_type = comp_index
                        .get(&COMP_TYPE)
                        .filter(|m| m.is_matched())
                        .and_then(|m| m.data.as_uint())
                        .map(VizComponentType);
                    let modifiers = comp_index
                        .get(&COMP_MODIFIERS)
                        .filter(|m| m.is_matched())
                        .and_then(|m| m.data.as_uint())
                        .unwrap_or(0);
                    let comp_title = comp_index
                        .get(&COMP_TITLE)
                        .filter(|m| m.is_matched())
                        .and_then(|m| m.data.as_str())
                        .map(|s| s.to_string());
                    let has_position = component_has_position(&comp_index);
                    let comp_position = if has_position {
                        Some(read_card_position_request(
                            &comp_index,
                            [NESTED_ROW, NESTED_COLUMN, NESTED_WIDTH, NESTED_HEIGHT],
                            [FLAT_ROW, FLAT_COLUMN, FLAT_WIDTH, FLAT_HEIGHT],
                        ))
                    } else {
                        None
                    };

                    if has_position || comp_title.is_some() {
                        if !claimed {
                            claimed = true;
                            if let Some(pos) = comp_position {
                                requested_position = pos;
                            }
                            title = comp_title.clone();
                        } else {
                            instance.linter_messages.push(LinterMessage::not_unique(
                                child_id,
                                "only the first VIZ component may specify a position or title",
                            ));
                        }
                    }

                    components.push(VizComponent {
                        component_type,
                        modifiers,
                        requested_position: comp_position,
                        title: comp_title,
                    });
                }
            }
        }

        let title = title.or_else(|| {
            if target.is_empty() {
                None
            } else {
                Some(target.to_pretty_string())
            }
        });

        Some(VizStatement {
            statement_id: stmt_id,
            target,
            components,
            requested_position,
            specified_position: None,
            title,
        })
    }

    /// `print_script(out)` (§4.4, §4.8): re-renders `VIZ <target> USING <components>`. Only the
    /// first component may carry the statement's claimed `specified_position`/title (§4.4), so
    /// only it re-emits a `position = (...)`/`title = '...'` option — mirroring
    /// `InputStatement::print_script`'s position re-emission, extended to the component that
    /// actually owns the position.
    pub fn print_script(&self, out: &mut String) {
        out.push_str("VIZ ");
        out.push_str(&self.target.to_pretty_string());
        out.push_str(" USING");
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push(' ');
            if let Some(component_type) = component.component_type {
                out.push_str(&format!("{}", component_type.0));
            }

            let mut options: Vec<String> = Vec::new();
            if component.modifiers != 0 {
                options.push(format!("modifiers = {}", component.modifiers));
            }
            if i == 0 {
                if let Some(pos) = &self.specified_position {
                    options.push(format!("position = ({}, {}, {}, {})", pos.row, pos.column, pos.width, pos.height));
                }
                if let Some(title) = &component.title {
                    options.push(format!("title = '{}'", title));
                }
            }
            if !options.is_empty() {
                out.push_str(" ( ");
                out.push_str(&options.join(", "));
                out.push_str(" )");
            }
        }
        out.push(';');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ScriptOptions;
    use crate::syntax::{Location, Node, Program, Statement, StatementType, NO_PARENT};
    use std::rc::Rc;

    fn build_viz_with_two_components(second_has_position: bool) -> (ProgramInstance, StatementId) {
        let source = "weather_avg";
        let mut program = Program::default();
        // 0: root VIZ, children: [1: target string, 2: components array]
        program.nodes.push(Node {
            node_type: NodeType::ObjectDashqlViz,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: 2,
            location: Location::new(0, source.len() as u32),
        });
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::DASHQL_VIZ_TARGET,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, source.len() as u32),
        });
        // components array node at idx 2, with children at 3, 4
        program.nodes.push(Node {
            node_type: NodeType::Array,
            attribute_key: AttributeKey::DASHQL_VIZ_COMPONENTS,
            parent: 0,
            children_begin_or_value: 3,
            children_count: 2,
            location: Location::new(0, source.len() as u32),
        });
        // component 0: has a flat row
        program.nodes.push(Node {
            node_type: NodeType::ObjectDashqlVizComponent,
            attribute_key: AttributeKey::NONE,
            parent: 2,
            children_begin_or_value: 5,
            children_count: 1,
            location: Location::new(0, source.len() as u32),
        });
        // component 1: optionally has a flat row too
        program.nodes.push(Node {
            node_type: NodeType::ObjectDashqlVizComponent,
            attribute_key: AttributeKey::NONE,
            parent: 2,
            children_begin_or_value: if second_has_position { 6 } else { 1000 },
            children_count: if second_has_position { 1 } else { 0 },
            location: Location::new(0, source.len() as u32),
        });
        // child of component 0: DSON_ROW = 1
        program.nodes.push(Node {
            node_type: NodeType::Ui32,
            attribute_key: AttributeKey::DSON_ROW,
            parent: 3,
            children_begin_or_value: 1,
            children_count: 0,
            location: Location::new(0, 1),
        });
        if second_has_position {
            program.nodes.push(Node {
                node_type: NodeType::Ui32,
                attribute_key: AttributeKey::DSON_ROW,
                parent: 4,
                children_begin_or_value: 2,
                children_count: 0,
                location: Location::new(0, 1),
            });
        }
        program.statements.push(Statement {
            statement_type: StatementType::Vizualize,
            root_node: 0,
            name: Default::default(),
        });
        let instance = ProgramInstance::empty(Rc::from(source), Rc::new(program), ScriptOptions::default());
        (instance, 0)
    }

    #[test]
    fn test_first_component_claims_position_and_title_falls_back() {
        let (mut instance, stmt_id) = build_viz_with_two_components(false);
        let viz = VizStatement::read_from(&mut instance, stmt_id).unwrap();
        assert_eq!(viz.requested_position.row, 1);
        assert_eq!(viz.title.as_deref(), Some("weather_avg"));
        assert_eq!(instance.linter_messages.len(), 0);
    }

    #[test]
    fn test_second_component_position_is_flagged_not_unique() {
        let (mut instance, stmt_id) = build_viz_with_two_components(true);
        let viz = VizStatement::read_from(&mut instance, stmt_id).unwrap();
        assert_eq!(viz.requested_position.row, 1);
        assert_eq!(instance.linter_messages.len(), 1);
        assert_eq!(
            instance.linter_messages[0].code,
            crate::linter::LinterMessageCode::KeyNotUnique
        );
    }
}
