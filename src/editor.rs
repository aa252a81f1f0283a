//! Program editor (§4.8): applies typed, per-statement edits on top of a program's source text
//! without needing a live [`crate::instance::ProgramInstance`] — only the parsed `Program`, its
//! source text, and the caller's [`ScriptOptions`] (the same three inputs `instantiate_program`
//! takes) are required, since editing only reads a statement's analyzer record and re-renders it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::board::CardPosition;
use crate::buffer::SubstringBuffer;
use crate::error::AnalyzerError;
use crate::instance::ProgramInstance;
use crate::options::ScriptOptions;
use crate::stmt::{InputStatement, VizStatement};
use crate::syntax::{Program, StatementId, StatementType};

/// A single typed edit targeting one statement (§4.8). `CardPositionUpdate` is the only
/// recognized variant in this core; it applies to INPUT and VIZ statements (§4.4.1, §8 scenario
/// B).
#[derive(Debug, Clone, Copy)]
pub enum EditOperation {
    CardPositionUpdate { statement_id: StatementId, position: CardPosition },
}

impl EditOperation {
    fn statement_id(&self) -> StatementId {
        match self {
            EditOperation::CardPositionUpdate { statement_id, .. } => *statement_id,
        }
    }
}

/// Applies `edits` to `program`/`text` and returns the rewritten source (§4.8). Edits are
/// grouped by statement id; within a group, each edit is applied to the same analyzer record in
/// order before the statement is re-rendered once via `print_script` and spliced into a
/// [`SubstringBuffer`] over the full source. The caller is expected to re-parse and
/// re-instantiate the returned text (§4.9 `edit_program`).
pub fn apply_edits(
    program: Rc<Program>,
    text: Rc<str>,
    options: &ScriptOptions,
    edits: &[EditOperation],
) -> Result<String, AnalyzerError> {
    let mut by_statement: HashMap<StatementId, Vec<&EditOperation>> = HashMap::new();
    for edit in edits {
        by_statement.entry(edit.statement_id()).or_default().push(edit);
    }

    // A scratch instance purely to drive `read_from`: it carries no evaluated constants or
    // liveness, since neither INPUT's nor VIZ's analyzer reads them.
    let mut scratch = ProgramInstance::empty(text.clone(), program.clone(), options.clone());
    let mut buffer = SubstringBuffer::new(&text);

    let mut stmt_ids: Vec<StatementId> = by_statement.keys().copied().collect();
    stmt_ids.sort_unstable();

    for stmt_id in stmt_ids {
        let stmt = scratch
            .program
            .statements
            .get(stmt_id as usize)
            .ok_or_else(|| AnalyzerError::invalid(format!("no statement {stmt_id}")))?
            .clone();
        let root_loc = scratch
            .program
            .node(stmt.root_node)
            .ok_or_else(|| AnalyzerError::invalid(format!("statement {stmt_id} has no root node")))?
            .location;

        let mut rendered = String::new();
        match stmt.statement_type {
            StatementType::Input => {
                let mut record = InputStatement::read_from(&scratch, stmt_id).ok_or_else(|| {
                    AnalyzerError::invalid(format!("statement {stmt_id} is not an INPUT statement"))
                })?;
                for edit in &by_statement[&stmt_id] {
                    apply_card_position(&mut record.specified_position, edit);
                }
                record.print_script(&mut rendered);
            }
            StatementType::Vizualize => {
                let mut record = VizStatement::read_from(&mut scratch, stmt_id).ok_or_else(|| {
                    AnalyzerError::invalid(format!("statement {stmt_id} is not a VIZ statement"))
                })?;
                for edit in &by_statement[&stmt_id] {
                    apply_card_position(&mut record.specified_position, edit);
                }
                record.print_script(&mut rendered);
            }
            other => {
                return Err(AnalyzerError::invalid(format!(
                    "statement {stmt_id} of type {other:?} does not support editing"
                )))
            }
        }

        buffer.replace(root_loc, &rendered);
    }

    Ok(buffer.finish())
}

fn apply_card_position(slot: &mut Option<CardPosition>, edit: &EditOperation) {
    match edit {
        EditOperation::CardPositionUpdate { position, .. } => *slot = Some(*position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{AttributeKey, Location, Node, Statement, NO_PARENT};

    fn build_single_input(source: &str) -> (Rc<Program>, Rc<str>) {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::ObjectDashqlInput,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: 1,
            location: Location::new(0, source.len() as u32),
        });
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::StringRef,
            attribute_key: AttributeKey::DASHQL_STATEMENT_NAME,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(6, 15),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Input,
            root_node: 0,
            name: Default::default(),
        });
        (Rc::new(program), Rc::from(source))
    }

    #[test]
    fn test_scenario_b_card_position_update_round_trips() {
        let (program, text) = build_single_input("INPUT weather_country");
        let options = ScriptOptions::default();
        let edits = [EditOperation::CardPositionUpdate {
            statement_id: 0,
            position: CardPosition { row: 1, column: 2, width: 3, height: 4 },
        }];
        let rewritten = apply_edits(program, text, &options, &edits).unwrap();
        assert!(rewritten.contains("position = (1, 2, 3, 4)"));
    }

    /// `VIZ weather_avg USING LINE;` with a single, position-less component — the AST shape a
    /// parsed `VIZ ... USING LINE` statement would have.
    fn build_single_viz(source: &str) -> (Rc<Program>, Rc<str>) {
        let mut program = Program::default();
        // 0: root VIZ, children [1: target string, 2: components array]
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::ObjectDashqlViz,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: 2,
            location: Location::new(0, source.len() as u32),
        });
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::StringRef,
            attribute_key: AttributeKey::DASHQL_VIZ_TARGET,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(4, 11),
        });
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::Array,
            attribute_key: AttributeKey::DASHQL_VIZ_COMPONENTS,
            parent: 0,
            children_begin_or_value: 3,
            children_count: 1,
            location: Location::new(0, source.len() as u32),
        });
        // 3: the one component, carrying no position/title of its own.
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::ObjectDashqlVizComponent,
            attribute_key: AttributeKey::NONE,
            parent: 2,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, source.len() as u32),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Vizualize,
            root_node: 0,
            name: Default::default(),
        });
        (Rc::new(program), Rc::from(source))
    }

    #[test]
    fn test_scenario_b_viz_card_position_update_round_trips() {
        let (program, text) = build_single_viz("VIZ weather_avg USING LINE");
        let options = ScriptOptions::default();
        let edits = [EditOperation::CardPositionUpdate {
            statement_id: 0,
            position: CardPosition { row: 1, column: 2, width: 3, height: 4 },
        }];
        let rewritten = apply_edits(program, text, &options, &edits).unwrap();
        assert!(rewritten.contains("position = (1, 2, 3, 4)"));
    }

    #[test]
    fn test_editing_unrecognized_statement_type_errors() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::ObjectDashqlSet,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 0),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Set,
            root_node: 0,
            name: Default::default(),
        });
        let options = ScriptOptions::default();
        let edits = [EditOperation::CardPositionUpdate {
            statement_id: 0,
            position: CardPosition { row: 0, column: 0, width: 0, height: 0 },
        }];
        let result = apply_edits(Rc::new(program), Rc::from(""), &options, &edits);
        assert!(result.is_err());
    }

    #[test]
    fn test_applying_same_position_twice_is_idempotent() {
        // Editing a position twice to the same value (§8 property 2) — re-applied against the
        // same starting program/text, not chained, since chaining requires the caller's re-parse
        // step between edits.
        let (program, text) = build_single_input("INPUT weather_country");
        let options = ScriptOptions::default();
        let edits = [EditOperation::CardPositionUpdate {
            statement_id: 0,
            position: CardPosition { row: 1, column: 2, width: 3, height: 4 },
        }];
        let first = apply_edits(program.clone(), text.clone(), &options, &edits).unwrap();
        let second = apply_edits(program, text, &options, &edits).unwrap();
        assert_eq!(first, second);
    }
}
