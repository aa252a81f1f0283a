//! Constant propagation and input-value substitution (§4.3).

pub mod functions;

use crate::instance::{NodeError, ProgramInstance};
use crate::matcher::{match_node, ASTIndex, AttributeIndex, MatcherNode};
use crate::store::ScalarValue;
use crate::syntax::{AttributeKey, NodeId, NodeType, Program};

const CALL_NAME: u32 = 1;
const CALL_ARGS: u32 = 2;

fn function_call_matcher() -> MatcherNode {
    MatcherNode::object(
        Some(NodeType::ObjectDashqlFunctionCall),
        vec![
            (AttributeKey::SQL_FUNCTION_NAME, MatcherNode::string().with_id(CALL_NAME)),
            (AttributeKey::SQL_FUNCTION_ARGUMENTS, MatcherNode::array(vec![]).with_id(CALL_ARGS)),
        ],
    )
}

/// `propagate_constants(instance)` (§4.3): a post-order walk over every statement's AST, folding
/// leaves and `OBJECT_DASHQL_FUNCTION_CALL` nodes into `instance.evaluated_nodes`.
///
/// Visits children before their parent regardless of how node ids happen to be numbered, so the
/// result does not depend on whether the underlying array was built bottom-up or top-down.
pub fn propagate_constants(instance: &mut ProgramInstance) {
    let program = instance.program.clone();
    let text = instance.text.clone();
    let roots: Vec<NodeId> = program.statements.iter().map(|s| s.root_node).collect();
    for root in roots {
        evaluate_node(instance, &program, &text, root);
    }
}

fn evaluate_node(instance: &mut ProgramInstance, program: &Program, source: &str, node_id: NodeId) {
    let Some(node) = program.node(node_id).cloned() else {
        return;
    };
    if !node.is_leaf() {
        for child_id in node.children_begin_or_value..node.children_end() {
            evaluate_node(instance, program, source, child_id);
        }
    }

    match node.node_type {
        NodeType::Bool | NodeType::Ui32 | NodeType::Ui32Bitmap | NodeType::StringRef => {
            let text = program.source_text(source, node.location).to_string();
            instance.evaluated_nodes.insert(node_id, ScalarValue::Utf8(text));
        }
        NodeType::ObjectDashqlFunctionCall => evaluate_function_call(instance, program, source, node_id),
        _ => {}
    }
}

fn evaluate_function_call(instance: &mut ProgramInstance, program: &Program, source: &str, node_id: NodeId) {
    let mut attrs = AttributeIndex::new();
    let mut index = ASTIndex::new();
    match_node(program, source, node_id, &function_call_matcher(), &mut attrs, &mut index);

    let Some(name) = index
        .get(&CALL_NAME)
        .filter(|m| m.is_matched())
        .and_then(|m| m.data.as_str())
        .map(|s| s.to_string())
    else {
        return;
    };
    let Some(args_node_id) = index.get(&CALL_ARGS).filter(|m| m.is_matched()).and_then(|m| m.node_id) else {
        return;
    };
    let Some(args_node) = program.node(args_node_id) else {
        return;
    };
    let arg_ids: Vec<NodeId> = (args_node.children_begin_or_value..args_node.children_end()).collect();

    let mut arg_values = Vec::with_capacity(arg_ids.len());
    for &arg_id in &arg_ids {
        match instance.evaluated_nodes.find(arg_id) {
            Some(value) => arg_values.push(value.scalar_value.clone()),
            // One argument did not fold to a constant: the call as a whole is not constant.
            None => return,
        }
    }

    match functions::call(&name, &arg_values) {
        Ok(result) => {
            instance.evaluated_nodes.merge(node_id, &arg_ids, result);
        }
        Err(err) => {
            instance.node_errors.push(NodeError {
                node_id,
                message: err.to_string(),
            });
        }
    }
}

/// `evaluate_input_values(instance)` (§4.3): writes each collected input value into the union of
/// the AST node that referenced it, found via the matching `TABLE_REF`/`COLUMN_REF` dependency's
/// causing node.
pub fn evaluate_input_values(instance: &mut ProgramInstance) {
    let program = instance.program.clone();
    let input_values = instance.input_values.clone();
    for (source_statement, value) in input_values {
        for dep in program.dependencies.iter().filter(|d| d.source_statement == source_statement) {
            instance.evaluated_nodes.insert(dep.causing_node, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ScriptOptions;
    use crate::syntax::{
        AttributeKey, Dependency, DependencyKind, Location, Node, Program, Statement, StatementType, NO_PARENT,
    };
    use std::rc::Rc;

    #[test]
    fn test_leaf_interned_as_source_text() {
        let source = "42";
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::Ui32,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 42,
            children_count: 0,
            location: Location::new(0, 2),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Set,
            root_node: 0,
            name: Default::default(),
        });
        let mut instance = ProgramInstance::empty(Rc::from(source), Rc::new(program), ScriptOptions::default());
        propagate_constants(&mut instance);
        assert_eq!(
            instance.evaluated_nodes.find(0).unwrap().scalar_value,
            ScalarValue::Utf8("42".to_string())
        );
    }

    #[test]
    fn test_function_call_folds_when_all_arguments_constant() {
        let source = "format('{}', 'x')";
        let mut program = Program::default();
        // 0: call, children [1: name, 2: args array]
        program.nodes.push(Node {
            node_type: NodeType::ObjectDashqlFunctionCall,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: 2,
            location: Location::new(0, source.len() as u32),
        });
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::SQL_FUNCTION_NAME,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 6),
        });
        program.nodes.push(Node {
            node_type: NodeType::Array,
            attribute_key: AttributeKey::SQL_FUNCTION_ARGUMENTS,
            parent: 0,
            children_begin_or_value: 3,
            children_count: 2,
            location: Location::new(7, 9),
        });
        // StringRef locations exclude the surrounding quote characters, matching how the rest of
        // this core's fixtures slice identifiers and literals out of source text.
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: 2,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(8, 2),
        });
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: 2,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(14, 1),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Set,
            root_node: 0,
            name: Default::default(),
        });
        let mut instance = ProgramInstance::empty(Rc::from(source), Rc::new(program), ScriptOptions::default());
        propagate_constants(&mut instance);
        let folded = instance.evaluated_nodes.find(0).unwrap();
        assert_eq!(folded.scalar_value, ScalarValue::Utf8("x".to_string()));
    }

    #[test]
    fn test_evaluate_input_values_writes_into_dependency_causing_node() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 0),
        });
        program.dependencies.push(Dependency {
            kind: DependencyKind::ColumnRef,
            source_statement: 0,
            target_statement: 1,
            causing_node: 0,
        });
        let mut instance = ProgramInstance::empty(Rc::from(""), Rc::new(program), ScriptOptions::default());
        instance.input_values.push((0, ScalarValue::I64(7)));
        evaluate_input_values(&mut instance);
        assert_eq!(instance.evaluated_nodes.find(0).unwrap().scalar_value, ScalarValue::I64(7));
    }
}
