//! The annotated program instance: node-value store, per-statement analyzer records, liveness,
//! and diagnostics (§3.3, §4.2).

use std::rc::Rc;

use crate::dson::DsonDictionary;
use crate::linter::LinterMessage;
use crate::options::ScriptOptions;
use crate::store::{NodeValue, ScalarValue, SparseUnionFind};
use crate::stmt::{FetchStatement, InputStatement, LoadStatement, SetStatement, VizStatement};
use crate::syntax::{AttributeKey, NodeId, NodeType, Program, QualifiedName, StatementId};

/// A localized, non-fatal problem discovered while evaluating one node (§7 layer 2). Does not
/// fail the whole instantiation; constant propagation simply stops at the faulty subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    pub node_id: NodeId,
    pub message: String,
}

/// The annotated AST plus per-statement semantic records (§3.3).
///
/// Built once by [`crate::facade::Analyzer::instantiate_program`] and logically immutable
/// afterwards except for lazy path compression inside `evaluated_nodes`. `Clone` is cheap enough
/// to use for the façade's rotating instance log and planned-program snapshot (§4.9): `text` and
/// `program` are reference-counted, and the per-statement analyzer records are themselves small.
#[derive(Clone)]
pub struct ProgramInstance {
    pub text: Rc<str>,
    pub program: Rc<Program>,
    pub options: ScriptOptions,

    pub input_values: Vec<(StatementId, ScalarValue)>,
    pub evaluated_nodes: SparseUnionFind,
    pub node_errors: Vec<NodeError>,
    pub linter_messages: Vec<LinterMessage>,
    pub statements_liveness: Vec<bool>,

    pub input: Vec<InputStatement>,
    pub fetch: Vec<FetchStatement>,
    pub set: Vec<SetStatement>,
    pub load: Vec<LoadStatement>,
    pub viz: Vec<VizStatement>,

    pub dson_dictionary: DsonDictionary,
}

impl ProgramInstance {
    pub fn empty(text: Rc<str>, program: Rc<Program>, options: ScriptOptions) -> Self {
        let dson_dictionary = DsonDictionary::from_program(&program);
        ProgramInstance {
            text,
            program,
            options,
            input_values: Vec::new(),
            evaluated_nodes: SparseUnionFind::new(),
            node_errors: Vec::new(),
            linter_messages: Vec::new(),
            statements_liveness: Vec::new(),
            input: Vec::new(),
            fetch: Vec::new(),
            set: Vec::new(),
            load: Vec::new(),
            viz: Vec::new(),
            dson_dictionary,
        }
    }

    /// `read_node_value(node_id)` (§4.2): the union's interned value, or a scalar materialized
    /// directly from the node's own shape if nothing was interned, or null.
    pub fn read_node_value(&mut self, node_id: NodeId) -> ScalarValue {
        if let Some(NodeValue { scalar_value, .. }) = self.evaluated_nodes.find(node_id) {
            return scalar_value.clone();
        }
        let Some(node) = self.program.node(node_id).cloned() else {
            return ScalarValue::Null;
        };
        match node.node_type {
            NodeType::Bool => ScalarValue::Bool(node.value_bool()),
            NodeType::Ui32 | NodeType::Ui32Bitmap => ScalarValue::I64(node.value_ui32() as i64),
            NodeType::StringRef => {
                ScalarValue::Utf8(self.program.source_text(&self.text, node.location).to_string())
            }
            _ => ScalarValue::Null,
        }
    }

    /// `read_qualified_name(node_id, lift_global)` (§4.2), recovering the exact recursive rules
    /// of `qualified_name.cc`.
    pub fn read_qualified_name(&self, node_id: NodeId, lift_global: bool) -> QualifiedName {
        let mut name = self.read_qualified_name_inner(node_id);
        if lift_global && name.schema.is_empty() {
            name.schema = self.options.global_namespace.clone();
        }
        name
    }

    fn read_qualified_name_inner(&self, node_id: NodeId) -> QualifiedName {
        let Some(node) = self.program.node(node_id) else {
            return QualifiedName::default();
        };
        match node.node_type {
            NodeType::StringRef => {
                let text = self.program.source_text(&self.text, node.location);
                QualifiedName::relation_only(trim_quotes(text))
            }
            NodeType::Array => {
                let children = self.program.children(node);
                let segments: Vec<String> = children
                    .iter()
                    .filter(|c| c.node_type == NodeType::StringRef)
                    .map(|c| trim_quotes(self.program.source_text(&self.text, c.location)))
                    .collect();
                match segments.len() {
                    1 => QualifiedName::relation_only(segments[0].clone()),
                    2 => QualifiedName {
                        schema: segments[0].clone(),
                        relation: segments[1].clone(),
                        ..Default::default()
                    },
                    3 => QualifiedName {
                        catalog: segments[0].clone(),
                        schema: segments[1].clone(),
                        relation: segments[2].clone(),
                        ..Default::default()
                    },
                    _ => QualifiedName::default(),
                }
            }
            NodeType::ObjectSqlTableRef => {
                let children = self.program.children(node);
                let begin = node.children_begin_or_value;
                let table_name_idx = children
                    .iter()
                    .position(|c| c.attribute_key == AttributeKey::SQL_TABLE_NAME);
                let mut name = table_name_idx
                    .map(|i| self.read_qualified_name_inner(begin + i as u32))
                    .unwrap_or_default();
                let index_idx = children.iter().position(|c| {
                    c.node_type == NodeType::ObjectSqlIndirectionIndex
                });
                if let Some(i) = index_idx {
                    let index_node_id = begin + i as u32;
                    if let Some(index_node) = self.program.node(index_node_id) {
                        let index_children = self.program.children(index_node);
                        let index_begin = index_node.children_begin_or_value;
                        if let Some(vi) = index_children.iter().position(|c| {
                            c.attribute_key == AttributeKey::SQL_INDIRECTION_INDEX_VALUE
                        }) {
                            if let Some(value_node) = self.program.node(index_begin + vi as u32) {
                                name.index_value = trim_quotes(
                                    self.program.source_text(&self.text, value_node.location),
                                );
                            }
                        }
                    }
                }
                // `lift_global` is only applied by the recursing `OBJECT_SQL_TABLE_REF` rule;
                // the outer public `read_qualified_name` applies it once at the top level too.
                if name.schema.is_empty() {
                    name.schema = self.options.global_namespace.clone();
                }
                name
            }
            _ => QualifiedName::default(),
        }
    }
}

fn trim_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Location, Node, NO_PARENT};

    fn mk_instance(program: Program, text: &str) -> ProgramInstance {
        ProgramInstance::empty(Rc::from(text), Rc::new(program), ScriptOptions::default())
    }

    #[test]
    fn test_read_node_value_materializes_string_ref() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 5),
        });
        let mut instance = mk_instance(program, "hello world");
        assert_eq!(instance.read_node_value(0), ScalarValue::Utf8("hello".into()));
    }

    #[test]
    fn test_read_node_value_prefers_interned_value() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 5),
        });
        let mut instance = mk_instance(program, "hello");
        instance.evaluated_nodes.insert(0, ScalarValue::I32(42));
        assert_eq!(instance.read_node_value(0), ScalarValue::I32(42));
    }

    #[test]
    fn test_read_qualified_name_single_string() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 7),
        });
        let instance = mk_instance(program, "weather");
        let name = instance.read_qualified_name(0, false);
        assert_eq!(name.relation, "weather");
        assert!(name.schema.is_empty());
    }

    #[test]
    fn test_read_qualified_name_lifts_global_when_schema_empty() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 7),
        });
        let instance = mk_instance(program, "weather");
        let name = instance.read_qualified_name(0, true);
        assert_eq!(name.schema, "global");
    }

    #[test]
    fn test_read_qualified_name_array_two_segments() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::Array,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: 2,
            location: Location::new(0, 20),
        });
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(0, 6),
        });
        program.nodes.push(Node {
            node_type: NodeType::StringRef,
            attribute_key: AttributeKey::NONE,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(7, 7),
        });
        let instance = mk_instance(program, "public.weather");
        let name = instance.read_qualified_name(0, false);
        assert_eq!(name.schema, "public");
        assert_eq!(name.relation, "weather");
    }
}
