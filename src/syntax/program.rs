//! Program-level structure sitting on top of the flat AST (§3.2).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::node::{Location, Node, NodeId};

/// What kind of top-level construct a [`Statement`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementType {
    None,
    Set,
    Vizualize,
    Fetch,
    Load,
    Input,
    Select,
    SelectInto,
    CreateTable,
    CreateTableAs,
    CreateView,
}

/// `{catalog, schema, relation, index_value}`, all text slices resolved against source (§3.2,
/// §4.2 `read_qualified_name`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub catalog: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub index_value: String,
}

impl QualifiedName {
    pub fn relation_only(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            ..Default::default()
        }
    }

    /// Bare relation name with no catalog/schema/index qualification, used as a VIZ card's
    /// fallback title when no explicit title is present.
    pub fn to_pretty_string(&self) -> String {
        self.relation.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
            && self.schema.is_empty()
            && self.relation.is_empty()
            && self.index_value.is_empty()
    }
}

/// One top-level statement: its kind, its AST root, and its resolved target name (§3.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub statement_type: StatementType,
    pub root_node: NodeId,
    pub name: QualifiedName,
}

/// Identifies which AST node introduced an inter-statement dependency (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyKind {
    TableRef,
    ColumnRef,
}

pub type StatementId = u32;

/// An edge between two statements discovered while resolving a reference (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub kind: DependencyKind,
    pub source_statement: StatementId,
    pub target_statement: StatementId,
    /// The AST node that caused this dependency (e.g. the table-ref node under the consuming
    /// statement).
    pub causing_node: NodeId,
}

/// A parser-level diagnostic attached to the [`Program`], distinct from the per-node errors a
/// [`crate::instance::ProgramInstance`] accumulates during analysis (§7 layer 1 vs layer 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParserError {
    pub location: Location,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineBreak {
    pub offset: u32,
}

/// The parsed program: the AST nodes, the statement list, inter-statement dependencies, and
/// parse-time diagnostics (§3.2). Read-only input to [`crate::instance::ProgramInstance`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub nodes: Vec<Node>,
    pub statements: Vec<Statement>,
    pub dependencies: Vec<Dependency>,
    pub errors: Vec<ParserError>,
    pub comments: Vec<Comment>,
    pub line_breaks: Vec<LineBreak>,
    /// Attribute keys discovered in source text beyond the static [`super::node::AttributeKey`]
    /// enumeration, in order of first appearance (§3.2, §6.4).
    pub dynamic_dson_keys: Vec<String>,
}

impl Program {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    pub fn children(&self, node: &Node) -> &[Node] {
        let begin = node.children_begin_or_value as usize;
        let end = node.children_end() as usize;
        &self.nodes[begin.min(self.nodes.len())..end.min(self.nodes.len())]
    }

    pub fn statement_node<'a>(&'a self, stmt: &Statement) -> Option<&'a Node> {
        self.node(stmt.root_node)
    }

    pub fn source_text<'a>(&self, source: &'a str, loc: Location) -> &'a str {
        let begin = loc.offset as usize;
        let end = loc.end() as usize;
        &source[begin.min(source.len())..end.min(source.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_pretty_string_drops_index() {
        let name = QualifiedName {
            catalog: String::new(),
            schema: "public".into(),
            relation: "weather".into(),
            index_value: "3".into(),
        };
        assert_eq!(name.to_pretty_string(), "weather");
    }

    #[test]
    fn test_qualified_name_is_empty() {
        assert!(QualifiedName::default().is_empty());
        assert!(!QualifiedName::relation_only("t").is_empty());
    }
}
