//! The AST and program data model (§3.1, §3.2) — read-only input to the rest of the analyzer.

mod node;
mod program;

pub use node::{
    AttributeKey, Location, Node, NodeId, NodeType, DSON_DYNAMIC_KEYS_, DSON_KEYS_, NO_PARENT,
};
pub use program::{
    Comment, Dependency, DependencyKind, LineBreak, ParserError, Program, QualifiedName,
    Statement, StatementId, StatementType,
};
