//! DashQL analysis core: the annotated program instance, constant propagation, statement
//! analyzers, the statement diff, and the incremental task planner (spec §1-§4).
//!
//! The external grammar/tokenizer, the on-disk serialization format, the dashboard-layout
//! allocator's concrete implementation, and the downstream executor are out of scope (§1); this
//! crate models their interfaces only where the core actually calls through them (§6).

pub mod board;
pub mod buffer;
pub mod diff;
pub mod dson;
pub mod editor;
pub mod error;
pub mod eval;
pub mod facade;
pub mod instance;
pub mod linter;
pub mod liveness;
pub mod matcher;
pub mod options;
pub mod plan;
pub mod response;
pub mod stmt;
pub mod store;
pub mod syntax;

pub use diff::{DiffCode, DiffOp, ProgramMatcher, StatementSimilarity};
pub use editor::{apply_edits, EditOperation};
pub use error::AnalyzerError;
pub use eval::{evaluate_input_values, propagate_constants};
pub use facade::{Analyzer, TaskClass};
pub use instance::{NodeError, ProgramInstance};
pub use liveness::compute_liveness;
pub use options::ScriptOptions;
pub use plan::{ObjectId, ProgramTask, ProgramTaskType, SetupTask, SetupTaskType, TaskGraph, TaskId, TaskPlanner, TaskStatusCode};
pub use response::{Response, Status};
pub use store::ScalarValue;
pub use syntax::{
    AttributeKey, Dependency, DependencyKind, Node, NodeId, NodeType, Program, QualifiedName,
    Statement, StatementId, StatementType,
};
