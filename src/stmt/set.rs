//! SET statement analyzer (§4.4).
//!
//! SET carries a raw DSON payload with no statement-specific schema; the analyzer's only job is
//! to capture it for verbatim re-rendering.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::instance::ProgramInstance;
use crate::syntax::{NodeType, StatementId};

/// Typed record produced by the SET statement analyzer (§4.4, §3.3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetStatement {
    pub statement_id: StatementId,
    pub raw_dson: String,
}

impl SetStatement {
    pub fn read_from(instance: &ProgramInstance, stmt_id: StatementId) -> Option<Self> {
        let stmt = instance.program.statements.get(stmt_id as usize)?;
        let root = instance.program.node(stmt.root_node)?;
        if root.node_type != NodeType::ObjectDashqlSet {
            return None;
        }
        let raw_dson = instance.program.source_text(&instance.text, root.location).to_string();
        Some(SetStatement {
            statement_id: stmt_id,
            raw_dson,
        })
    }

    pub fn print_script(&self, out: &mut String) {
        out.push_str("SET ");
        out.push_str(&self.raw_dson);
        out.push(';');
    }
}
