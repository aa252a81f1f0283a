//! LOAD statement analyzer (§4.4).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::instance::ProgramInstance;
use crate::matcher::{match_node, ASTIndex, AttributeIndex, MatcherNode};
use crate::syntax::{AttributeKey, NodeType, QualifiedName, StatementId};

const METHOD: u32 = 1;
const DATA_SOURCE: u32 = 2;

/// Ordinal read from an `ENUM_LOAD_METHOD` node, or inferred from the data source's file
/// extension when absent (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LoadMethod(pub u32);

impl LoadMethod {
    /// Method inferred for a `.csv` data source when no method was explicitly set.
    pub const JMESPATH: LoadMethod = LoadMethod(0);
}

/// Typed record produced by the LOAD statement analyzer (§4.4, §3.3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatement {
    pub statement_id: StatementId,
    pub method: Option<LoadMethod>,
    pub source: QualifiedName,
}

fn matcher() -> MatcherNode {
    MatcherNode::object(
        Some(NodeType::ObjectDashqlLoad),
        vec![
            (
                AttributeKey::DASHQL_LOAD_METHOD,
                MatcherNode::enum_of(NodeType::EnumLoadMethod).with_id(METHOD),
            ),
            (
                AttributeKey::DASHQL_DATA_SOURCE,
                MatcherNode::object(None, vec![]).with_id(DATA_SOURCE),
            ),
        ],
    )
}

fn extension_of(index_value: &str) -> Option<&str> {
    index_value.rsplit_once('.').map(|(_, ext)| ext)
}

impl LoadStatement {
    /// `read_from(instance, stmt_id)` (§4.4).
    pub fn read_from(instance: &ProgramInstance, stmt_id: StatementId) -> Option<Self> {
        let stmt = instance.program.statements.get(stmt_id as usize)?;
        let root_id = stmt.root_node;
        let root = instance.program.node(root_id)?;
        if root.node_type != NodeType::ObjectDashqlLoad {
            return None;
        }

        let mut attrs = AttributeIndex::new();
        let mut index = ASTIndex::new();
        match_node(&instance.program, &instance.text, root_id, &matcher(), &mut attrs, &mut index);

        let mut method = index
            .get(&METHOD)
            .filter(|m| m.is_matched())
            .and_then(|m| m.data.as_uint())
            .map(LoadMethod);

        let source = index
            .get(&DATA_SOURCE)
            .filter(|m| m.is_matched())
            .and_then(|m| m.node_id)
            .map(|id| instance.read_qualified_name(id, true))
            .unwrap_or_default();

        if method.is_none() {
            if let Some(ext) = extension_of(&source.index_value) {
                if let Some(inferred) = instance.options.load_method_by_extension.get(ext) {
                    method = Some(*inferred);
                }
            }
        }

        Some(LoadStatement {
            statement_id: stmt_id,
            method,
            source,
        })
    }

    pub fn print_script(&self, out: &mut String) {
        out.push_str("LOAD ");
        out.push_str(&self.source.to_pretty_string());
        out.push(';');
    }
}
