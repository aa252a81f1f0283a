//! Linter diagnostics accumulated during statement analysis (§7 layer 3).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::syntax::NodeId;

/// Linter diagnostic codes (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinterMessageCode {
    /// A DSON key has a recognized alternative spelling that was used instead of the canonical
    /// one (e.g. `colour` for `color`).
    KeyAlternative,
    /// A DSON key matches a known option but in an unexpected letter case/style.
    KeyAlternativeStyle,
    /// Two attributes convey the same setting; one is redundant (FETCH `url` option when
    /// `FROM_URI` is already explicit, §4.4).
    KeyRedundant,
    /// A position/title attribute was supplied more than once across a statement's components
    /// (§4.4 VIZ).
    KeyNotUnique,
    /// A required option is missing given the rest of the statement's shape (FETCH method set
    /// without a url, §4.4).
    KeyMissing,
}

/// One linter diagnostic: a code, the AST node it concerns, and a human-readable message (§7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinterMessage {
    pub code: LinterMessageCode,
    pub node_id: NodeId,
    pub message: String,
}

impl LinterMessage {
    pub fn new(code: LinterMessageCode, node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            code,
            node_id,
            message: message.into(),
        }
    }

    pub fn redundant(node_id: NodeId, message: impl Into<String>) -> Self {
        Self::new(LinterMessageCode::KeyRedundant, node_id, message)
    }

    pub fn missing(node_id: NodeId, message: impl Into<String>) -> Self {
        Self::new(LinterMessageCode::KeyMissing, node_id, message)
    }

    pub fn not_unique(node_id: NodeId, message: impl Into<String>) -> Self {
        Self::new(LinterMessageCode::KeyNotUnique, node_id, message)
    }
}
