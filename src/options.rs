//! Caller-supplied configuration (§4.2 `read_qualified_name`, §4.4 LOAD method inference).
//!
//! Analogous to `flowscope-core`'s `AnalysisOptions`: a plain struct the caller constructs once
//! and passes into every operation that needs it. The analyzer never mutates it.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::stmt::load::LoadMethod;

/// Configuration consumed by instantiation passes (§4.2, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOptions {
    /// Schema name substituted for an unqualified relation reference lifted to global scope
    /// (§4.2 `read_qualified_name`'s `lift_global` behavior).
    pub global_namespace: String,
    /// File-extension → inferred LOAD method table (§4.4 LOAD), e.g. `csv -> Jmespath`.
    #[serde(default = "default_load_method_by_extension")]
    pub load_method_by_extension: HashMap<String, LoadMethod>,
}

fn default_load_method_by_extension() -> HashMap<String, LoadMethod> {
    let mut table = HashMap::new();
    table.insert("csv".to_string(), LoadMethod::JMESPATH);
    table
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            global_namespace: "global".to_string(),
            load_method_by_extension: default_load_method_by_extension(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_csv_mapping() {
        let opts = ScriptOptions::default();
        assert_eq!(
            opts.load_method_by_extension.get("csv"),
            Some(&LoadMethod::JMESPATH)
        );
        assert_eq!(opts.global_namespace, "global");
    }
}
