//! FETCH statement analyzer (§4.4).

use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::instance::ProgramInstance;
use crate::linter::LinterMessage;
use crate::matcher::{match_node, ASTIndex, AttributeIndex, MatcherNode};
use crate::syntax::{AttributeKey, NodeType, StatementId};

const FROM_URI: u32 = 1;
const METHOD: u32 = 2;
const URL_OPTION: u32 = 3;

/// Ordinal read from an `ENUM_FETCH_METHOD` node. `0` is reserved for HTTP, matching how the
/// FROM_URI shortcut forces the method (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FetchMethod(pub u32);

impl FetchMethod {
    pub const HTTP: FetchMethod = FetchMethod(0);
}

/// Typed record produced by the FETCH statement analyzer (§4.4, §3.3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchStatement {
    pub statement_id: StatementId,
    pub method: Option<FetchMethod>,
    pub url: Option<String>,
}

fn matcher() -> MatcherNode {
    MatcherNode::object(
        Some(NodeType::ObjectDashqlFetch),
        vec![
            (AttributeKey::DASHQL_FETCH_FROM_URI, MatcherNode::string().with_id(FROM_URI)),
            (
                AttributeKey::DASHQL_FETCH_METHOD,
                MatcherNode::enum_of(NodeType::EnumFetchMethod).with_id(METHOD),
            ),
            (AttributeKey::DSON_URL, MatcherNode::string().with_id(URL_OPTION)),
        ],
    )
}

fn looks_like_http_url(text: &str) -> bool {
    static HTTP_URL_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = HTTP_URL_REGEX.get_or_init(|| Regex::new(r"^https?://").expect("valid regex"));
    re.is_match(text)
}

impl FetchStatement {
    /// `read_from(instance, stmt_id)` (§4.4). Accumulates `KEY_REDUNDANT`/`KEY_MISSING` linter
    /// messages on `instance` per the FETCH method-resolution rules recovered from
    /// `fetch_stmt.cc` (§9 "Supplemented Detail").
    pub fn read_from(instance: &mut ProgramInstance, stmt_id: StatementId) -> Option<Self> {
        let stmt = instance.program.statements.get(stmt_id as usize)?;
        let root_id = stmt.root_node;
        let root = instance.program.node(root_id)?.clone();
        if root.node_type != NodeType::ObjectDashqlFetch {
            return None;
        }

        let mut attrs = AttributeIndex::new();
        let mut index = ASTIndex::new();
        let program = instance.program.clone();
        match_node(&program, &instance.text, root_id, &matcher(), &mut attrs, &mut index);

        let from_uri = index
            .get(&FROM_URI)
            .filter(|m| m.is_matched())
            .map(|m| (m.node_id, m.data.as_str().unwrap_or("").to_string()));
        let method_match = index.get(&METHOD).filter(|m| m.is_matched());
        let url_option = index
            .get(&URL_OPTION)
            .filter(|m| m.is_matched())
            .map(|m| (m.node_id, m.data.as_str().unwrap_or("").to_string()));

        let (method, url) = if let Some((_, uri_text)) = &from_uri {
            if let Some((url_node, _)) = &url_option {
                instance.linter_messages.push(LinterMessage::redundant(
                    url_node.unwrap_or(root_id),
                    "url option is redundant: FROM_URI already specifies the fetch target",
                ));
            }
            let forced_http = looks_like_http_url(uri_text);
            let method = if forced_http { Some(FetchMethod::HTTP) } else { method_match.and_then(|m| m.data.as_uint()).map(FetchMethod) };
            (method, Some(uri_text.clone()))
        } else {
            let method = method_match.and_then(|m| m.data.as_uint()).map(FetchMethod);
            if method.is_some() && url_option.is_none() {
                instance.linter_messages.push(LinterMessage::missing(
                    root_id,
                    "fetch method is set but no url option or FROM_URI was provided",
                ));
            }
            let url = url_option.map(|(_, text)| text);
            (method, url)
        };

        Some(FetchStatement {
            statement_id: stmt_id,
            method,
            url,
        })
    }

    pub fn print_script(&self, out: &mut String) {
        out.push_str("FETCH");
        if let Some(url) = &self.url {
            out.push_str(&format!(" FROM '{url}'"));
        }
        out.push(';');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ScriptOptions;
    use crate::syntax::{Location, Node, Program, Statement, StatementType, NO_PARENT};
    use std::rc::Rc;

    fn build(source: &str, from_uri: bool, url_option: bool) -> (ProgramInstance, StatementId) {
        let mut program = Program::default();
        let mut children = Vec::new();
        if from_uri {
            children.push((AttributeKey::DASHQL_FETCH_FROM_URI, Location::new(0, source.len() as u32)));
        }
        if url_option {
            children.push((AttributeKey::DSON_URL, Location::new(0, source.len() as u32)));
        }
        program.nodes.push(Node {
            node_type: NodeType::ObjectDashqlFetch,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: children.len() as u32,
            location: Location::new(0, source.len() as u32),
        });
        for (key, loc) in &children {
            program.nodes.push(Node {
                node_type: NodeType::StringRef,
                attribute_key: *key,
                parent: 0,
                children_begin_or_value: 0,
                children_count: 0,
                location: *loc,
            });
        }
        program.statements.push(Statement {
            statement_type: StatementType::Fetch,
            root_node: 0,
            name: Default::default(),
        });
        let instance = ProgramInstance::empty(Rc::from(source), Rc::new(program), ScriptOptions::default());
        (instance, 0)
    }

    #[test]
    fn test_from_uri_forces_http_and_flags_redundant_url() {
        let (mut instance, stmt_id) = build("http://cdn.example.com/data.csv", true, true);
        let fetch = FetchStatement::read_from(&mut instance, stmt_id).unwrap();
        assert_eq!(fetch.method, Some(FetchMethod::HTTP));
        assert_eq!(fetch.url.as_deref(), Some("http://cdn.example.com/data.csv"));
        assert_eq!(instance.linter_messages.len(), 1);
    }

    #[test]
    fn test_missing_url_flagged_when_method_has_no_target() {
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: NodeType::ObjectDashqlFetch,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: 1,
            location: Location::new(0, 1),
        });
        program.nodes.push(Node {
            node_type: NodeType::EnumFetchMethod,
            attribute_key: AttributeKey::DASHQL_FETCH_METHOD,
            parent: 0,
            children_begin_or_value: 5,
            children_count: 0,
            location: Location::new(0, 1),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Fetch,
            root_node: 0,
            name: Default::default(),
        });
        let mut instance = ProgramInstance::empty(Rc::from(""), Rc::new(program), ScriptOptions::default());
        let fetch = FetchStatement::read_from(&mut instance, 0).unwrap();
        assert_eq!(fetch.method, Some(FetchMethod(5)));
        assert!(fetch.url.is_none());
        assert_eq!(instance.linter_messages.len(), 1);
    }
}
