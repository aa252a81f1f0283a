//! DSON dictionary and JSON writer (§6.4).
//!
//! DSON attribute keys below [`crate::syntax::DSON_DYNAMIC_KEYS_`] are the compile-time
//! [`crate::syntax::AttributeKey`] enumeration; everything at or above that boundary was
//! discovered in source text and is looked up here instead.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::syntax::{AttributeKey, Node, Program, DSON_DYNAMIC_KEYS_, DSON_KEYS_};

/// Bidirectional map between dynamic attribute keys and their textual form (§3.3, §6.4, §9
/// "Dynamic DSON keys").
#[derive(Debug, Clone, Default)]
pub struct DsonDictionary {
    by_index: IndexMap<u16, String>,
}

impl DsonDictionary {
    /// Builds the dictionary from a program's `dynamic_dson_keys`, in first-appearance order —
    /// key `DSON_DYNAMIC_KEYS_ + i` maps to `dynamic_dson_keys[i]`.
    pub fn from_program(program: &Program) -> Self {
        let mut by_index = IndexMap::new();
        for (i, text) in program.dynamic_dson_keys.iter().enumerate() {
            by_index.insert(DSON_DYNAMIC_KEYS_ + i as u16, text.clone());
        }
        Self { by_index }
    }

    pub fn text_of(&self, key: AttributeKey) -> Option<&str> {
        self.by_index.get(&key.0).map(|s| s.as_str())
    }

    pub fn key_of(&self, text: &str) -> Option<AttributeKey> {
        self.by_index
            .iter()
            .find(|(_, v)| v.as_str() == text)
            .map(|(k, _)| AttributeKey(*k))
    }
}

/// How much of a node to render (§6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonWriterMode {
    Pretty,
    Compact,
    /// Only emit attributes whose key is part of the generic DSON option grammar
    /// (`< DSON_KEYS_`... actually keys *at or above* the reserved statement-schema range are
    /// skipped; see `DSON_KEYS_`).
    OnlyDson,
}

/// Converts a snake_case attribute name into camelCase, treating `_` as the only word
/// separator (§6.4).
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Renders one AST node (and, recursively, its children) as a `serde_json::Value` (§6.4).
///
/// `attribute_name` resolves a node's `attribute_key` to its textual DSON name — static keys via
/// a caller-supplied lookup, dynamic keys via `dictionary`.
pub fn write_node(
    program: &Program,
    source: &str,
    node: &Node,
    dictionary: &DsonDictionary,
    mode: JsonWriterMode,
    attribute_name: &dyn Fn(AttributeKey) -> Option<&'static str>,
) -> Value {
    use crate::syntax::NodeType;

    match node.node_type {
        NodeType::None => Value::Null,
        NodeType::Bool => Value::Bool(node.value_bool()),
        NodeType::Ui32 | NodeType::Ui32Bitmap => Value::Number(node.value_ui32().into()),
        NodeType::StringRef => Value::String(program.source_text(source, node.location).to_string()),
        NodeType::Array => {
            let children = program.children(node);
            let items = children
                .iter()
                .map(|c| write_node(program, source, c, dictionary, mode, attribute_name))
                .collect();
            Value::Array(items)
        }
        t if t.is_enum() => Value::Number(node.value_ui32().into()),
        _ => {
            let mut map = Map::new();
            for child in program.children(node) {
                if mode == JsonWriterMode::OnlyDson && child.attribute_key.0 < DSON_KEYS_ {
                    continue;
                }
                let name = if child.attribute_key.is_dynamic() {
                    dictionary.text_of(child.attribute_key).map(|s| s.to_string())
                } else {
                    attribute_name(child.attribute_key).map(|s| s.to_string())
                };
                let Some(name) = name else { continue };
                let key = to_camel_case(&name);
                let value = write_node(program, source, child, dictionary, mode, attribute_name);
                map.insert(key, value);
            }
            Value::Object(map)
        }
    }
}
