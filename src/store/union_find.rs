//! Sparse union-find over AST node ids, used to intern node-derived scalar values (§3.3, §4.2).
//!
//! Sparse because most AST nodes never get a value: only nodes actually touched by constant
//! propagation or input substitution get an entry. `find` performs lazy path compression, so it
//! is a mutating operation even though it looks like a query (§9 "make `find` a mutating
//! operation").

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::syntax::NodeId;

/// A dynamically typed scalar produced by constant propagation or supplied as an input value
/// (§3.3, §9 "Dynamic scalar values").
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Date32(NaiveDate),
    Time64(NaiveTime),
    Timestamp(NaiveDateTime),
    /// Day-time interval, stored as (days, milliseconds).
    DayTimeInterval(i32, i32),
    Utf8(String),
}

impl ScalarValue {
    /// Stringifies for re-rendering into source (§4.7): strings are single-quoted, everything
    /// else formats natively.
    pub fn to_script_literal(&self) -> String {
        match self {
            ScalarValue::Null => "null".to_string(),
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::I8(v) => v.to_string(),
            ScalarValue::I16(v) => v.to_string(),
            ScalarValue::I32(v) => v.to_string(),
            ScalarValue::I64(v) => v.to_string(),
            ScalarValue::F32(v) => v.to_string(),
            ScalarValue::F64(v) => v.to_string(),
            ScalarValue::Date32(v) => format!("'{v}'"),
            ScalarValue::Time64(v) => format!("'{v}'"),
            ScalarValue::Timestamp(v) => format!("'{v}'"),
            ScalarValue::DayTimeInterval(days, millis) => format!("'{days}d {millis}ms'"),
            ScalarValue::Utf8(s) => format!("'{s}'"),
        }
    }

    /// String form used by `format()` positional substitution (§4.3.1): numbers format natively,
    /// everything else (including strings) formats as plain text.
    pub fn to_display_string(&self) -> String {
        match self {
            ScalarValue::Null => String::new(),
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::I8(v) => v.to_string(),
            ScalarValue::I16(v) => v.to_string(),
            ScalarValue::I32(v) => v.to_string(),
            ScalarValue::I64(v) => v.to_string(),
            ScalarValue::F32(v) => v.to_string(),
            ScalarValue::F64(v) => v.to_string(),
            ScalarValue::Date32(v) => v.to_string(),
            ScalarValue::Time64(v) => v.to_string(),
            ScalarValue::Timestamp(v) => v.to_string(),
            ScalarValue::DayTimeInterval(days, millis) => format!("{days}d {millis}ms"),
            ScalarValue::Utf8(s) => s.clone(),
        }
    }
}

/// One union's stored payload: the chosen representative node id plus its scalar (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeValue {
    pub root_node_id: NodeId,
    pub scalar_value: ScalarValue,
}

#[derive(Debug, Clone, Default)]
struct Entry {
    /// Parent node id within the union-find forest; equal to the entry's own key at a root.
    parent: NodeId,
    value: Option<NodeValue>,
}

/// Sparse union-find keyed by AST node id (§4.2).
#[derive(Debug, Clone, Default)]
pub struct SparseUnionFind {
    entries: HashMap<NodeId, Entry>,
}

impl SparseUnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_root(&mut self, node_id: NodeId) -> NodeId {
        let mut path = Vec::new();
        let mut current = node_id;
        loop {
            let parent = match self.entries.get(&current) {
                Some(e) => e.parent,
                None => {
                    // Never-before-seen node: it is its own root, implicitly.
                    return current;
                }
            };
            if parent == current {
                break;
            }
            path.push(current);
            current = parent;
        }
        for node in path {
            if let Some(e) = self.entries.get_mut(&node) {
                e.parent = current;
            }
        }
        current
    }

    /// `insert(node_id, value)`: idempotent for an already-interned node id.
    pub fn insert(&mut self, node_id: NodeId, value: ScalarValue) -> &NodeValue {
        let root = self.find_root(node_id);
        let entry = self.entries.entry(root).or_insert_with(|| Entry {
            parent: root,
            value: None,
        });
        if entry.value.is_none() {
            entry.value = Some(NodeValue {
                root_node_id: root,
                scalar_value: value,
            });
        }
        if root != node_id {
            self.entries
                .entry(node_id)
                .or_insert_with(|| Entry { parent: root, value: None });
        }
        self.entries.get(&root).unwrap().value.as_ref().unwrap()
    }

    /// `find(node_id)`: effective value for a node's union, performing lazy path compression.
    pub fn find(&mut self, node_id: NodeId) -> Option<&NodeValue> {
        let root = self.find_root(node_id);
        self.entries.get(&root).and_then(|e| e.value.as_ref())
    }

    /// `merge(primary_id, other_ids, value)`: union every id together under `primary_id`'s root
    /// and assign `value`; returns the resulting union's value.
    pub fn merge(&mut self, primary_id: NodeId, other_ids: &[NodeId], value: ScalarValue) -> &NodeValue {
        let root = self.find_root(primary_id);
        self.entries
            .entry(root)
            .or_insert_with(|| Entry { parent: root, value: None });

        for &other in other_ids {
            let other_root = self.find_root(other);
            if other_root == root {
                continue;
            }
            self.entries
                .entry(other_root)
                .or_insert_with(|| Entry { parent: other_root, value: None });
            // Union by attaching the other root under `root`; `root` stays the chosen
            // representative for this merge regardless of prior tree sizes, matching the
            // "arbitrary representative... stored with the value" contract (§4.2).
            self.entries.get_mut(&other_root).unwrap().parent = root;
        }

        self.entries
            .entry(primary_id)
            .or_insert_with(|| Entry { parent: root, value: None });

        let entry = self.entries.get_mut(&root).unwrap();
        entry.value = Some(NodeValue {
            root_node_id: root,
            scalar_value: value,
        });
        self.entries.get(&root).unwrap().value.as_ref().unwrap()
    }

    /// `iterate_values(fn)`: visits each union exactly once, by its representative.
    pub fn iterate_values<F: FnMut(&NodeValue)>(&self, mut f: F) {
        for (key, entry) in self.entries.iter() {
            if entry.parent == *key {
                if let Some(value) = &entry.value {
                    f(value);
                }
            }
        }
    }

    /// True iff `a` and `b` are known to belong to the same union (ignores never-seen nodes,
    /// which are trivially their own singleton union).
    #[cfg(test)]
    pub fn same_union(&mut self, a: NodeId, b: NodeId) -> bool {
        self.find_root(a) == self.find_root(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut uf = SparseUnionFind::new();
        uf.insert(1, ScalarValue::I32(5));
        uf.insert(1, ScalarValue::I32(99));
        assert_eq!(uf.find(1).unwrap().scalar_value, ScalarValue::I32(5));
    }

    #[test]
    fn test_merge_unions_all_ids() {
        let mut uf = SparseUnionFind::new();
        uf.insert(1, ScalarValue::I32(1));
        uf.insert(2, ScalarValue::I32(2));
        uf.insert(3, ScalarValue::I32(3));
        uf.merge(1, &[2, 3], ScalarValue::Utf8("folded".into()));
        assert!(uf.same_union(1, 2));
        assert!(uf.same_union(1, 3));
        assert_eq!(
            uf.find(2).unwrap().scalar_value,
            ScalarValue::Utf8("folded".into())
        );
        assert_eq!(
            uf.find(3).unwrap().scalar_value,
            ScalarValue::Utf8("folded".into())
        );
    }

    #[test]
    fn test_unrelated_nodes_not_unioned() {
        let mut uf = SparseUnionFind::new();
        uf.insert(1, ScalarValue::I32(1));
        uf.insert(2, ScalarValue::I32(2));
        assert!(!uf.same_union(1, 2));
    }

    #[test]
    fn test_iterate_values_visits_each_union_once() {
        let mut uf = SparseUnionFind::new();
        uf.insert(1, ScalarValue::I32(1));
        uf.insert(2, ScalarValue::I32(2));
        uf.merge(1, &[2], ScalarValue::I32(42));
        let mut seen = 0;
        uf.iterate_values(|_| seen += 1);
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_find_unknown_node_is_none() {
        let mut uf = SparseUnionFind::new();
        assert!(uf.find(77).is_none());
    }
}
