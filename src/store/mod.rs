//! Node-value interning (§3.3, §4.2, §9 "Union-find with path compression").

mod union_find;

pub use union_find::{NodeValue, ScalarValue, SparseUnionFind};
