//! Reusable child-pointer-by-key lookup for a single object node (§4.1).
//!
//! Avoids allocating a hash map per visited object: the same [`AttributeIndex`] is reused across
//! every object node touched during a matcher pass, and [`AttributeIndexGuard`] clears only the
//! slots it touched when it goes out of scope.

use crate::syntax::{AttributeKey, Node, NodeId, DSON_DYNAMIC_KEYS_};

#[derive(Debug, Default)]
pub struct AttributeIndex {
    slots: Vec<Option<NodeId>>,
    touched: Vec<u16>,
}

impl AttributeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills slots for `children` (the contiguous children of one object node, beginning at AST
    /// index `children_begin`) and returns a scoped guard. Dynamic keys (`>= DSON_DYNAMIC_KEYS_`)
    /// are skipped — they are not part of any statement's static schema.
    pub fn scope(&mut self, children_begin: NodeId, children: &[Node]) -> AttributeIndexGuard<'_> {
        for (offset, child) in children.iter().enumerate() {
            let key = child.attribute_key.0;
            if key == 0 || key >= DSON_DYNAMIC_KEYS_ {
                continue;
            }
            if self.slots.len() <= key as usize {
                self.slots.resize(key as usize + 1, None);
            }
            self.slots[key as usize] = Some(children_begin + offset as u32);
            self.touched.push(key);
        }
        AttributeIndexGuard { index: self }
    }
}

pub struct AttributeIndexGuard<'a> {
    index: &'a mut AttributeIndex,
}

impl<'a> AttributeIndexGuard<'a> {
    pub fn get(&self, key: AttributeKey) -> Option<NodeId> {
        self.index.slots.get(key.0 as usize).copied().flatten()
    }
}

impl<'a> Drop for AttributeIndexGuard<'a> {
    fn drop(&mut self) {
        for key in self.index.touched.drain(..) {
            self.index.slots[key as usize] = None;
        }
    }
}
