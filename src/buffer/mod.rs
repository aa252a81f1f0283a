//! Positional edit buffer that keeps original source offsets meaningful across in-place
//! replacements (§4.7), plus the statement text renderer built on top of it.

use crate::instance::ProgramInstance;
use crate::syntax::{Location, StatementId};

#[derive(Debug, Clone, Copy)]
struct Patch {
    /// Every location that is `>=` this offset is patched.
    offset: u32,
    adjust: u32,
}

/// Supports in-place editing of a substring of some larger text while keeping **original
/// offsets** meaningful (§4.7). Every `replace` takes a `Location` expressed in the original,
/// unedited coordinate space; the buffer translates it through the patches recorded by earlier
/// replacements before touching its own storage.
pub struct SubstringBuffer {
    substring_loc: Location,
    buffer: String,
    /// Patches for edits that lengthened the original string.
    lengthen: Vec<Patch>,
    /// Patches for edits that shortened the original string.
    shorten: Vec<Patch>,
}

impl SubstringBuffer {
    pub fn new(text: &str) -> Self {
        Self::with_location(text, Location::new(0, text.len() as u32))
    }

    pub fn with_location(text: &str, loc: Location) -> Self {
        let begin = (loc.offset as usize).min(text.len());
        let end = (loc.end() as usize).min(text.len());
        SubstringBuffer {
            substring_loc: loc,
            buffer: text[begin..end].to_string(),
            lengthen: Vec::new(),
            shorten: Vec::new(),
        }
    }

    fn check_bounds(&self, loc: Location) -> Location {
        let lo = self.substring_loc.offset;
        let hi = self.substring_loc.offset + self.substring_loc.length;
        let begin = loc.offset.max(lo).min(hi);
        let end = loc.end().max(lo).min(hi);
        Location::new(begin, end - begin)
    }

    /// Re-expresses `loc` (already clipped to `substring_loc`) in current buffer coordinates by
    /// applying every patch recorded so far, branch-free per patch.
    fn apply_patches(&self, loc: Location) -> Location {
        let begin = loc.offset as i64;
        let end = loc.end() as i64;
        let mut a = begin;
        let mut b = end;
        for p in &self.lengthen {
            let adjust = p.adjust as i64;
            a += (begin >= p.offset as i64) as i64 * adjust;
            b += (end >= p.offset as i64) as i64 * adjust;
        }
        for p in &self.shorten {
            let adjust = p.adjust as i64;
            a -= (begin >= p.offset as i64) as i64 * adjust;
            b -= (end >= p.offset as i64) as i64 * adjust;
        }
        Location::new(a as u32, (b - a) as u32)
    }

    /// True iff `loc`, clipped to the buffer's substring, has non-zero length.
    pub fn intersects(&self, loc: Location) -> bool {
        self.check_bounds(loc).length > 0
    }

    /// Replaces the text originally at `loc` with `value`. `loc` is expressed in the *original*
    /// offset space; repeated calls may be made in any order as long as they target
    /// non-overlapping original locations (§8 property 6).
    pub fn replace(&mut self, loc: Location, value: &str) {
        let patched = self.apply_patches(self.check_bounds(loc));
        let start = (patched.offset - self.substring_loc.offset) as usize;
        let end = start + patched.length as usize;
        self.buffer.replace_range(start..end, value);

        let value_len = value.len() as u32;
        if value_len < patched.length {
            let diff = patched.length - value_len;
            self.shorten.push(Patch {
                offset: loc.offset + diff,
                adjust: diff,
            });
        } else if value_len > patched.length {
            let diff = value_len - patched.length;
            self.lengthen.push(Patch {
                offset: loc.end(),
                adjust: diff,
            });
        }
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Renders a statement's text (§4.7): starts from the statement's root location and overlays
/// every interned constant that falls within it, stringified via
/// [`crate::store::ScalarValue::to_script_literal`]. Used by the task planner to materialize the
/// script for statements whose task type requires one, and as the baseline a
/// [`crate::editor`] edit rewrites on top of.
pub fn render_statement_text(instance: &ProgramInstance, stmt_id: StatementId) -> Option<String> {
    let stmt = instance.program.statements.get(stmt_id as usize)?;
    let root = instance.program.node(stmt.root_node)?;
    let mut buffer = SubstringBuffer::with_location(&instance.text, root.location);
    instance.evaluated_nodes.iterate_values(|value| {
        if let Some(node) = instance.program.node(value.root_node_id) {
            if buffer.intersects(node.location) {
                buffer.replace(node.location, &value.scalar_value.to_script_literal());
            }
        }
    });
    Some(buffer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_e_sequential_replacements() {
        let mut buffer = SubstringBuffer::new("0 1 2 3 4 5 6 7 8 9 ");
        buffer.replace(Location::new(0, 2), "");
        buffer.replace(Location::new(0, 2), "0 ");
        buffer.replace(Location::new(2, 2), "A B ");
        assert_eq!(buffer.finish(), "0 A B 2 3 4 5 6 7 8 9 ");
    }

    #[test]
    fn test_non_intersecting_replacements_independent_of_order() {
        let mut forward = SubstringBuffer::new("aaaa bbbb cccc");
        forward.replace(Location::new(0, 4), "x");
        forward.replace(Location::new(10, 4), "y");

        let mut backward = SubstringBuffer::new("aaaa bbbb cccc");
        backward.replace(Location::new(10, 4), "y");
        backward.replace(Location::new(0, 4), "x");

        assert_eq!(forward.finish(), backward.finish());
    }

    #[test]
    fn test_intersects_respects_substring_bounds() {
        let buffer = SubstringBuffer::with_location("0123456789", Location::new(2, 4));
        assert!(buffer.intersects(Location::new(3, 1)));
        assert!(!buffer.intersects(Location::new(7, 1)));
    }
}
