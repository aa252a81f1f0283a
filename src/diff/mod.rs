//! Program matcher: patience-diff between two instances' statement lists (§4.5).
//!
//! Two statements are compared with an increasingly expensive ladder: a cheap node-type/text
//! shortcut (`estimate_similarity`) first, a full deep-equality walk only when the shortcut is
//! inconclusive, and a node-overlap score (`compute_similarity`) only for the unmatched remainder.
//! The diff itself is patience-LCS over uniquely-matched statement pairs, with `UPDATE` filling in
//! similar-but-not-equal pairs inside the gaps between kept anchors.

use crate::instance::ProgramInstance;
use crate::syntax::{NodeId, NodeType, Program, StatementId};

const UPDATE_SIMILARITY_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityEstimate {
    Equal,
    Similar,
    NotEqual,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatementSimilarity {
    pub total_nodes: usize,
    pub matching_nodes: usize,
}

impl StatementSimilarity {
    pub fn score(&self) -> f64 {
        if self.total_nodes == 0 {
            0.0
        } else {
            self.matching_nodes as f64 / self.total_nodes as f64
        }
    }

    pub fn is_equal(&self) -> bool {
        self.total_nodes > 0 && self.matching_nodes == self.total_nodes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffCode {
    Delete,
    Insert,
    Keep,
    Move,
    Update,
}

/// One step of a statement-list diff: `source` is a prior-instance statement id, `target` a
/// next-instance one. Exactly one is `None` for `Insert`/`Delete` (§4.5, §8 property 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOp {
    pub code: DiffCode,
    pub source: Option<StatementId>,
    pub target: Option<StatementId>,
}

struct Frame {
    source_id: NodeId,
    target_id: NodeId,
    parent_entry: usize,
    matching_nodes: usize,
}

/// Compares statements between a `source` (earlier) and `target` (later) instance (§4.5).
pub struct ProgramMatcher<'a> {
    source: &'a ProgramInstance,
    target: &'a ProgramInstance,
    source_subtree_sizes: Vec<usize>,
    target_subtree_sizes: Vec<usize>,
}

impl<'a> ProgramMatcher<'a> {
    pub fn new(source: &'a ProgramInstance, target: &'a ProgramInstance) -> Self {
        ProgramMatcher {
            source,
            target,
            source_subtree_sizes: Vec::new(),
            target_subtree_sizes: Vec::new(),
        }
    }

    /// Cheap shortcut (§4.5): different root node types are never equal; equal child count and
    /// equal source text bypasses the full tree walk entirely.
    pub fn estimate_similarity(&self, source_stmt: StatementId, target_stmt: StatementId) -> SimilarityEstimate {
        let s = self.source.program.node(self.source.program.statements[source_stmt as usize].root_node).unwrap();
        let t = self.target.program.node(self.target.program.statements[target_stmt as usize].root_node).unwrap();
        if s.node_type != t.node_type {
            return SimilarityEstimate::NotEqual;
        }
        if s.children_count == t.children_count && s.location.length == t.location.length {
            let st = self.source.program.source_text(&self.source.text, s.location);
            let tt = self.target.program.source_text(&self.target.text, t.location);
            if st == tt {
                return SimilarityEstimate::Equal;
            }
        }
        SimilarityEstimate::Similar
    }

    /// Memoized iterative-DFS subtree size: only `is_object()`/`Array` nodes expand into their
    /// children, matching the node kinds the similarity walk itself descends into.
    fn compute_tree_size(program: &Program, root: NodeId, sizes: &mut Vec<usize>) -> usize {
        let n = program.nodes.len();
        if sizes.len() != n {
            sizes.resize(n, 0);
        } else if sizes[root as usize] > 0 {
            return sizes[root as usize];
        }

        let mut pending: Vec<(NodeId, NodeId)> = vec![(root, root)];
        let mut visited: Vec<bool> = vec![false];
        let mut node_count = 0usize;
        loop {
            let top = pending.len() - 1;
            let (target, parent) = pending[top];
            if visited[top] {
                if pending.len() == 1 {
                    node_count = sizes[target as usize];
                    break;
                }
                sizes[parent as usize] += sizes[target as usize];
                pending.pop();
                visited.pop();
                continue;
            }
            sizes[target as usize] = 1;
            visited[top] = true;

            let node = &program.nodes[target as usize];
            if node.node_type.is_object() || node.node_type == NodeType::Array {
                let begin = node.children_begin_or_value;
                let end = begin + node.children_count;
                for child in begin..end {
                    pending.push((child, target));
                    visited.push(false);
                }
            }
        }
        node_count
    }

    /// Node-overlap score between two statement subtrees, only called for pairs the cheap
    /// estimate found `Similar` (§4.5).
    pub fn compute_similarity(&mut self, source_stmt: StatementId, target_stmt: StatementId) -> StatementSimilarity {
        let source_program = self.source.program.clone();
        let target_program = self.target.program.clone();
        let source_root = source_program.statements[source_stmt as usize].root_node;
        let target_root = target_program.statements[target_stmt as usize].root_node;
        let source_size = Self::compute_tree_size(&source_program, source_root, &mut self.source_subtree_sizes);
        let target_size = Self::compute_tree_size(&target_program, target_root, &mut self.target_subtree_sizes);
        let node_count = source_size.max(target_size);
        if node_count == 0 {
            return StatementSimilarity::default();
        }

        let mut pending = vec![Frame {
            source_id: source_root,
            target_id: target_root,
            parent_entry: 0,
            matching_nodes: 0,
        }];
        let mut visited: Vec<bool> = vec![false];

        let result;
        loop {
            let top = pending.len() - 1;
            if visited[top] {
                if pending.len() == 1 {
                    result = StatementSimilarity {
                        total_nodes: node_count,
                        matching_nodes: pending[top].matching_nodes,
                    };
                    break;
                }
                let matching = pending[top].matching_nodes;
                let parent_entry = pending[top].parent_entry;
                pending[parent_entry].matching_nodes += matching;
                pending.pop();
                visited.pop();
                continue;
            }
            visited[top] = true;
            let pile_idx = top;
            let source_id = pending[top].source_id;
            let target_id = pending[top].target_id;
            let source_node = *source_program.node(source_id).unwrap();
            let target_node = *target_program.node(target_id).unwrap();

            if source_node.node_type != target_node.node_type {
                continue;
            }

            let node_type = source_node.node_type;
            let mut is_match = true;
            match node_type {
                NodeType::None => {}
                NodeType::Bool | NodeType::Ui32 | NodeType::Ui32Bitmap => {
                    is_match = source_node.children_begin_or_value == target_node.children_begin_or_value;
                }
                NodeType::StringRef => {
                    is_match = source_program.source_text(&self.source.text, source_node.location)
                        == target_program.source_text(&self.target.text, target_node.location);
                }
                NodeType::Array => {
                    let sc = source_node.children_count;
                    let tc = target_node.children_count;
                    is_match = sc == tc;
                    let sb = source_node.children_begin_or_value;
                    let tb = target_node.children_begin_or_value;
                    for i in 0..sc.min(tc) {
                        pending.push(Frame {
                            source_id: sb + i,
                            target_id: tb + i,
                            parent_entry: pile_idx,
                            matching_nodes: 0,
                        });
                        visited.push(false);
                    }
                }
                _ if node_type.is_object() => {
                    is_match = source_node.children_count == target_node.children_count;
                    let mut si = source_node.children_begin_or_value;
                    let mut ti = target_node.children_begin_or_value;
                    let se = si + source_node.children_count;
                    let te = ti + target_node.children_count;
                    while si < se && ti < te {
                        let sk = source_program.node(si).unwrap().attribute_key;
                        let tk = target_program.node(ti).unwrap().attribute_key;
                        if sk < tk {
                            si += 1;
                            is_match = false;
                        } else if sk > tk {
                            ti += 1;
                            is_match = false;
                        } else {
                            pending.push(Frame {
                                source_id: si,
                                target_id: ti,
                                parent_entry: pile_idx,
                                matching_nodes: 0,
                            });
                            visited.push(false);
                            si += 1;
                            ti += 1;
                        }
                    }
                }
                _ if node_type.is_enum() => {
                    is_match = source_node.children_begin_or_value == target_node.children_begin_or_value;
                }
                _ => {}
            }

            if is_match {
                pending[pile_idx].matching_nodes += 1;
            }
        }
        result
    }

    /// Strict equality short-circuiting at the first mismatch (§4.5).
    pub fn check_deep_equality(&self, source_stmt: StatementId, target_stmt: StatementId) -> bool {
        let source_program = self.source.program.clone();
        let target_program = self.target.program.clone();
        let source_root = source_program.statements[source_stmt as usize].root_node;
        let target_root = target_program.statements[target_stmt as usize].root_node;

        let mut pending: Vec<(NodeId, NodeId)> = vec![(source_root, target_root)];
        while let Some((source_id, target_id)) = pending.pop() {
            let source_node = *source_program.node(source_id).unwrap();
            let target_node = *target_program.node(target_id).unwrap();
            if source_node.node_type != target_node.node_type {
                return false;
            }

            let eq = match source_node.node_type {
                NodeType::None => true,
                NodeType::Bool | NodeType::Ui32 | NodeType::Ui32Bitmap => {
                    source_node.children_begin_or_value == target_node.children_begin_or_value
                }
                NodeType::StringRef => {
                    source_program.source_text(&self.source.text, source_node.location)
                        == target_program.source_text(&self.target.text, target_node.location)
                }
                NodeType::Array => {
                    if source_node.children_count != target_node.children_count {
                        return false;
                    }
                    let sb = source_node.children_begin_or_value;
                    let tb = target_node.children_begin_or_value;
                    for i in 0..source_node.children_count {
                        pending.push((sb + i, tb + i));
                    }
                    true
                }
                t if t.is_object() => {
                    if source_node.children_count != target_node.children_count {
                        return false;
                    }
                    let mut si = source_node.children_begin_or_value;
                    let mut ti = target_node.children_begin_or_value;
                    let se = si + source_node.children_count;
                    let te = ti + target_node.children_count;
                    while si < se && ti < te {
                        let sk = source_program.node(si).unwrap().attribute_key;
                        let tk = target_program.node(ti).unwrap().attribute_key;
                        if sk != tk {
                            return false;
                        }
                        pending.push((si, ti));
                        si += 1;
                        ti += 1;
                    }
                    true
                }
                t if t.is_enum() => source_node.children_begin_or_value == target_node.children_begin_or_value,
                _ => true,
            };
            if !eq {
                return false;
            }
        }
        true
    }

    /// All-pairs discovery of equal statements, tracking ambiguity on both sides so a statement
    /// that equals more than one counterpart (or vice versa) is excluded from the unique mapping
    /// fed into the LCS (§4.5).
    fn map_statements(&mut self) -> (Vec<(StatementId, StatementId)>, Vec<(StatementId, StatementId)>) {
        let source_count = self.source.program.statements.len();
        let target_count = self.target.program.statements.len();
        let mut source_ambiguous = vec![false; source_count];
        let mut target_ambiguous = vec![false; target_count];
        let mut target_mapping: Vec<Option<StatementId>> = vec![None; target_count];
        let mut equal_pairs = Vec::new();

        for source_id in 0..source_count as StatementId {
            let mut matched: Option<StatementId> = None;
            for target_id in 0..target_count as StatementId {
                let is_equal = match self.estimate_similarity(source_id, target_id) {
                    SimilarityEstimate::NotEqual => false,
                    SimilarityEstimate::Similar => self.check_deep_equality(source_id, target_id),
                    SimilarityEstimate::Equal => true,
                };
                if !is_equal {
                    continue;
                }
                equal_pairs.push((source_id, target_id));

                if let Some(existing) = target_mapping[target_id as usize] {
                    source_ambiguous[source_id as usize] = true;
                    source_ambiguous[existing as usize] = true;
                    target_ambiguous[target_id as usize] = true;
                    continue;
                } else if let Some(m) = matched {
                    source_ambiguous[source_id as usize] = true;
                    target_ambiguous[m as usize] = true;
                    target_ambiguous[target_id as usize] = true;
                    continue;
                }
                target_mapping[target_id as usize] = Some(source_id);
                matched = Some(target_id);
            }
        }

        let mut unique_pairs = Vec::new();
        for target_id in 0..target_count as StatementId {
            let Some(source_id) = target_mapping[target_id as usize] else {
                continue;
            };
            if source_ambiguous[source_id as usize] || target_ambiguous[target_id as usize] {
                continue;
            }
            unique_pairs.push((source_id, target_id));
        }
        unique_pairs.sort_by_key(|(s, _)| *s);

        (unique_pairs, equal_pairs)
    }

    /// Patience-sort piles over `unique_pairs` (already sorted by source id), keyed by target id,
    /// then traces the longest increasing subsequence back out of them (§4.5).
    fn find_lcs(unique_pairs: &[(StatementId, StatementId)]) -> Vec<(StatementId, StatementId)> {
        struct PileEntry {
            source_id: StatementId,
            target_id: StatementId,
            prev_pile_size: usize,
        }

        let mut piles: Vec<Vec<PileEntry>> = Vec::new();
        for &(source_id, target_id) in unique_pairs {
            let existing = piles.iter().position(|pile| pile.last().unwrap().target_id >= target_id);
            match existing {
                Some(p) => {
                    let prev_pile_id = p.max(1) - 1;
                    let prev_pile_size = piles[prev_pile_id].len();
                    piles[p].push(PileEntry {
                        source_id,
                        target_id,
                        prev_pile_size,
                    });
                }
                None => {
                    piles.push(Vec::new());
                    let prev_pile_id = piles.len().max(2) - 2;
                    let prev_pile_size = piles[prev_pile_id].len();
                    let last = piles.len() - 1;
                    piles[last].push(PileEntry {
                        source_id,
                        target_id,
                        prev_pile_size,
                    });
                }
            }
        }

        if piles.is_empty() {
            return Vec::new();
        }

        let mut lcs = Vec::new();
        let mut pile_id = piles.len() - 1;
        let mut entry_id = piles[pile_id].len() - 1;
        loop {
            let entry = &piles[pile_id][entry_id];
            lcs.push((entry.source_id, entry.target_id));
            if pile_id == 0 {
                break;
            }
            entry_id = entry.prev_pile_size - 1;
            pile_id -= 1;
        }
        lcs.reverse();
        lcs
    }

    /// Builds the full statement diff (§4.5, §8 properties 3-4): `KEEP` for the LCS anchors plus
    /// every `Equal` pair found inside a section, `MOVE` for an equal pair crossing a section
    /// boundary, `UPDATE` for the weakest `Similar` match clearing the threshold, `DELETE`/`INSERT`
    /// otherwise.
    pub fn compute_diff(&mut self) -> Vec<DiffOp> {
        let (unique_pairs, equal_pairs) = self.map_statements();
        let lcs = Self::find_lcs(&unique_pairs);

        let source_count = self.source.program.statements.len();
        let target_count = self.target.program.statements.len();
        let mut source_emitted = vec![false; source_count];
        let mut target_emitted = vec![false; target_count];
        let mut ops: Vec<DiffOp> = Vec::new();

        fn emit(
            ops: &mut Vec<DiffOp>,
            source_emitted: &mut [bool],
            target_emitted: &mut [bool],
            code: DiffCode,
            source: Option<StatementId>,
            target: Option<StatementId>,
        ) {
            ops.push(DiffOp { code, source, target });
            if let Some(s) = source {
                source_emitted[s as usize] = true;
            }
            if let Some(t) = target {
                target_emitted[t as usize] = true;
            }
        }

        let mut prev: (StatementId, StatementId) = (0, 0);
        for i in 0..=lcs.len() {
            let next: (StatementId, StatementId) = if i < lcs.len() {
                lcs[i]
            } else {
                (source_count as StatementId, target_count as StatementId)
            };
            let (prev_source_id, prev_target_id) = prev;
            let (next_source_id, next_target_id) = next;

            for source_id in prev_source_id..next_source_id {
                for &(_, t) in equal_pairs.iter().filter(|(s, _)| *s == source_id) {
                    if target_emitted[t as usize] {
                        continue;
                    }
                    emit(&mut ops, &mut source_emitted, &mut target_emitted, DiffCode::Move, Some(source_id), Some(t));
                    break;
                }
                if source_emitted[source_id as usize] {
                    continue;
                }

                let mut matches: Vec<(StatementId, f64)> = Vec::new();
                let mut kept = false;
                for target_id in prev_target_id..next_target_id {
                    if target_emitted[target_id as usize] {
                        continue;
                    }
                    match self.estimate_similarity(source_id, target_id) {
                        SimilarityEstimate::NotEqual => continue,
                        SimilarityEstimate::Equal => {
                            emit(
                                &mut ops,
                                &mut source_emitted,
                                &mut target_emitted,
                                DiffCode::Keep,
                                Some(source_id),
                                Some(target_id),
                            );
                            kept = true;
                            break;
                        }
                        SimilarityEstimate::Similar => {}
                    }
                    let score = self.compute_similarity(source_id, target_id).score();
                    if score >= UPDATE_SIMILARITY_THRESHOLD {
                        matches.push((target_id, score));
                    }
                }
                if kept || source_emitted[source_id as usize] {
                    continue;
                }

                // A min-heap-by-score pick: the weakest candidate that still clears the
                // threshold, not the strongest.
                let weakest = matches.iter().min_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
                match weakest {
                    Some(&(target_id, _)) => {
                        emit(&mut ops, &mut source_emitted, &mut target_emitted, DiffCode::Update, Some(source_id), Some(target_id));
                    }
                    None => {
                        emit(&mut ops, &mut source_emitted, &mut target_emitted, DiffCode::Delete, Some(source_id), None);
                    }
                }
            }

            for target_id in prev_target_id..next_target_id {
                if !target_emitted[target_id as usize] {
                    emit(&mut ops, &mut source_emitted, &mut target_emitted, DiffCode::Insert, None, Some(target_id));
                }
            }

            if i == lcs.len() {
                break;
            }
            emit(
                &mut ops,
                &mut source_emitted,
                &mut target_emitted,
                DiffCode::Keep,
                Some(next_source_id),
                Some(next_target_id),
            );
            prev = next;
        }

        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ScriptOptions;
    use crate::syntax::{AttributeKey, Location, Node, Program, Statement, StatementType, NO_PARENT};
    use std::rc::Rc;

    fn select_program(values: &[u32]) -> (Rc<str>, Program) {
        let mut text = String::new();
        let mut program = Program::default();
        for &v in values {
            let literal = format!("SELECT {v}; ");
            let offset = text.len() as u32;
            text.push_str(&literal);
            let node_start = offset + 7;
            program.nodes.push(Node {
                node_type: NodeType::Ui32,
                attribute_key: AttributeKey::NONE,
                parent: NO_PARENT,
                children_begin_or_value: v,
                children_count: 0,
                location: Location::new(node_start, 1),
            });
            let root = program.nodes.len() as u32 - 1;
            program.statements.push(Statement {
                statement_type: StatementType::Select,
                root_node: root,
                name: Default::default(),
            });
        }
        (Rc::from(text.as_str()), program)
    }

    fn instance_of(values: &[u32]) -> ProgramInstance {
        let (text, program) = select_program(values);
        ProgramInstance::empty(text, Rc::new(program), ScriptOptions::default())
    }

    #[test]
    fn test_diff_identity_emits_only_keep() {
        let a = instance_of(&[1, 2, 3]);
        let b = instance_of(&[1, 2, 3]);
        let mut matcher = ProgramMatcher::new(&a, &b);
        let diff = matcher.compute_diff();
        assert!(diff.iter().all(|op| op.code == DiffCode::Keep));
        assert_eq!(diff.len(), 3);
    }

    #[test]
    fn test_scenario_c_patience_lcs_detects_move() {
        let a = instance_of(&[1, 2, 3]);
        let b = instance_of(&[1, 3, 2]);
        let mut matcher = ProgramMatcher::new(&a, &b);
        let diff = matcher.compute_diff();
        assert_eq!(
            diff,
            vec![
                DiffOp { code: DiffCode::Keep, source: Some(0), target: Some(0) },
                DiffOp { code: DiffCode::Move, source: Some(1), target: Some(2) },
                DiffOp { code: DiffCode::Keep, source: Some(2), target: Some(1) },
            ]
        );
    }

    #[test]
    fn test_diff_covers_every_statement_exactly_once() {
        let a = instance_of(&[1, 2, 3, 4]);
        let b = instance_of(&[9, 2, 3]);
        let mut matcher = ProgramMatcher::new(&a, &b);
        let diff = matcher.compute_diff();
        let mut sources: Vec<StatementId> = diff.iter().filter_map(|op| op.source).collect();
        let mut targets: Vec<StatementId> = diff.iter().filter_map(|op| op.target).collect();
        sources.sort_unstable();
        targets.sort_unstable();
        assert_eq!(sources, vec![0, 1, 2, 3]);
        assert_eq!(targets, vec![0, 1, 2]);
    }

    #[test]
    fn test_similarity_score_bounds() {
        let a = instance_of(&[1]);
        let b = instance_of(&[1]);
        let mut matcher = ProgramMatcher::new(&a, &b);
        let sim = matcher.compute_similarity(0, 0);
        assert!(sim.is_equal());
        assert_eq!(sim.score(), 1.0);
    }
}
