//! Dead-statement analysis (§4.10): determines `statements_liveness`, the bit vector recording
//! which statements are reachable from an INPUT or a VIZ statement.
//!
//! Statements not reachable from such a seed are retained for rendering (the planner still
//! translates every live-or-dead statement into a task, per §4.6 phase 2) but are marked
//! `SKIPPED` rather than `PENDING` when the task graph is built.

use std::collections::HashMap;

use crate::syntax::{Program, StatementId, StatementType};

/// Builds the multimap `depends_on(target -> [source, ...])` from `program.dependencies`, then
/// walks it breadth-first from every VIZ/INPUT seed, marking each visited statement live (§4.10,
/// §8 property 7).
pub fn compute_liveness(program: &Program) -> Vec<bool> {
    let count = program.statements.len();
    let mut live = vec![false; count];

    let mut depends_on: HashMap<StatementId, Vec<StatementId>> = HashMap::new();
    for dep in &program.dependencies {
        depends_on
            .entry(dep.target_statement)
            .or_default()
            .push(dep.source_statement);
    }

    let mut worklist: Vec<StatementId> = program
        .statements
        .iter()
        .enumerate()
        .filter(|(_, stmt)| matches!(stmt.statement_type, StatementType::Vizualize | StatementType::Input))
        .map(|(i, _)| i as StatementId)
        .collect();

    while let Some(stmt_id) = worklist.pop() {
        let idx = stmt_id as usize;
        if idx >= count || live[idx] {
            continue;
        }
        live[idx] = true;
        if let Some(sources) = depends_on.get(&stmt_id) {
            worklist.extend(sources.iter().copied());
        }
    }

    live
}
