//! Task graph types and the incremental task planner (§3.4, §4.6).
//!
//! The planner turns a [`ProgramInstance`] into a [`TaskGraph`] of durable work items, reusing as
//! much of a prior graph as the statement diff (§4.5) says is still valid.

mod topo_sort;

use std::collections::HashMap;
use std::collections::HashSet;

use crate::buffer::render_statement_text;
use crate::diff::{DiffCode, DiffOp, ProgramMatcher};
use crate::instance::ProgramInstance;
use crate::store::ScalarValue;
use crate::syntax::{QualifiedName, StatementId, StatementType};
use topo_sort::TopologicalSort;

pub type TaskId = usize;
pub type ObjectId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramTaskType {
    None,
    Input,
    Fetch,
    Load,
    Set,
    CreateTable,
    CreateView,
    CreateViz,
    UpdateViz,
    ModifyTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupTaskType {
    None,
    DropTable,
    DropView,
    DropViz,
    DropInput,
    DropBlob,
    DropSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatusCode {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// A durable unit of work originating from one statement (§3.4).
#[derive(Debug, Clone)]
pub struct ProgramTask {
    pub task_type: ProgramTaskType,
    pub task_status: TaskStatusCode,
    pub object_id: ObjectId,
    pub origin_statement: StatementId,
    pub name_qualified: QualifiedName,
    pub script: String,
    pub depends_on: Vec<TaskId>,
    pub required_for: Vec<TaskId>,
}

/// A task that tears down state left behind by a [`ProgramTask`] that is no longer applicable
/// (§3.4, §4.6 phase 4).
#[derive(Debug, Clone)]
pub struct SetupTask {
    pub task_type: SetupTaskType,
    pub task_status: TaskStatusCode,
    pub object_id: ObjectId,
    pub name_qualified: QualifiedName,
    pub depends_on: Vec<TaskId>,
    pub required_for: Vec<TaskId>,
}

/// Setup tasks and program tasks, each its own array indexed by [`TaskId`] (§3.4).
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    pub setup_tasks: Vec<SetupTask>,
    pub program_tasks: Vec<ProgramTask>,
    pub next_object_id: ObjectId,
}

struct StatementTranslation {
    task_type: ProgramTaskType,
    render_script: bool,
}

/// Statement type → task type, per the fixed table in §4.6. A bare `SELECT` has no entry: it
/// never produces durable state, so no task is emitted for it.
fn statement_translation(stmt_type: StatementType) -> Option<StatementTranslation> {
    use StatementType::*;
    Some(match stmt_type {
        None => StatementTranslation { task_type: ProgramTaskType::None, render_script: false },
        Input => StatementTranslation { task_type: ProgramTaskType::Input, render_script: false },
        Fetch => StatementTranslation { task_type: ProgramTaskType::Fetch, render_script: false },
        Load => StatementTranslation { task_type: ProgramTaskType::Load, render_script: false },
        Set => StatementTranslation { task_type: ProgramTaskType::Set, render_script: false },
        SelectInto | CreateTable | CreateTableAs => {
            StatementTranslation { task_type: ProgramTaskType::CreateTable, render_script: true }
        }
        CreateView => StatementTranslation { task_type: ProgramTaskType::CreateView, render_script: true },
        Vizualize => StatementTranslation { task_type: ProgramTaskType::CreateViz, render_script: false },
        Select => return Option::None,
    })
}

struct TaskInvalidation {
    drop_task: SetupTaskType,
    update_task: ProgramTaskType,
    propagates_backwards: bool,
}

/// Task type → invalidation policy, per the fixed table in §4.6.
fn action_translation(task_type: ProgramTaskType) -> Option<TaskInvalidation> {
    use ProgramTaskType::*;
    Some(match task_type {
        None => TaskInvalidation { drop_task: SetupTaskType::None, update_task: None, propagates_backwards: false },
        CreateTable => TaskInvalidation { drop_task: SetupTaskType::DropTable, update_task: None, propagates_backwards: true },
        CreateView => TaskInvalidation { drop_task: SetupTaskType::DropView, update_task: None, propagates_backwards: true },
        CreateViz => TaskInvalidation { drop_task: SetupTaskType::DropViz, update_task: UpdateViz, propagates_backwards: false },
        Fetch => TaskInvalidation { drop_task: SetupTaskType::DropBlob, update_task: None, propagates_backwards: false },
        Input => TaskInvalidation { drop_task: SetupTaskType::DropInput, update_task: None, propagates_backwards: false },
        Load => TaskInvalidation { drop_task: SetupTaskType::DropTable, update_task: None, propagates_backwards: false },
        ModifyTable => TaskInvalidation { drop_task: SetupTaskType::DropTable, update_task: None, propagates_backwards: true },
        Set => TaskInvalidation { drop_task: SetupTaskType::DropSet, update_task: None, propagates_backwards: false },
        UpdateViz => TaskInvalidation { drop_task: SetupTaskType::DropViz, update_task: UpdateViz, propagates_backwards: false },
    })
}

fn lookup_task_id(task_mapping: &[Option<TaskId>], stmt_id: StatementId) -> Option<TaskId> {
    task_mapping.get(stmt_id as usize).copied().flatten()
}

fn find_input_value(instance: &ProgramInstance, stmt_id: StatementId) -> Option<ScalarValue> {
    instance
        .input_values
        .iter()
        .find(|(id, _)| *id == stmt_id)
        .map(|(_, v)| v.clone())
}

/// Diffs `next_program` against `prev_program` and migrates `prev_task_graph` onto it (§4.6).
pub struct TaskPlanner<'a> {
    next_program: &'a ProgramInstance,
    prev_program: Option<&'a ProgramInstance>,
    prev_task_graph: Option<&'a TaskGraph>,

    diff: Vec<DiffOp>,
    task_mapping: Vec<Option<TaskId>>,
    /// Maps a new task id to the previous task it corresponds to, for diff codes KEEP/MOVE/UPDATE.
    reverse_task_mapping: Vec<Option<TaskId>>,
    task_applicability: Vec<bool>,
    task_graph: TaskGraph,
}

impl<'a> TaskPlanner<'a> {
    pub fn new(
        next_program: &'a ProgramInstance,
        prev_program: Option<&'a ProgramInstance>,
        prev_task_graph: Option<&'a TaskGraph>,
    ) -> Self {
        let mut task_graph = TaskGraph::default();
        if let Some(prev) = prev_task_graph {
            task_graph.next_object_id = prev.next_object_id;
        }
        TaskPlanner {
            next_program,
            prev_program,
            prev_task_graph,
            diff: Vec::new(),
            task_mapping: Vec::new(),
            reverse_task_mapping: Vec::new(),
            task_applicability: Vec::new(),
            task_graph,
        }
    }

    /// §4.6 phase 1.
    fn diff_programs(&mut self) {
        match self.prev_program {
            None => {
                let count = self.next_program.program.statements.len() as StatementId;
                self.diff = (0..count).map(|i| DiffOp { code: DiffCode::Insert, source: Option::None, target: Some(i) }).collect();
            }
            Some(prev) => {
                let mut matcher = ProgramMatcher::new(prev, self.next_program);
                self.diff = matcher.compute_diff();
                self.diff.sort_by(|l, r| match (l.source, r.source) {
                    (Option::None, Option::None) => std::cmp::Ordering::Equal,
                    (Option::None, Some(_)) => std::cmp::Ordering::Greater,
                    (Some(_), Option::None) => std::cmp::Ordering::Less,
                    (Some(a), Some(b)) => a.cmp(&b),
                });
            }
        }
    }

    /// §4.6 phase 2.
    fn translate_statements(&mut self) {
        let next = &self.next_program.program;
        let stmts = &next.statements;
        let liveness = &self.next_program.statements_liveness;

        let mut tasks: Vec<Option<ProgramTask>> = Vec::with_capacity(stmts.len());
        self.task_mapping = vec![Option::None; stmts.len()];

        for stmt_id in 0..stmts.len() {
            let stmt = &stmts[stmt_id];
            // Burned even for statements with no translation, mirroring the source's
            // unconditional pre-increment.
            let object_id = self.task_graph.next_object_id;
            self.task_graph.next_object_id += 1;

            let is_live = liveness.get(stmt_id).copied().unwrap_or(false);
            let task_status = if is_live { TaskStatusCode::Pending } else { TaskStatusCode::Skipped };

            match statement_translation(stmt.statement_type) {
                Some(StatementTranslation { task_type, render_script }) => {
                    let script = if render_script {
                        render_statement_text(self.next_program, stmt_id as StatementId).unwrap_or_default()
                    } else {
                        String::new()
                    };
                    tasks.push(Some(ProgramTask {
                        task_type,
                        task_status,
                        object_id,
                        origin_statement: stmt_id as StatementId,
                        name_qualified: stmt.name.clone(),
                        script,
                        depends_on: Vec::new(),
                        required_for: Vec::new(),
                    }));
                }
                Option::None => tasks.push(Option::None),
            }
        }

        for (i, task) in tasks.into_iter().enumerate() {
            if let Some(task) = task {
                self.task_mapping[i] = Some(self.task_graph.program_tasks.len());
                self.task_graph.program_tasks.push(task);
            }
        }

        for dep in &next.dependencies {
            let src = lookup_task_id(&self.task_mapping, dep.source_statement);
            let tgt = lookup_task_id(&self.task_mapping, dep.target_statement);
            if let (Some(src), Some(tgt)) = (src, tgt) {
                self.task_graph.program_tasks[src].required_for.push(tgt);
                self.task_graph.program_tasks[tgt].depends_on.push(src);
            }
        }

        self.reverse_task_mapping = vec![Option::None; self.task_graph.program_tasks.len()];
        if let Some(prev_graph) = self.prev_task_graph {
            let mut prev_task_by_statement: HashMap<StatementId, TaskId> = HashMap::new();
            for (task_id, task) in prev_graph.program_tasks.iter().enumerate() {
                prev_task_by_statement.insert(task.origin_statement, task_id);
            }
            for diff_op in &self.diff {
                if !matches!(diff_op.code, DiffCode::Keep | DiffCode::Move | DiffCode::Update) {
                    continue;
                }
                let (Some(source), Some(target)) = (diff_op.source, diff_op.target) else {
                    continue;
                };
                let Some(&prev_task_id) = prev_task_by_statement.get(&source) else {
                    continue;
                };
                let Some(next_task_id) = lookup_task_id(&self.task_mapping, target) else {
                    continue;
                };
                self.reverse_task_mapping[next_task_id] = Some(prev_task_id);
            }
        }
    }

    /// Walks `pending` (invalidating `task_id` and, if the *root's* kind propagates, the root's
    /// direct `depends_on` — one level, not transitively) until the worklist is dry (§4.6 phase
    /// 3). Every iteration re-reads `prev_tasks[task_id]`, the captured invalidation root, not
    /// `prev_tasks[top]`: propagation is decided once by the root's own task type and applied to
    /// its immediate dependencies, it does not keep walking each dependency's own dependencies.
    fn invalidate(prev_tasks: &[ProgramTask], applicability: &mut [bool], task_id: TaskId) {
        let mut visited = HashSet::new();
        let mut pending = vec![task_id];
        while let Some(top) = pending.pop() {
            if !visited.insert(top) {
                continue;
            }
            let task = &prev_tasks[task_id];
            let Some(info) = action_translation(task.task_type) else {
                continue;
            };
            if info.propagates_backwards {
                pending.extend(task.depends_on.iter().copied());
            }
            applicability[top] = false;
        }
    }

    /// §4.6 phase 3.
    fn identify_applicable_tasks(&mut self) {
        let Some(prev_graph) = self.prev_task_graph else {
            return;
        };
        let prev_tasks = &prev_graph.program_tasks;
        self.task_applicability = vec![false; prev_tasks.len()];

        let deps: Vec<(TaskId, i64)> =
            prev_tasks.iter().enumerate().map(|(i, t)| (i, t.depends_on.len() as i64)).collect();
        let mut pending = TopologicalSort::new(deps);

        while !pending.is_empty() {
            let (prev_task_id, _) = pending.top();
            pending.pop();

            let task = &prev_tasks[prev_task_id];
            for &next in &task.required_for {
                pending.decrement_key(next);
            }

            if task.task_status != TaskStatusCode::Completed {
                Self::invalidate(prev_tasks, &mut self.task_applicability, prev_task_id);
                continue;
            }

            let diff_op = self.diff[task.origin_statement as usize];
            match diff_op.code {
                DiffCode::Move | DiffCode::Keep => {
                    let all_applicable = task.depends_on.iter().all(|&d| self.task_applicability[d]);
                    if !all_applicable {
                        Self::invalidate(prev_tasks, &mut self.task_applicability, prev_task_id);
                        continue;
                    }

                    let Some(target) = diff_op.target else {
                        Self::invalidate(prev_tasks, &mut self.task_applicability, prev_task_id);
                        continue;
                    };
                    let Some(next_task_id) = lookup_task_id(&self.task_mapping, target) else {
                        Self::invalidate(prev_tasks, &mut self.task_applicability, prev_task_id);
                        continue;
                    };

                    let mut next_deps = self.task_graph.program_tasks[next_task_id].depends_on.clone();
                    let mut deps_mapped = true;
                    for dep in next_deps.iter_mut() {
                        match self.reverse_task_mapping[*dep] {
                            Some(mapped) => *dep = mapped,
                            Option::None => {
                                deps_mapped = false;
                                break;
                            }
                        }
                    }
                    let mut own_deps = task.depends_on.clone();
                    own_deps.sort_unstable();
                    next_deps.sort_unstable();
                    if !deps_mapped || next_deps != own_deps {
                        Self::invalidate(prev_tasks, &mut self.task_applicability, prev_task_id);
                        continue;
                    }

                    if task.task_type == ProgramTaskType::Input {
                        let Some(source) = diff_op.source else {
                            Self::invalidate(prev_tasks, &mut self.task_applicability, prev_task_id);
                            continue;
                        };
                        let prev_param = self.prev_program.and_then(|p| find_input_value(p, source));
                        let next_param = find_input_value(self.next_program, target);
                        if prev_param != next_param {
                            Self::invalidate(prev_tasks, &mut self.task_applicability, prev_task_id);
                            continue;
                        }
                    }

                    self.task_applicability[prev_task_id] = true;
                }
                DiffCode::Update | DiffCode::Delete => {
                    Self::invalidate(prev_tasks, &mut self.task_applicability, prev_task_id);
                }
                DiffCode::Insert => unreachable!("a previous task can never diff as INSERT"),
            }
        }
    }

    /// §4.6 phases 4-5.
    fn migrate_task_graph(&mut self) {
        let Some(prev_graph) = self.prev_task_graph else {
            return;
        };
        let prev_program_tasks = &prev_graph.program_tasks;

        let mut setup: Vec<Option<SetupTask>> = Vec::with_capacity(prev_program_tasks.len());
        for prev_task_id in 0..prev_program_tasks.len() {
            setup.push(Option::None);

            let prev_task = &prev_program_tasks[prev_task_id];
            let diff_op = self.diff[prev_task.origin_statement as usize];
            let Some(info) = action_translation(prev_task.task_type) else {
                continue;
            };

            if self.task_applicability[prev_task_id] {
                let next_stmt_id = diff_op.target.expect("applicable task diffs to a target");
                let next_task_id =
                    lookup_task_id(&self.task_mapping, next_stmt_id).expect("applicable task maps to a next task");
                let next_task = &mut self.task_graph.program_tasks[next_task_id];
                next_task.task_status = TaskStatusCode::Completed;
                next_task.object_id = prev_task.object_id;
                continue;
            }

            if info.update_task != ProgramTaskType::None
                && matches!(diff_op.code, DiffCode::Update | DiffCode::Move | DiffCode::Keep)
            {
                if let Some(next_stmt_id) = diff_op.target {
                    if let Some(next_task_id) = lookup_task_id(&self.task_mapping, next_stmt_id) {
                        let next_task = &mut self.task_graph.program_tasks[next_task_id];
                        next_task.task_type = info.update_task;
                        next_task.object_id = prev_task.object_id;
                    }
                }
            } else if info.drop_task != SetupTaskType::None {
                setup[prev_task_id] = Some(SetupTask {
                    task_type: info.drop_task,
                    task_status: TaskStatusCode::Pending,
                    object_id: prev_task.object_id,
                    name_qualified: prev_task.name_qualified.clone(),
                    // Reversed: if B depended on A, DROP(B) must run before DROP(A).
                    depends_on: prev_task.required_for.clone(),
                    required_for: prev_task.depends_on.clone(),
                });
            }
        }

        let mut task_id_mapping: Vec<Option<TaskId>> = vec![Option::None; setup.len()];
        for (i, s) in setup.into_iter().enumerate() {
            if let Some(s) = s {
                task_id_mapping[i] = Some(self.task_graph.setup_tasks.len());
                self.task_graph.setup_tasks.push(s);
            }
        }

        let patch_ids = |ids: &mut Vec<TaskId>, mapping: &[Option<TaskId>]| {
            let mut n = 0;
            for i in 0..ids.len() {
                if let Some(mapped) = mapping.get(ids[i]).copied().flatten() {
                    ids[n] = mapped;
                    n += 1;
                }
            }
            ids.truncate(n);
        };
        for i in 0..self.task_graph.setup_tasks.len() {
            let mut required_for = std::mem::take(&mut self.task_graph.setup_tasks[i].required_for);
            let mut depends_on = std::mem::take(&mut self.task_graph.setup_tasks[i].depends_on);
            patch_ids(&mut required_for, &task_id_mapping);
            patch_ids(&mut depends_on, &task_id_mapping);
            self.task_graph.setup_tasks[i].required_for = required_for;
            self.task_graph.setup_tasks[i].depends_on = depends_on;
        }
    }

    /// Runs all five phases of §4.6.1 in order.
    pub fn plan_task_graph(&mut self) {
        self.diff_programs();
        self.translate_statements();
        self.identify_applicable_tasks();
        self.migrate_task_graph();
    }

    pub fn finish(self) -> TaskGraph {
        self.task_graph
    }
}
