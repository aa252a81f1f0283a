//! The analyzer façade (§4.9): a single-threaded, process-wide component wiring together parse,
//! instantiate, plan, and edit. Modeled as an owned value rather than an actual global static —
//! "the singleton is a convenience for the in-process API boundary, not a semantic requirement"
//! (§9).

use std::collections::VecDeque;
use std::rc::Rc;

#[cfg(feature = "tracing")]
use tracing::{debug, instrument};

use crate::board::{BoardAllocator, INPUT_DEFAULT_SIZE, VIZ_DEFAULT_SIZE};
use crate::editor::{apply_edits, EditOperation};
use crate::error::AnalyzerError;
use crate::eval::{evaluate_input_values, propagate_constants};
use crate::instance::ProgramInstance;
use crate::liveness::compute_liveness;
use crate::options::ScriptOptions;
use crate::plan::{TaskGraph, TaskId, TaskPlanner, TaskStatusCode};
use crate::stmt::{FetchStatement, InputStatement, LoadStatement, SetStatement, VizStatement};
use crate::store::ScalarValue;
use crate::syntax::{Program, StatementId, StatementType};

/// Fixed power-of-two size of the rotating previous-instance log (§4.9).
const LOG_CAPACITY: usize = 64;

/// Which of the two task arrays [`Analyzer::update_task_status`] addresses (§3.4, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskClass {
    Setup,
    Program,
}

/// Top-level lifecycle state (§4.9): the volatile parsed program, the current instance, a
/// rotating log of evicted instances, and the most recently planned program/graph pair.
pub struct Analyzer {
    text: Rc<str>,
    program: Option<Rc<Program>>,
    options: ScriptOptions,

    current_instance: Option<ProgramInstance>,
    log: VecDeque<ProgramInstance>,

    planned_instance: Option<ProgramInstance>,
    planned_graph: Option<TaskGraph>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            text: Rc::from(""),
            program: None,
            options: ScriptOptions::default(),
            current_instance: None,
            log: VecDeque::new(),
            planned_instance: None,
            planned_graph: None,
        }
    }

    pub fn with_options(options: ScriptOptions) -> Self {
        Analyzer { options, ..Self::new() }
    }

    pub fn current_instance(&self) -> Option<&ProgramInstance> {
        self.current_instance.as_ref()
    }

    pub fn planned_graph(&self) -> Option<&TaskGraph> {
        self.planned_graph.as_ref()
    }

    /// Number of previously-current instances still held in the rotating log (§4.9, §9).
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// `parse_program(text)` (§4.9): replaces the volatile text and parsed program. The
    /// grammar/tokenizer that produces `program` is an external collaborator out of this core's
    /// scope (§1); this is the seam a bound parser calls through.
    #[cfg_attr(feature = "tracing", instrument(skip(self, program)))]
    pub fn parse_program(&mut self, text: impl Into<Rc<str>>, program: Program) {
        self.text = text.into();
        #[cfg(feature = "tracing")]
        debug!(statements = program.statements.len(), "parsed volatile program");
        self.program = Some(Rc::new(program));
    }

    /// `instantiate_program(inputs)` (§4.9, §4.9.1): runs the nine fixed passes in order over the
    /// volatile parse. On success the previous current instance is evicted into the rotating log
    /// (oldest entry dropped first once full); on failure `current_instance` is left untouched.
    #[cfg_attr(feature = "tracing", instrument(skip(self, inputs)))]
    pub fn instantiate_program(&mut self, inputs: Vec<(StatementId, ScalarValue)>) -> Result<(), AnalyzerError> {
        let program = self
            .program
            .clone()
            .ok_or_else(|| AnalyzerError::invalid("no parsed program to instantiate"))?;
        let instance = run_instantiation_passes(self.text.clone(), program, inputs, self.options.clone())?;

        if let Some(prev) = self.current_instance.take() {
            if self.log.len() >= LOG_CAPACITY {
                self.log.pop_front();
            }
            self.log.push_back(prev);
        }
        #[cfg(feature = "tracing")]
        debug!(log_len = self.log.len(), "instantiated new program instance");
        self.current_instance = Some(instance);
        Ok(())
    }

    /// `edit_program(edit)` (§4.8, §4.9): rewrites the volatile source text via the program
    /// editor. The caller is expected to feed the returned text back through a real parser and
    /// then call [`Self::parse_program`]/[`Self::instantiate_program`] (§4.8 "The caller is
    /// expected to re-parse and re-instantiate").
    #[cfg_attr(feature = "tracing", instrument(skip(self, edits)))]
    pub fn edit_program(&mut self, edits: &[EditOperation]) -> Result<String, AnalyzerError> {
        let program = self
            .program
            .clone()
            .ok_or_else(|| AnalyzerError::invalid("no parsed program to edit"))?;
        apply_edits(program, self.text.clone(), &self.options, edits)
    }

    /// `plan_program()` (§4.6, §4.9): plans the current instance against the most recently
    /// *planned* program (not necessarily the previous `current_instance`) and the last planned
    /// graph, then remembers both for the next call.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub fn plan_program(&mut self) -> Result<(), AnalyzerError> {
        let next = self
            .current_instance
            .as_ref()
            .ok_or_else(|| AnalyzerError::invalid("no current instance to plan"))?;

        let mut planner = TaskPlanner::new(next, self.planned_instance.as_ref(), self.planned_graph.as_ref());
        planner.plan_task_graph();
        let graph = planner.finish();

        #[cfg(feature = "tracing")]
        debug!(
            setup_tasks = graph.setup_tasks.len(),
            program_tasks = graph.program_tasks.len(),
            "planned task graph"
        );

        self.planned_instance = self.current_instance.clone();
        self.planned_graph = Some(graph);
        Ok(())
    }

    /// `update_task_status(class, id, status)` (§4.9): out-of-range ids are a no-op.
    pub fn update_task_status(&mut self, class: TaskClass, id: TaskId, status: TaskStatusCode) {
        let Some(graph) = self.planned_graph.as_mut() else {
            return;
        };
        match class {
            TaskClass::Setup => {
                if let Some(task) = graph.setup_tasks.get_mut(id) {
                    task.task_status = status;
                }
            }
            TaskClass::Program => {
                if let Some(task) = graph.program_tasks.get_mut(id) {
                    task.task_status = status;
                }
            }
        }
    }
}

/// Runs the fixed nine-pass instantiation order (§4.9.1) over a fresh [`ProgramInstance`]. Any
/// failure here must leave the caller's `current_instance` untouched, so this never mutates
/// `Analyzer` state directly — it only builds and returns a new instance.
fn run_instantiation_passes(
    text: Rc<str>,
    program: Rc<Program>,
    inputs: Vec<(StatementId, ScalarValue)>,
    options: ScriptOptions,
) -> Result<ProgramInstance, AnalyzerError> {
    let mut instance = ProgramInstance::empty(text, program, options);
    instance.input_values = inputs;

    // 1. evaluate input values
    evaluate_input_values(&mut instance);
    // 2. propagate constants
    propagate_constants(&mut instance);

    let statement_count = instance.program.statements.len() as StatementId;

    // 3. analyze INPUT statements
    for stmt_id in 0..statement_count {
        if instance.program.statements[stmt_id as usize].statement_type == StatementType::Input {
            if let Some(record) = InputStatement::read_from(&instance, stmt_id) {
                instance.input.push(record);
            }
        }
    }
    // 4. analyze FETCH statements
    for stmt_id in 0..statement_count {
        if instance.program.statements[stmt_id as usize].statement_type == StatementType::Fetch {
            if let Some(record) = FetchStatement::read_from(&mut instance, stmt_id) {
                instance.fetch.push(record);
            }
        }
    }
    // 5. analyze SET statements
    for stmt_id in 0..statement_count {
        if instance.program.statements[stmt_id as usize].statement_type == StatementType::Set {
            if let Some(record) = SetStatement::read_from(&instance, stmt_id) {
                instance.set.push(record);
            }
        }
    }
    // 6. analyze LOAD statements
    for stmt_id in 0..statement_count {
        if instance.program.statements[stmt_id as usize].statement_type == StatementType::Load {
            if let Some(record) = LoadStatement::read_from(&instance, stmt_id) {
                instance.load.push(record);
            }
        }
    }
    // 7. analyze VIZ statements
    for stmt_id in 0..statement_count {
        if instance.program.statements[stmt_id as usize].statement_type == StatementType::Vizualize {
            if let Some(record) = VizStatement::read_from(&mut instance, stmt_id) {
                instance.viz.push(record);
            }
        }
    }

    // 8. identify dead statements
    instance.statements_liveness = compute_liveness(&instance.program);

    // 9. compute card positions
    let mut allocator = BoardAllocator::new();
    for input in instance.input.iter_mut() {
        input.specified_position = Some(allocator.allocate(input.requested_position, INPUT_DEFAULT_SIZE));
    }
    for viz in instance.viz.iter_mut() {
        viz.specified_position = Some(allocator.allocate(viz.requested_position, VIZ_DEFAULT_SIZE));
    }

    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{AttributeKey, Location, Node, Statement, NO_PARENT};

    fn input_program(name: &str) -> (Rc<str>, Program) {
        let text = format!("INPUT {name}");
        let mut program = Program::default();
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::ObjectDashqlInput,
            attribute_key: AttributeKey::NONE,
            parent: NO_PARENT,
            children_begin_or_value: 1,
            children_count: 1,
            location: Location::new(0, text.len() as u32),
        });
        program.nodes.push(Node {
            node_type: crate::syntax::NodeType::StringRef,
            attribute_key: AttributeKey::DASHQL_STATEMENT_NAME,
            parent: 0,
            children_begin_or_value: 0,
            children_count: 0,
            location: Location::new(6, name.len() as u32),
        });
        program.statements.push(Statement {
            statement_type: StatementType::Input,
            root_node: 0,
            name: Default::default(),
        });
        (Rc::from(text.as_str()), program)
    }

    #[test]
    fn test_instantiate_without_parse_fails() {
        let mut analyzer = Analyzer::new();
        assert!(analyzer.instantiate_program(Vec::new()).is_err());
    }

    #[test]
    fn test_full_lifecycle_produces_input_card_and_plan() {
        let (text, program) = input_program("country");
        let mut analyzer = Analyzer::new();
        analyzer.parse_program(text, program);
        analyzer.instantiate_program(Vec::new()).unwrap();

        let instance = analyzer.current_instance().unwrap();
        assert_eq!(instance.input.len(), 1);
        assert!(instance.input[0].specified_position.is_some());
        assert!(instance.statements_liveness[0]);

        analyzer.plan_program().unwrap();
        let graph = analyzer.planned_graph().unwrap();
        assert_eq!(graph.program_tasks.len(), 1);
        assert_eq!(graph.program_tasks[0].task_status, TaskStatusCode::Pending);
    }

    #[test]
    fn test_reinstantiate_evicts_previous_into_log() {
        let (text, program) = input_program("country");
        let mut analyzer = Analyzer::new();
        analyzer.parse_program(text.clone(), program.clone());
        analyzer.instantiate_program(Vec::new()).unwrap();
        assert_eq!(analyzer.log_len(), 0);

        analyzer.parse_program(text, program);
        analyzer.instantiate_program(Vec::new()).unwrap();
        assert_eq!(analyzer.log_len(), 1);
    }

    #[test]
    fn test_failed_instantiate_leaves_current_instance_untouched() {
        let (text, program) = input_program("country");
        let mut analyzer = Analyzer::new();
        analyzer.parse_program(text, program);
        analyzer.instantiate_program(Vec::new()).unwrap();

        // Drop the volatile parse to force the next instantiate to fail.
        analyzer.program = None;
        assert!(analyzer.instantiate_program(Vec::new()).is_err());
        assert!(analyzer.current_instance().is_some());
    }

    #[test]
    fn test_update_task_status_ignores_out_of_range_id() {
        let (text, program) = input_program("country");
        let mut analyzer = Analyzer::new();
        analyzer.parse_program(text, program);
        analyzer.instantiate_program(Vec::new()).unwrap();
        analyzer.plan_program().unwrap();

        analyzer.update_task_status(TaskClass::Program, 999, TaskStatusCode::Completed);
        analyzer.update_task_status(TaskClass::Program, 0, TaskStatusCode::Completed);
        assert_eq!(
            analyzer.planned_graph().unwrap().program_tasks[0].task_status,
            TaskStatusCode::Completed
        );
    }
}
