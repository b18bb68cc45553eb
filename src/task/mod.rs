//! The task contract.
//!
//! A [`Task`] is one named, independently testable step of a command's
//! graph. Tasks are plain definitions built once per graph; all run state
//! lives in the [`ExecutionContext`] they receive.
//!
//! Hooks and their defaults:
//!
//! | hook | default |
//! |------|---------|
//! | [`Task::should_execute`] | always [`SkipDecision::Run`] |
//! | [`Task::next`] | [`Flow::Continue`] |
//! | [`Task::supports_undo`] | `false` |
//! | [`Task::can_undo`] | same as `supports_undo` |
//! | [`Task::is_irreversible`] | `false` |
//!
//! [`FnTask`] builds a task from closures, which is handy for ad-hoc graphs
//! and tests.

use std::fmt;
use std::sync::Arc;

use crate::context::{ExecutionContext, TaskContext};
use crate::error::Result;

/// Static metadata of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: String,
    pub description: String,
    pub dependencies: Vec<String>,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            dependencies: Vec::new(),
        }
    }

    /// Add dependencies.
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Outcome of a task's run/skip predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipDecision {
    Run,
    /// Skip with a human-readable reason
    Skip(String),
}

impl SkipDecision {
    pub fn skip(reason: impl Into<String>) -> Self {
        SkipDecision::Skip(reason.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, SkipDecision::Skip(_))
    }
}

/// Instruction a task hands the orchestrator after executing successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Proceed with the next scheduled task.
    Continue,
    /// Bypass every scheduled task up to (not including) the named one.
    SkipTo(String),
    /// Stop the run and compensate everything done so far.
    Abort(String),
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Continue => f.write_str("continue"),
            Flow::SkipTo(id) => write!(f, "skip to '{}'", id),
            Flow::Abort(reason) => write!(f, "abort ({})", reason),
        }
    }
}

/// A unit of work in a command's task graph.
pub trait Task: Send + Sync {
    fn spec(&self) -> &TaskSpec;

    fn id(&self) -> &str {
        &self.spec().id
    }

    fn description(&self) -> &str {
        &self.spec().description
    }

    fn dependencies(&self) -> &[String] {
        &self.spec().dependencies
    }

    /// Decide whether to run. An error fails the task.
    fn should_execute(&self, _ctx: &ExecutionContext) -> Result<SkipDecision> {
        Ok(SkipDecision::Run)
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()>;

    /// Post-execution instruction, evaluated only after a successful `execute`.
    fn next(&self, _ctx: &ExecutionContext) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// Whether the task defines a compensating [`undo`](Self::undo).
    fn supports_undo(&self) -> bool {
        false
    }

    /// Run-time opt-out of rollback registration.
    fn can_undo(&self, _ctx: &ExecutionContext) -> bool {
        self.supports_undo()
    }

    fn undo(&self, _ctx: &mut TaskContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Whether a successful run left effects outside the project that no
    /// undo can take back. Rollback stops at such a task.
    fn is_irreversible(&self, _ctx: &ExecutionContext) -> bool {
        false
    }
}

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("dependencies", &self.dependencies())
            .field("undoable", &self.supports_undo())
            .finish()
    }
}

type ExecuteFn = Box<dyn Fn(&mut TaskContext<'_>) -> Result<()> + Send + Sync>;
type PredicateFn = Box<dyn Fn(&ExecutionContext) -> Result<SkipDecision> + Send + Sync>;
type FlowFn = Box<dyn Fn(&ExecutionContext) -> Result<Flow> + Send + Sync>;
type CanUndoFn = Box<dyn Fn(&ExecutionContext) -> bool + Send + Sync>;

/// A task assembled from closures.
///
/// ```
/// use shipwright::task::{FnTask, SkipDecision, Task};
///
/// let task = FnTask::new("greet", |ctx| ctx.set("greeting", "hello"))
///     .depends_on(["setup"])
///     .skip_when(|ctx| Ok(if ctx.config().dry_run {
///         SkipDecision::skip("dry run")
///     } else {
///         SkipDecision::Run
///     }))
///     .with_undo(|ctx| {
///         ctx.remove("greeting");
///         Ok(())
///     });
///
/// assert_eq!(task.id(), "greet");
/// assert!(task.supports_undo());
/// ```
pub struct FnTask {
    spec: TaskSpec,
    execute: ExecuteFn,
    predicate: Option<PredicateFn>,
    flow: Option<FlowFn>,
    undo: Option<ExecuteFn>,
    can_undo: Option<CanUndoFn>,
    irreversible: bool,
}

impl FnTask {
    pub fn new<F>(id: impl Into<String>, execute: F) -> Self
    where
        F: Fn(&mut TaskContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let id = id.into();
        Self {
            spec: TaskSpec::new(id.clone(), id),
            execute: Box::new(execute),
            predicate: None,
            flow: None,
            undo: None,
            can_undo: None,
            irreversible: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.spec.description = description.into();
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec = self.spec.depends_on(ids);
        self
    }

    pub fn skip_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<SkipDecision> + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn then_flow<F>(mut self, flow: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<Flow> + Send + Sync + 'static,
    {
        self.flow = Some(Box::new(flow));
        self
    }

    pub fn with_undo<F>(mut self, undo: F) -> Self
    where
        F: Fn(&mut TaskContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.undo = Some(Box::new(undo));
        self
    }

    pub fn can_undo_when<F>(mut self, can_undo: F) -> Self
    where
        F: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    {
        self.can_undo = Some(Box::new(can_undo));
        self
    }

    /// Mark the task's effects as impossible to take back once it succeeds.
    pub fn irreversible(mut self) -> Self {
        self.irreversible = true;
        self
    }

    pub fn into_ref(self) -> TaskRef {
        Arc::new(self)
    }
}

impl Task for FnTask {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn should_execute(&self, ctx: &ExecutionContext) -> Result<SkipDecision> {
        match &self.predicate {
            Some(predicate) => predicate(ctx),
            None => Ok(SkipDecision::Run),
        }
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        (self.execute)(ctx)
    }

    fn next(&self, ctx: &ExecutionContext) -> Result<Flow> {
        match &self.flow {
            Some(flow) => flow(ctx),
            None => Ok(Flow::Continue),
        }
    }

    fn supports_undo(&self) -> bool {
        self.undo.is_some()
    }

    fn can_undo(&self, ctx: &ExecutionContext) -> bool {
        self.supports_undo() && self.can_undo.as_ref().map_or(true, |f| f(ctx))
    }

    fn undo(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        match &self.undo {
            Some(undo) => undo(ctx),
            None => Ok(()),
        }
    }

    fn is_irreversible(&self, _ctx: &ExecutionContext) -> bool {
        self.irreversible
    }
}
