//! Task orchestration.
//!
//! [`Orchestrator::run`] drives one command's tasks to completion:
//!
//! 1. resolve the execution order; a resolution error ends the run before
//!    anything executes
//! 2. for each task, check for cancellation, evaluate its skip predicate,
//!    register it for rollback if it is undoable, execute it, then apply its
//!    [`Flow`] instruction
//! 3. on the first failure stop, and undo everything registered so far in
//!    reverse order, down to the most recent irreversible task
//!
//! A panic inside a task hook is a failure of that task like any other.
//!
//! The run consumes the [`ExecutionContext`] and always returns an
//! [`ExecutionReport`]; errors end up inside the report rather than being
//! returned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;

use crate::context::{ExecutionContext, TaskContext};
use crate::error::ShipwrightError;
use crate::task::{Flow, SkipDecision, Task, TaskRef};

use super::events::{EventSink, RunEvent, TracingSink};
use super::graph;
use super::report::{ExecutionReport, RunState, TaskRecord, TaskStatus};
use super::rollback::{catch_panic, RollbackManager, RollbackOutcome};

/// Shared flag asking a run to stop before its next task.
///
/// A task that has started always runs to completion; the orchestrator only
/// looks at the token between tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs task graphs against an execution context.
pub struct Orchestrator {
    sinks: Vec<Box<dyn EventSink>>,
    cancel: CancelToken,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// An orchestrator that reports events through `tracing`.
    pub fn new() -> Self {
        Self::silent().with_sink(TracingSink::new())
    }

    /// An orchestrator without any event sink.
    pub fn silent() -> Self {
        Self {
            sinks: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle for requesting cancellation of runs started by this orchestrator.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn emit(&mut self, event: RunEvent<'_>) {
        for sink in &mut self.sinks {
            sink.emit(&event);
        }
    }

    /// Run `tasks` against `context`.
    pub fn run(&mut self, tasks: &[TaskRef], mut context: ExecutionContext) -> ExecutionReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut run = RunTracker::new();

        context.seal();
        run.transition(RunState::Running);

        let order = match graph::resolve(tasks) {
            Ok(order) => order,
            Err(err) => {
                debug!("Resolution failed: {}", err);
                run.fail(err);
                return self.finish(run, context, started_at, start);
            }
        };

        self.emit(RunEvent::RunStarted {
            execution_id: context.execution_id(),
            command: context.command(),
            total: order.len(),
        });

        let by_id: HashMap<&str, &TaskRef> = tasks.iter().map(|t| (t.id(), t)).collect();
        let mut position = 0;

        while position < order.len() {
            let id = order[position].as_str();
            let Some(task) = by_id.get(id).copied() else {
                run.fail(
                    ShipwrightError::unexpected(format!("resolved task '{}' is missing", id))
                        .in_component("orchestrator"),
                );
                break;
            };

            if self.cancel.is_cancelled() {
                self.emit(RunEvent::Cancelled { before: id });
                run.fail(
                    ShipwrightError::failed(format!("run cancelled before '{}'", id))
                        .in_component("orchestrator"),
                );
                break;
            }

            let decision = catch_panic(&format!("skip check of '{}'", id), "orchestrator", || {
                task.should_execute(&context)
            });
            match decision {
                Ok(SkipDecision::Run) => {}
                Ok(SkipDecision::Skip(reason)) => {
                    self.emit(RunEvent::TaskSkipped { id, reason: &reason });
                    run.record(TaskRecord::skipped(id, reason));
                    position += 1;
                    continue;
                }
                Err(err) => {
                    let err = err.context(format!("deciding whether to run '{}'", id));
                    self.emit(RunEvent::TaskFailed { id, error: &err });
                    run.record(TaskRecord::failed(id, Duration::ZERO, err.summary()));
                    run.fail(err);
                    break;
                }
            }

            if task.can_undo(&context) {
                run.rollback.add_task(Arc::clone(task));
            }

            self.emit(RunEvent::TaskStarted {
                id,
                description: task.description(),
                index: position,
                total: order.len(),
            });

            let task_start = Instant::now();
            let executed = catch_panic(&format!("'{}'", id), "orchestrator", || {
                task.execute(&mut TaskContext::new(&mut context))
            });
            if executed.is_ok() && task.is_irreversible(&context) {
                run.rollback.add_barrier(id);
            }
            let outcome = executed.and_then(|()| {
                catch_panic(&format!("flow of '{}'", id), "orchestrator", || {
                    task.next(&context)
                })
            });
            let duration = task_start.elapsed();

            let flow = match outcome {
                Ok(flow) => flow,
                Err(err) => {
                    self.emit(RunEvent::TaskFailed { id, error: &err });
                    run.record(TaskRecord::failed(id, duration, err.summary()));
                    run.fail(err);
                    break;
                }
            };

            match flow {
                Flow::Continue => {
                    self.emit(RunEvent::TaskSucceeded { id, duration });
                    run.record(TaskRecord::executed(id, duration));
                    position += 1;
                }
                Flow::SkipTo(target) => {
                    let Some(offset) = order[position + 1..].iter().position(|t| *t == target)
                    else {
                        let err = ShipwrightError::invalid(format!(
                            "'{}' asked to skip to '{}', which is not scheduled after it",
                            id, target
                        ))
                        .in_component("orchestrator");
                        self.emit(RunEvent::TaskFailed { id, error: &err });
                        run.record(TaskRecord::failed(id, duration, err.summary()));
                        run.fail(err);
                        break;
                    };

                    let target_position = position + 1 + offset;
                    let bypassed = &order[position + 1..target_position];

                    self.emit(RunEvent::TaskSucceeded { id, duration });
                    run.record(
                        TaskRecord::executed(id, duration).with_reason(format!("skip to '{}'", target)),
                    );
                    self.emit(RunEvent::SkippedThrough {
                        from: id,
                        to: &target,
                        bypassed,
                    });
                    for skipped in bypassed {
                        run.record(TaskRecord::skipped(
                            skipped.as_str(),
                            format!("skipped through by '{}'", id),
                        ));
                    }
                    position = target_position;
                }
                Flow::Abort(reason) => {
                    self.emit(RunEvent::TaskSucceeded { id, duration });
                    self.emit(RunEvent::Aborted { id, reason: &reason });
                    run.record(
                        TaskRecord::executed(id, duration).with_reason(format!("aborted: {}", reason)),
                    );
                    run.fail(
                        ShipwrightError::failed(format!("'{}' aborted the run: {}", id, reason))
                            .in_component("orchestrator"),
                    );
                    break;
                }
            }
        }

        if run.error.is_some() && run.rollback.needs_rollback() {
            run.transition(RunState::RollingBack);
            self.emit(RunEvent::RollbackStarted {
                tasks: run.rollback.len(),
            });

            let mut rollback = std::mem::take(&mut run.rollback);
            let outcome = rollback.execute_rollback(|task| {
                self.emit(RunEvent::UndoStarted { id: task.id() });
                task.undo(&mut TaskContext::new(&mut context))
            });

            self.emit(RunEvent::RollbackFinished { outcome: &outcome });
            run.transition(if outcome.succeeded() {
                RunState::RolledBack
            } else {
                RunState::RollbackFailed
            });
            run.rollback_outcome = outcome;
        }

        self.finish(run, context, started_at, start)
    }

    fn finish(
        &mut self,
        mut run: RunTracker,
        context: ExecutionContext,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
    ) -> ExecutionReport {
        if run.state == RunState::Running {
            run.transition(RunState::Succeeded);
        }

        let ids_with = |status: TaskStatus| -> Vec<String> {
            run.records
                .iter()
                .filter(|r| r.status == status)
                .map(|r| r.id.clone())
                .collect()
        };
        let executed = ids_with(TaskStatus::Executed);
        let skipped = ids_with(TaskStatus::Skipped);
        let failed = ids_with(TaskStatus::Failed);

        let report = ExecutionReport {
            execution_id: context.execution_id(),
            command: context.command().map(str::to_string),
            success: run.state == RunState::Succeeded,
            state: run.state,
            executed,
            skipped,
            failed,
            tasks: run.records,
            error: run.error.as_ref().map(ShipwrightError::summary),
            rollback: run.rollback_outcome,
            started_at,
            finished_at: Utc::now(),
            duration: start.elapsed(),
            data: context.snapshot(),
        };

        self.emit(RunEvent::RunFinished { report: &report });
        report
    }
}

/// Mutable bookkeeping of a run in progress.
struct RunTracker {
    state: RunState,
    records: Vec<TaskRecord>,
    error: Option<ShipwrightError>,
    rollback: RollbackManager,
    rollback_outcome: RollbackOutcome,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: RunState::Pending,
            records: Vec::new(),
            error: None,
            rollback: RollbackManager::new(),
            rollback_outcome: RollbackOutcome::not_run(),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {} -> {}",
            self.state,
            next
        );
        debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
    }

    fn record(&mut self, record: TaskRecord) {
        self.records.push(record);
    }

    fn fail(&mut self, error: ShipwrightError) {
        self.error = Some(error);
        self.transition(RunState::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleaseConfig;
    use crate::error::ErrorCode;
    use crate::runner::events::MemorySink;
    use crate::task::FnTask;
    use std::sync::Mutex;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ReleaseConfig::default()).with_command("test")
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn undoable(id: &str, log: &Log) -> FnTask {
        let exec_log = Arc::clone(log);
        let undo_log = Arc::clone(log);
        let exec_id = id.to_string();
        let undo_id = id.to_string();
        FnTask::new(id, move |_| {
            exec_log.lock().unwrap().push(format!("run {}", exec_id));
            Ok(())
        })
        .with_undo(move |_| {
            undo_log.lock().unwrap().push(format!("undo {}", undo_id));
            Ok(())
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn runs_all_tasks_in_order() {
        let log = Log::default();
        let tasks = vec![
            undoable("b", &log).depends_on(["a"]).into_ref(),
            undoable("a", &log).into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert!(report.success);
        assert_eq!(report.state, RunState::Succeeded);
        assert_eq!(report.executed, vec!["a", "b"]);
        assert_eq!(entries(&log), vec!["run a", "run b"]);
        assert!(!report.rollback_ran());
        assert_eq!(report.command.as_deref(), Some("test"));
    }

    #[test]
    fn resolution_failure_runs_nothing() {
        let log = Log::default();
        let tasks = vec![undoable("a", &log).depends_on(["ghost"]).into_ref()];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert!(!report.success);
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.error.as_ref().unwrap().code, ErrorCode::NotFound);
        assert!(report.tasks.is_empty());
        assert!(entries(&log).is_empty());
        assert!(report.is_clean_failure());
    }

    #[test]
    fn failing_task_rolls_back_itself_and_earlier_tasks() {
        let log = Log::default();
        let fail_log = Arc::clone(&log);
        let tasks = vec![
            undoable("a", &log).into_ref(),
            FnTask::new("b", move |_| {
                fail_log.lock().unwrap().push("run b".to_string());
                Err(ShipwrightError::failed("half done"))
            })
            .with_undo({
                let log = Arc::clone(&log);
                move |_| {
                    log.lock().unwrap().push("undo b".to_string());
                    Ok(())
                }
            })
            .depends_on(["a"])
            .into_ref(),
            undoable("c", &log).depends_on(["b"]).into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert_eq!(entries(&log), vec!["run a", "run b", "undo b", "undo a"]);
        assert_eq!(report.state, RunState::RolledBack);
        assert_eq!(report.failed, vec!["b"]);
        assert_eq!(report.rollback.undone, vec!["b", "a"]);
        assert!(report.is_clean_failure());
        assert!(report.status_of("c").is_none());
    }

    #[test]
    fn failure_without_undoable_tasks_skips_rollback() {
        let tasks = vec![FnTask::new("a", |_| Err(ShipwrightError::io("disk"))).into_ref()];
        let report = Orchestrator::silent().run(&tasks, ctx());
        assert_eq!(report.state, RunState::Failed);
        assert!(!report.rollback_ran());
        assert!(report.is_clean_failure());
    }

    #[test]
    fn can_undo_false_is_not_registered() {
        let log = Log::default();
        let tasks = vec![
            undoable("a", &log).can_undo_when(|_| false).into_ref(),
            FnTask::new("b", |_| Err(ShipwrightError::failed("x")))
                .depends_on(["a"])
                .into_ref(),
        ];
        let report = Orchestrator::silent().run(&tasks, ctx());
        assert_eq!(entries(&log), vec!["run a"]);
        assert!(!report.rollback_ran());
    }

    #[test]
    fn predicate_error_fails_and_rolls_back() {
        let log = Log::default();
        let tasks = vec![
            undoable("a", &log).into_ref(),
            undoable("b", &log)
                .depends_on(["a"])
                .skip_when(|ctx| ctx.get("missing").map(|_| SkipDecision::Run))
                .into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert_eq!(entries(&log), vec!["run a", "undo a"]);
        assert_eq!(report.failed, vec!["b"]);
        assert_eq!(report.error.as_ref().unwrap().code, ErrorCode::NotFound);
        assert_eq!(report.state, RunState::RolledBack);
    }

    #[test]
    fn skip_to_bypasses_intermediate_tasks() {
        let log = Log::default();
        let tasks = vec![
            undoable("a", &log)
                .then_flow(|_| Ok(Flow::SkipTo("d".to_string())))
                .into_ref(),
            undoable("b", &log).depends_on(["a"]).into_ref(),
            undoable("c", &log).depends_on(["b"]).into_ref(),
            undoable("d", &log).depends_on(["a"]).into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert!(report.success);
        assert_eq!(entries(&log), vec!["run a", "run d"]);
        assert_eq!(report.executed, vec!["a", "d"]);
        assert_eq!(report.skipped, vec!["b", "c"]);
        assert_eq!(
            report.record("b").unwrap().reason.as_deref(),
            Some("skipped through by 'a'")
        );
    }

    #[test]
    fn skip_to_unknown_target_fails_task() {
        let log = Log::default();
        let tasks = vec![undoable("a", &log)
            .then_flow(|_| Ok(Flow::SkipTo("nowhere".to_string())))
            .into_ref()];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert_eq!(report.failed, vec!["a"]);
        assert_eq!(report.error.as_ref().unwrap().code, ErrorCode::Invalid);
        assert_eq!(entries(&log), vec!["run a", "undo a"]);
    }

    #[test]
    fn abort_rolls_back_everything_registered() {
        let log = Log::default();
        let tasks = vec![
            undoable("a", &log).into_ref(),
            undoable("b", &log).depends_on(["a"]).into_ref(),
            undoable("c", &log)
                .depends_on(["b"])
                .then_flow(|_| Ok(Flow::Abort("changed my mind".to_string())))
                .into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert_eq!(
            entries(&log),
            vec!["run a", "run b", "run c", "undo c", "undo b", "undo a"]
        );
        assert_eq!(report.state, RunState::RolledBack);
        assert_eq!(report.error.as_ref().unwrap().code, ErrorCode::Failed);
        assert!(report.error.as_ref().unwrap().message.contains("changed my mind"));
    }

    #[test]
    fn cancellation_between_tasks() {
        let log = Log::default();
        let token = CancelToken::new();
        let trigger = token.clone();
        let tasks = vec![
            undoable("a", &log).into_ref(),
            FnTask::new("b", move |_| {
                trigger.cancel();
                Ok(())
            })
            .depends_on(["a"])
            .into_ref(),
            undoable("c", &log).depends_on(["b"]).into_ref(),
        ];

        let report = Orchestrator::silent()
            .with_cancel_token(token)
            .run(&tasks, ctx());

        assert_eq!(entries(&log), vec!["run a", "undo a"]);
        assert_eq!(report.executed, vec!["a", "b"]);
        assert!(report.error.as_ref().unwrap().message.contains("cancelled"));
        assert_eq!(report.state, RunState::RolledBack);
    }

    #[test]
    fn undo_failure_is_dirty() {
        let log = Log::default();
        let tasks = vec![
            undoable("a", &log).into_ref(),
            FnTask::new("b", |_| Ok(()))
                .with_undo(|_| Err(ShipwrightError::io("cannot restore")))
                .depends_on(["a"])
                .into_ref(),
            FnTask::new("c", |_| Err(ShipwrightError::failed("boom")))
                .depends_on(["b"])
                .into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert_eq!(entries(&log), vec!["run a"]);
        assert_eq!(report.state, RunState::RollbackFailed);
        assert!(report.requires_intervention());
        assert_eq!(report.rollback.failed.as_ref().unwrap().task, "b");
        assert_eq!(report.rollback.pending, vec!["a"]);
        assert_eq!(report.error.as_ref().unwrap().message, "boom");
    }

    #[test]
    fn panicking_task_fails_and_rolls_back() {
        let log = Log::default();
        let tasks = vec![
            undoable("a", &log).into_ref(),
            FnTask::new("b", |_| panic!("bad input"))
                .depends_on(["a"])
                .into_ref(),
            undoable("c", &log).depends_on(["b"]).into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert_eq!(entries(&log), vec!["run a", "undo a"]);
        assert_eq!(report.state, RunState::RolledBack);
        assert_eq!(report.failed, vec!["b"]);
        let error = report.error.as_ref().unwrap();
        assert_eq!(error.code, ErrorCode::Unexpected);
        assert!(error.message.contains("bad input"));
        assert!(report.status_of("c").is_none());
    }

    #[test]
    fn panicking_predicate_and_flow_fail_the_task() {
        let log = Log::default();
        let tasks = vec![
            undoable("a", &log).into_ref(),
            undoable("b", &log)
                .depends_on(["a"])
                .skip_when(|_| panic!("no answer"))
                .into_ref(),
        ];
        let report = Orchestrator::silent().run(&tasks, ctx());
        assert_eq!(entries(&log), vec!["run a", "undo a"]);
        assert_eq!(report.failed, vec!["b"]);
        assert!(report.error.as_ref().unwrap().message.contains("no answer"));

        let log = Log::default();
        let tasks = vec![undoable("a", &log)
            .then_flow(|_| panic!("lost"))
            .into_ref()];
        let report = Orchestrator::silent().run(&tasks, ctx());
        assert_eq!(entries(&log), vec!["run a", "undo a"]);
        assert_eq!(report.error.as_ref().unwrap().code, ErrorCode::Unexpected);
        assert_eq!(report.state, RunState::RolledBack);
    }

    #[test]
    fn failure_after_irreversible_task_is_dirty() {
        let log = Log::default();
        let tasks = vec![
            undoable("commit", &log).into_ref(),
            FnTask::new("push", |_| Ok(()))
                .irreversible()
                .depends_on(["commit"])
                .into_ref(),
            undoable("publish", &log).depends_on(["push"]).into_ref(),
            FnTask::new("announce", |_| Err(ShipwrightError::io("offline")))
                .depends_on(["publish"])
                .into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert_eq!(
            entries(&log),
            vec!["run commit", "run publish", "undo publish"]
        );
        assert_eq!(report.state, RunState::RollbackFailed);
        assert!(!report.is_clean_failure());
        assert!(report.requires_intervention());
        assert_eq!(report.rollback.undone, vec!["publish"]);
        assert_eq!(report.rollback.blocked_by.as_deref(), Some("push"));
        assert_eq!(report.rollback.pending, vec!["commit"]);
    }

    #[test]
    fn irreversible_task_that_failed_is_no_barrier() {
        let log = Log::default();
        let tasks = vec![
            undoable("commit", &log).into_ref(),
            FnTask::new("push", |_| Err(ShipwrightError::io("rejected")))
                .irreversible()
                .depends_on(["commit"])
                .into_ref(),
        ];

        let report = Orchestrator::silent().run(&tasks, ctx());

        assert_eq!(entries(&log), vec!["run commit", "undo commit"]);
        assert_eq!(report.state, RunState::RolledBack);
        assert!(report.is_clean_failure());
    }

    #[test]
    fn config_is_sealed_during_run() {
        let tasks = vec![FnTask::new("a", |ctx| {
            let sealed = ctx.is_sealed();
            ctx.set("sealed", sealed)
        })
        .into_ref()];
        let report = Orchestrator::silent().run(&tasks, ctx());
        assert_eq!(report.data.get("sealed"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn data_flows_forward() {
        let tasks = vec![
            FnTask::new("write", |ctx| ctx.set("version.next", "1.2.0")).into_ref(),
            FnTask::new("read", |ctx| {
                let next: String = ctx.get_as("version.next")?;
                ctx.set("tag", format!("v{}", next))
            })
            .depends_on(["write"])
            .into_ref(),
        ];
        let report = Orchestrator::silent().run(&tasks, ctx());
        assert!(report.success);
        assert_eq!(report.data.get("tag"), Some(&serde_json::json!("v1.2.0")));
    }

    #[test]
    fn events_reach_sinks() {
        let sink = MemorySink::new();
        let tasks = vec![
            FnTask::new("a", |_| Ok(())).describe("First").into_ref(),
            FnTask::new("b", |_| Ok(()))
                .skip_when(|_| Ok(SkipDecision::skip("not needed")))
                .into_ref(),
        ];

        Orchestrator::silent()
            .with_sink(sink.clone())
            .run(&tasks, ctx());

        let lines = sink.lines();
        assert!(lines[0].starts_with("Run run_"));
        assert_eq!(lines[1], "[1/2] a - First");
        assert!(lines[2].starts_with("a done in"));
        assert_eq!(lines[3], "b skipped: not needed");
        assert!(lines[4].contains("succeeded"));
    }
}
