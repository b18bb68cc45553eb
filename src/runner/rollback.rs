//! Compensation of executed tasks.
//!
//! The orchestrator registers every undoable task before executing it. When
//! a run fails, [`RollbackManager::execute_rollback`] walks the stack from the
//! most recent registration back to the first and stops at the first undo
//! that fails: once a compensation breaks, the state of everything below it
//! is unknown and is left alone for an operator.
//!
//! A completed irreversible task (a push) is recorded as a barrier. Rollback
//! never crosses it, since undoing local work below it would leave the local
//! repository behind what the remote already has.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ErrorSummary, Result, ShipwrightError};
use crate::task::{Task, TaskRef};

#[derive(Debug)]
enum Entry {
    Undo(TaskRef),
    Barrier(String),
}

impl Entry {
    fn id(&self) -> &str {
        match self {
            Entry::Undo(task) => task.id(),
            Entry::Barrier(id) => id,
        }
    }
}

/// LIFO stack of tasks eligible for compensation.
#[derive(Debug, Default)]
pub struct RollbackManager {
    stack: Vec<Entry>,
}

impl RollbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a task onto the stack.
    pub fn add_task(&mut self, task: TaskRef) {
        debug!("Registered '{}' for rollback", task.id());
        self.stack.push(Entry::Undo(task));
    }

    /// Mark that `id` completed with effects no undo can take back.
    pub fn add_barrier(&mut self, id: impl Into<String>) {
        let id = id.into();
        debug!("'{}' is irreversible; rollback stops there", id);
        self.stack.push(Entry::Barrier(id));
    }

    pub fn has_tasks(&self) -> bool {
        self.stack.iter().any(|e| matches!(e, Entry::Undo(_)))
    }

    pub fn has_barrier(&self) -> bool {
        self.stack.iter().any(|e| matches!(e, Entry::Barrier(_)))
    }

    /// Whether a failure now has anything to compensate or report.
    pub fn needs_rollback(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Number of registered undoable tasks.
    pub fn len(&self) -> usize {
        self.task_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Registered task ids, oldest first.
    pub fn task_ids(&self) -> Vec<&str> {
        self.stack
            .iter()
            .filter_map(|e| match e {
                Entry::Undo(task) => Some(task.id()),
                Entry::Barrier(_) => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Undo registered tasks, most recent first.
    ///
    /// `undo` is called once per task. Errors and panics it raises are
    /// captured into the outcome instead of escaping. The stack is empty
    /// afterwards whatever the outcome.
    pub fn execute_rollback<F>(&mut self, mut undo: F) -> RollbackOutcome
    where
        F: FnMut(&dyn Task) -> Result<()>,
    {
        let mut outcome = RollbackOutcome {
            ran: true,
            ..RollbackOutcome::default()
        };

        while let Some(entry) = self.stack.pop() {
            let task = match entry {
                Entry::Undo(task) => task,
                Entry::Barrier(id) => {
                    warn!("Rollback stopped at '{}': its effects cannot be undone", id);
                    outcome.blocked_by = Some(id);
                    outcome.pending = self.drain_pending();
                    break;
                }
            };

            let id = task.id().to_string();
            debug!("Undoing '{}'", id);

            let result = catch_panic(&format!("undo of '{}'", id), "rollback", || {
                undo(task.as_ref())
            });

            match result {
                Ok(()) => outcome.undone.push(id),
                Err(err) => {
                    warn!("Undo of '{}' failed: {}", id, err);
                    outcome.failed = Some(RollbackFailure {
                        task: id,
                        error: err.summary(),
                    });
                    outcome.pending = self.drain_pending();
                    break;
                }
            }
        }

        outcome
    }

    /// Remaining undoable ids, in the order they would have been undone.
    fn drain_pending(&mut self) -> Vec<String> {
        self.stack
            .drain(..)
            .rev()
            .filter(|e| matches!(e, Entry::Undo(_)))
            .map(|e| e.id().to_string())
            .collect()
    }
}

/// Run `f`, turning a panic into an `UNEXPECTED` error about `what`.
pub(crate) fn catch_panic<T>(
    what: &str,
    component: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(panic_error(what, payload).in_component(component)))
}

fn panic_error(what: &str, payload: Box<dyn Any + Send>) -> ShipwrightError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ShipwrightError::unexpected(format!("{} panicked: {}", what, detail))
}

/// The undo that stopped a rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackFailure {
    pub task: String,
    pub error: ErrorSummary,
}

/// Result of one rollback pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    /// Whether a rollback was attempted at all.
    pub ran: bool,
    /// Tasks compensated, in the order their undo ran.
    pub undone: Vec<String>,
    /// The undo that failed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<RollbackFailure>,
    /// Irreversible task the rollback could not cross.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    /// Tasks left un-compensated because the rollback stopped above them, in
    /// the order they would have been undone.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<String>,
}

impl RollbackOutcome {
    /// An outcome for runs that never needed compensation.
    pub fn not_run() -> Self {
        Self::default()
    }

    /// Every effect of the run was compensated.
    pub fn succeeded(&self) -> bool {
        self.failed.is_none() && self.blocked_by.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::task::FnTask;

    fn task(id: &str) -> TaskRef {
        FnTask::new(id, |_| Ok(())).with_undo(|_| Ok(())).into_ref()
    }

    fn manager(ids: &[&str]) -> RollbackManager {
        let mut manager = RollbackManager::new();
        for id in ids {
            manager.add_task(task(id));
        }
        manager
    }

    #[test]
    fn tracks_registrations() {
        let manager = manager(&["a", "b"]);
        assert!(manager.has_tasks());
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.task_ids(), vec!["a", "b"]);
    }

    #[test]
    fn undoes_in_reverse_order() {
        let mut manager = manager(&["a", "b", "c"]);
        let mut calls = Vec::new();

        let outcome = manager.execute_rollback(|t| {
            calls.push(t.id().to_string());
            Ok(())
        });

        assert_eq!(calls, vec!["c", "b", "a"]);
        assert_eq!(outcome.undone, vec!["c", "b", "a"]);
        assert!(outcome.ran);
        assert!(outcome.succeeded());
        assert!(!manager.has_tasks());
    }

    #[test]
    fn stops_at_first_failure() {
        let mut manager = manager(&["a", "b", "c", "d"]);
        let mut calls = Vec::new();

        let outcome = manager.execute_rollback(|t| {
            calls.push(t.id().to_string());
            if t.id() == "c" {
                Err(ShipwrightError::failed("cannot restore"))
            } else {
                Ok(())
            }
        });

        assert_eq!(calls, vec!["d", "c"]);
        assert_eq!(outcome.undone, vec!["d"]);
        let failure = outcome.failed.as_ref().unwrap();
        assert_eq!(failure.task, "c");
        assert_eq!(failure.error.code, ErrorCode::Failed);
        assert_eq!(outcome.pending, vec!["b", "a"]);
        assert!(!outcome.succeeded());
        assert!(manager.is_empty());
    }

    #[test]
    fn panic_in_undo_is_captured() {
        let mut manager = manager(&["a", "b"]);
        let mut calls = Vec::new();

        let outcome = manager.execute_rollback(|t| {
            calls.push(t.id().to_string());
            if t.id() == "b" {
                panic!("disk vanished");
            }
            Ok(())
        });

        assert_eq!(calls, vec!["b"]);
        let failure = outcome.failed.unwrap();
        assert_eq!(failure.task, "b");
        assert_eq!(failure.error.code, ErrorCode::Unexpected);
        assert!(failure.error.message.contains("disk vanished"));
        assert_eq!(outcome.pending, vec!["a"]);
    }

    #[test]
    fn empty_stack_succeeds() {
        let outcome = RollbackManager::new().execute_rollback(|_| {
            panic!("should not be called");
        });
        assert!(outcome.ran);
        assert!(outcome.succeeded());
        assert!(outcome.undone.is_empty());
    }

    #[test]
    fn clear_drops_registrations() {
        let mut manager = manager(&["a"]);
        manager.clear();
        assert!(!manager.has_tasks());
    }

    #[test]
    fn barrier_stops_rollback_below_it() {
        let mut manager = manager(&["bump", "commit"]);
        manager.add_barrier("push");
        manager.add_task(task("publish"));
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.task_ids(), vec!["bump", "commit", "publish"]);

        let mut calls = Vec::new();
        let outcome = manager.execute_rollback(|t| {
            calls.push(t.id().to_string());
            Ok(())
        });

        assert_eq!(calls, vec!["publish"]);
        assert_eq!(outcome.undone, vec!["publish"]);
        assert_eq!(outcome.blocked_by.as_deref(), Some("push"));
        assert_eq!(outcome.pending, vec!["commit", "bump"]);
        assert!(outcome.failed.is_none());
        assert!(!outcome.succeeded());
        assert!(manager.is_empty());
    }

    #[test]
    fn barrier_alone_still_needs_rollback() {
        let mut manager = RollbackManager::new();
        manager.add_barrier("push");
        assert!(!manager.has_tasks());
        assert!(manager.has_barrier());
        assert!(manager.needs_rollback());
    }

    #[test]
    fn not_run_outcome() {
        let outcome = RollbackOutcome::not_run();
        assert!(!outcome.ran);
        assert!(outcome.succeeded());
    }
}
