//! Run states and the execution report.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::context::{ContextSnapshot, ExecutionId};
use crate::error::ErrorSummary;

use super::rollback::RollbackOutcome;

/// Lifecycle of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
    RollingBack,
    RolledBack,
    RollbackFailed,
}

impl RunState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Failed, RollingBack)
                | (RollingBack, RolledBack)
                | (RollingBack, RollbackFailed)
        )
    }

    /// States a finished run can end in.
    ///
    /// `Failed` is included: a run with something to compensate moves on to
    /// `RollingBack` before [`Orchestrator::run`](super::Orchestrator::run)
    /// returns, so a report that still says `Failed` had nothing to undo.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::RolledBack | RunState::RollbackFailed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
            RunState::RollingBack => "rolling back",
            RunState::RolledBack => "rolled back",
            RunState::RollbackFailed => "rollback failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single task in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Executed,
    Skipped,
    Failed,
}

impl TaskStatus {
    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            TaskStatus::Executed => '✓',
            TaskStatus::Skipped => '⊘',
            TaskStatus::Failed => '✗',
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Executed => "executed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub status: TaskStatus,
    /// Skip reason, or a note about the task's flow instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
}

impl TaskRecord {
    pub fn executed(id: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Executed,
            reason: None,
            duration,
            error: None,
        }
    }

    pub fn skipped(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Skipped,
            reason: Some(reason.into()),
            duration: Duration::ZERO,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, duration: Duration, error: ErrorSummary) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Failed,
            reason: None,
            duration,
            error: Some(error),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Final account of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub execution_id: ExecutionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub success: bool,
    pub state: RunState,
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    /// Per-task records in the order tasks were reached.
    pub tasks: Vec<TaskRecord>,
    /// The error that ended the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
    pub rollback: RollbackOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// Execution data as it stood when the run ended.
    pub data: ContextSnapshot,
}

impl ExecutionReport {
    /// The run failed and every effect was compensated (or nothing needed
    /// compensation).
    pub fn is_clean_failure(&self) -> bool {
        !self.success && self.state != RunState::RollbackFailed
    }

    /// A compensation failed, or rollback stopped at an irreversible task;
    /// the external state needs an operator.
    pub fn requires_intervention(&self) -> bool {
        self.state == RunState::RollbackFailed
    }

    pub fn rollback_ran(&self) -> bool {
        self.rollback.ran
    }

    pub fn rollback_succeeded(&self) -> bool {
        self.rollback.ran && self.rollback.succeeded()
    }

    pub fn record(&self, id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|r| r.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.record(id).map(|r| r.status)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
