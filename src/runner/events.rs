//! Structured run events and the sinks that receive them.
//!
//! Every event has a [`Severity`] and renders as one human-readable line via
//! `Display`; sinks decide where the line goes.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::ExecutionId;
use crate::error::ShipwrightError;

use super::report::ExecutionReport;
use super::rollback::RollbackOutcome;

/// How loudly an event should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Progress events emitted during a run.
#[derive(Debug)]
pub enum RunEvent<'a> {
    RunStarted {
        execution_id: ExecutionId,
        command: Option<&'a str>,
        total: usize,
    },
    /// A task is about to execute.
    TaskStarted {
        id: &'a str,
        description: &'a str,
        index: usize,
        total: usize,
    },
    TaskSkipped {
        id: &'a str,
        reason: &'a str,
    },
    TaskSucceeded {
        id: &'a str,
        duration: Duration,
    },
    TaskFailed {
        id: &'a str,
        error: &'a ShipwrightError,
    },
    /// A task's flow instruction bypassed scheduled tasks.
    SkippedThrough {
        from: &'a str,
        to: &'a str,
        bypassed: &'a [String],
    },
    /// A task asked to stop the run.
    Aborted {
        id: &'a str,
        reason: &'a str,
    },
    Cancelled {
        before: &'a str,
    },
    RollbackStarted {
        tasks: usize,
    },
    UndoStarted {
        id: &'a str,
    },
    RollbackFinished {
        outcome: &'a RollbackOutcome,
    },
    RunFinished {
        report: &'a ExecutionReport,
    },
}

impl RunEvent<'_> {
    pub fn severity(&self) -> Severity {
        match self {
            RunEvent::RunStarted { .. } | RunEvent::TaskStarted { .. } => Severity::Info,
            RunEvent::TaskSucceeded { .. } | RunEvent::UndoStarted { .. } => Severity::Info,
            RunEvent::TaskSkipped { .. } => Severity::Info,
            RunEvent::SkippedThrough { .. } | RunEvent::RollbackStarted { .. } => Severity::Warn,
            RunEvent::Aborted { .. } | RunEvent::Cancelled { .. } => Severity::Warn,
            RunEvent::TaskFailed { .. } => Severity::Error,
            RunEvent::RollbackFinished { outcome } => {
                if outcome.succeeded() {
                    Severity::Warn
                } else {
                    Severity::Error
                }
            }
            RunEvent::RunFinished { report } => {
                if report.success {
                    Severity::Info
                } else if report.requires_intervention() {
                    Severity::Error
                } else {
                    Severity::Warn
                }
            }
        }
    }
}

impl fmt::Display for RunEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::RunStarted {
                execution_id,
                command,
                total,
            } => write!(
                f,
                "Run {} started: {} ({} task{})",
                execution_id,
                command.unwrap_or("ad-hoc"),
                total,
                plural(*total)
            ),
            RunEvent::TaskStarted {
                id,
                description,
                index,
                total,
            } => write!(f, "[{}/{}] {} - {}", index + 1, total, id, description),
            RunEvent::TaskSkipped { id, reason } => write!(f, "{} skipped: {}", id, reason),
            RunEvent::TaskSucceeded { id, duration } => {
                write!(f, "{} done in {}ms", id, duration.as_millis())
            }
            RunEvent::TaskFailed { id, error } => write!(f, "{} failed: {}", id, error),
            RunEvent::SkippedThrough { from, to, bypassed } => write!(
                f,
                "{} skips to {}, bypassing {}",
                from,
                to,
                if bypassed.is_empty() {
                    "nothing".to_string()
                } else {
                    bypassed.join(", ")
                }
            ),
            RunEvent::Aborted { id, reason } => write!(f, "{} aborted the run: {}", id, reason),
            RunEvent::Cancelled { before } => write!(f, "Run cancelled before {}", before),
            RunEvent::RollbackStarted { tasks } => {
                write!(f, "Rolling back {} task{}", tasks, plural(*tasks))
            }
            RunEvent::UndoStarted { id } => write!(f, "Undoing {}", id),
            RunEvent::RollbackFinished { outcome } => {
                let pending = if outcome.pending.is_empty() {
                    "none".to_string()
                } else {
                    outcome.pending.join(", ")
                };
                match (&outcome.failed, &outcome.blocked_by) {
                    (Some(failure), _) => write!(
                        f,
                        "Rollback failed at {}: {}; not undone: {}",
                        failure.task, failure.error, pending
                    ),
                    (None, Some(barrier)) => write!(
                        f,
                        "Rollback stopped at {}, which cannot be undone; not undone: {}",
                        barrier, pending
                    ),
                    (None, None) => {
                        write!(f, "Rollback complete ({} undone)", outcome.undone.len())
                    }
                }
            }
            RunEvent::RunFinished { report } => write!(
                f,
                "Run {} {} in {}ms",
                report.execution_id,
                report.state,
                report.duration.as_millis()
            ),
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Receiver of run events.
pub trait EventSink: Send {
    fn emit(&mut self, event: &RunEvent<'_>);
}

/// Captures event lines in memory for later assertion.
///
/// Clones share the same buffer, so a test can keep one handle and give the
/// other to the orchestrator.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured lines in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, line)| line).collect()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: &RunEvent<'_>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((event.severity(), event.to_string()));
        }
    }
}

/// Forwards events to `tracing` at their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink {
    demoted: bool,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every event at debug level, for runs that already show events
    /// on the console.
    pub fn demoted() -> Self {
        Self { demoted: true }
    }

    /// Level an event is logged at.
    pub fn level_for(&self, event: &RunEvent<'_>) -> Severity {
        if self.demoted {
            Severity::Debug
        } else {
            event.severity()
        }
    }
}

impl EventSink for TracingSink {
    fn emit(&mut self, event: &RunEvent<'_>) {
        match self.level_for(event) {
            Severity::Debug => tracing::debug!("{}", event),
            Severity::Info => tracing::info!("{}", event),
            Severity::Warn => tracing::warn!("{}", event),
            Severity::Error => tracing::error!("{}", event),
        }
    }
}
