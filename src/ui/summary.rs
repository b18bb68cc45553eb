//! End-of-run summary.

use std::time::Duration;

use crate::runner::{ExecutionReport, TaskStatus};

use super::UserInterface;

/// Format a duration for human display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// One line per task reached by the run.
pub fn task_lines(report: &ExecutionReport) -> Vec<String> {
    let width = report.tasks.iter().map(|t| t.id.len()).max().unwrap_or(0);
    report
        .tasks
        .iter()
        .map(|task| {
            let detail = match task.status {
                TaskStatus::Executed => match &task.reason {
                    Some(reason) => format!("{} ({})", format_duration(task.duration), reason),
                    None => format_duration(task.duration),
                },
                TaskStatus::Skipped => task.reason.clone().unwrap_or_default(),
                TaskStatus::Failed => task
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
            };
            format!(
                "  {} {:<width$}  {}",
                task.status.display_char(),
                task.id,
                detail,
                width = width
            )
        })
        .collect()
}

/// Show the report's outcome.
pub fn show_report(ui: &mut dyn UserInterface, report: &ExecutionReport) {
    let command = report.command.as_deref().unwrap_or("run");

    if !report.tasks.is_empty() {
        ui.message("");
        for line in task_lines(report) {
            ui.message(&line);
        }
        ui.message("");
    }

    if report.success {
        ui.success(&format!(
            "{} finished in {}",
            command,
            format_duration(report.duration)
        ));
        return;
    }

    match &report.error {
        Some(error) => ui.error(&format!("{} failed: {}", command, error)),
        None => ui.error(&format!("{} failed", command)),
    }

    let rollback = &report.rollback;
    if !rollback.ran {
        return;
    }
    if !rollback.undone.is_empty() {
        ui.warning(&format!("Rolled back: {}", rollback.undone.join(", ")));
    }
    if let Some(failure) = &rollback.failed {
        ui.error(&format!("Undo of {} failed: {}", failure.task, failure.error));
    } else if let Some(barrier) = &rollback.blocked_by {
        ui.error(&format!(
            "Stopped at {}: its effects are already outside the project",
            barrier
        ));
    }
    if !rollback.succeeded() {
        if !rollback.pending.is_empty() {
            ui.error(&format!("Not undone: {}", rollback.pending.join(", ")));
        }
        ui.error(&format!(
            "Manual intervention required (run {})",
            report.execution_id
        ));
    }
}
