//! Styled run progress on the terminal.

use console::Term;

use crate::runner::{EventSink, RunEvent};

use super::{format_duration, OutputMode, ShipwrightTheme};

/// Prints run events to stderr, styled by severity.
///
/// The end-of-run line is left to the report summary.
pub struct ConsoleSink {
    term: Term,
    theme: ShipwrightTheme,
    mode: OutputMode,
}

impl ConsoleSink {
    pub fn new(mode: OutputMode, colors: bool) -> Self {
        Self {
            term: Term::stderr(),
            theme: ShipwrightTheme::for_terminal(colors),
            mode,
        }
    }

    /// The line printed for `event`, if any.
    pub fn render(&self, event: &RunEvent<'_>) -> Option<String> {
        if !self.mode.shows(event.severity()) {
            return None;
        }
        let line = match event {
            RunEvent::RunFinished { .. } => return None,
            RunEvent::TaskStarted {
                id,
                description,
                index,
                total,
            } => format!(
                "{} {} {}",
                self.theme.muted.apply_to(format!("[{}/{}]", index + 1, total)),
                self.theme.task.apply_to(id),
                self.theme.muted.apply_to(description)
            ),
            RunEvent::TaskSucceeded { id, duration } => format!(
                "  {} {}",
                self.theme.done.apply_to(format!("✓ {}", id)),
                self.theme.muted.apply_to(format_duration(*duration))
            ),
            RunEvent::TaskSkipped { id, reason } => {
                format!("{}", self.theme.muted.apply_to(format!("  ⊘ {} ({})", id, reason)))
            }
            other => self.theme.event_line(other.severity(), &other.to_string()),
        };
        Some(line)
    }
}

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &RunEvent<'_>) {
        if let Some(line) = self.render(event) {
            let _ = self.term.write_line(&line);
        }
    }
}
