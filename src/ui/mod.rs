//! Terminal output.
//!
//! - [`UserInterface`] trait for the CLI's status lines
//! - [`TerminalUI`] for real terminals, [`MockUI`] for tests
//! - [`ConsoleSink`] for live run progress
//! - [`show_report`] for the end-of-run summary
//!
//! # Example
//!
//! ```
//! use shipwright::ui::{create_ui, OutputMode};
//!
//! let mut ui = create_ui(OutputMode::Quiet, false);
//! ui.show_header("shipwright");
//! ui.success("Released 1.2.0");
//! ```

pub mod mock;
pub mod output;
pub mod sink;
pub mod summary;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use sink::ConsoleSink;
pub use summary::{format_duration, show_report, task_lines};
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, ShipwrightTheme};

/// Trait for user-facing output.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    fn output_mode(&self) -> OutputMode;

    fn theme(&self) -> &ShipwrightTheme;

    /// Display a status message (hidden in quiet mode).
    fn message(&mut self, msg: &str);

    fn success(&mut self, msg: &str);

    fn warning(&mut self, msg: &str);

    fn error(&mut self, msg: &str);

    fn show_header(&mut self, title: &str);

    /// Print machine-readable output, whatever the mode.
    fn print(&mut self, text: &str);
}
