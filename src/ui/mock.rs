//! Mock UI implementation for testing.
//!
//! `MockUI` implements [`UserInterface`] and captures every line for later
//! assertion.
//!
//! # Example
//!
//! ```
//! use shipwright::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.message("Resolving version");
//! ui.success("Released 1.2.0");
//!
//! assert_eq!(ui.messages(), ["Resolving version"]);
//! assert_eq!(ui.successes(), ["Released 1.2.0"]);
//! ```

use super::{OutputMode, ShipwrightTheme, UserInterface};

#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    theme: ShipwrightTheme,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    printed: Vec<String>,
}

impl MockUI {
    pub fn new() -> Self {
        Self::with_mode(OutputMode::Normal)
    }

    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            theme: ShipwrightTheme::plain(),
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Unfiltered output (JSON, schemas, completions).
    pub fn printed(&self) -> &[String] {
        &self.printed
    }

    /// Everything shown, in one string.
    pub fn all_output(&self) -> String {
        [
            &self.headers,
            &self.messages,
            &self.successes,
            &self.warnings,
            &self.errors,
            &self.printed,
        ]
        .iter()
        .flat_map(|lines| lines.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn theme(&self) -> &ShipwrightTheme {
        &self.theme
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn print(&mut self, text: &str) {
        self.printed.push(text.to_string());
    }
}
