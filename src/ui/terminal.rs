//! Terminal implementation of [`UserInterface`].

use super::{OutputMode, ShipwrightTheme, UserInterface};

/// Writes status to stdout and errors to stderr.
pub struct TerminalUI {
    mode: OutputMode,
    theme: ShipwrightTheme,
}

impl TerminalUI {
    pub fn new(mode: OutputMode, colors: bool) -> Self {
        Self {
            mode,
            theme: ShipwrightTheme::for_terminal(colors),
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn theme(&self) -> &ShipwrightTheme {
        &self.theme
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", self.theme.done_line(msg));
        }
    }

    fn warning(&mut self, msg: &str) {
        eprintln!("{}", self.theme.caution_line(msg));
    }

    fn error(&mut self, msg: &str) {
        eprintln!("{}", self.theme.failure_line(msg));
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("{}", self.theme.banner_line(title));
            println!();
        }
    }

    fn print(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Create the terminal UI for the given mode.
pub fn create_ui(mode: OutputMode, colors: bool) -> Box<dyn UserInterface> {
    Box::new(TerminalUI::new(mode, colors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_ui_keeps_mode() {
        let ui = create_ui(OutputMode::Quiet, false);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }
}
