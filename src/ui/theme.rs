//! Terminal styles for run output.

use console::Style;

use crate::runner::Severity;

/// Styles keyed by what a piece of output says about the run.
#[derive(Debug, Clone)]
pub struct ShipwrightTheme {
    /// Task ids and command names.
    pub task: Style,
    /// Descriptions, counters and durations.
    pub muted: Style,
    /// Completed work.
    pub done: Style,
    /// Skips and rollback progress.
    pub caution: Style,
    /// Failures.
    pub failure: Style,
    /// Task lifecycle lines.
    pub progress: Style,
    /// The banner glyph in front of headers.
    pub banner: Style,
}

impl Default for ShipwrightTheme {
    fn default() -> Self {
        Self::for_terminal(true)
    }
}

impl ShipwrightTheme {
    /// Colored theme when `colors` is set, unstyled otherwise.
    pub fn for_terminal(colors: bool) -> Self {
        let pick = |style: Style| if colors { style } else { Style::new() };
        Self {
            task: pick(Style::new().bold()),
            muted: pick(Style::new().dim()),
            done: pick(Style::new().green()),
            caution: pick(Style::new().color256(208)),
            failure: pick(Style::new().red().bold()),
            progress: pick(Style::new().cyan()),
            banner: pick(Style::new().cyan().bold()),
        }
    }

    pub fn plain() -> Self {
        Self::for_terminal(false)
    }

    pub fn done_line(&self, msg: &str) -> String {
        self.done.apply_to(format!("✓ {}", msg)).to_string()
    }

    pub fn caution_line(&self, msg: &str) -> String {
        self.caution.apply_to(format!("⚠ {}", msg)).to_string()
    }

    pub fn failure_line(&self, msg: &str) -> String {
        self.failure.apply_to(format!("✗ {}", msg)).to_string()
    }

    pub fn banner_line(&self, title: &str) -> String {
        format!("{} {}", self.banner.apply_to("⚓"), self.task.apply_to(title))
    }

    /// Style an event line by severity.
    pub fn event_line(&self, severity: Severity, line: &str) -> String {
        match severity {
            Severity::Debug => self.muted.apply_to(line).to_string(),
            Severity::Info => self.progress.apply_to(line).to_string(),
            Severity::Warn => self.caution_line(line),
            Severity::Error => self.failure_line(line),
        }
    }
}

/// Colors are on unless `NO_COLOR` is set or stderr is not a terminal.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    console::Term::stderr().is_term()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_theme_prefixes_glyphs() {
        let theme = ShipwrightTheme::plain();
        assert_eq!(theme.done_line("Released"), "✓ Released");
        assert_eq!(theme.caution_line("Rolling back"), "⚠ Rolling back");
        assert_eq!(theme.failure_line("Push failed"), "✗ Push failed");
        assert_eq!(theme.banner_line("shipwright"), "⚓ shipwright");
    }

    #[test]
    fn event_lines_follow_severity() {
        let theme = ShipwrightTheme::plain();
        assert_eq!(theme.event_line(Severity::Info, "[1/3] a"), "[1/3] a");
        assert_eq!(theme.event_line(Severity::Warn, "skip"), "⚠ skip");
        assert_eq!(theme.event_line(Severity::Error, "boom"), "✗ boom");
    }
}
