//! Output verbosity.

use std::str::FromStr;

use crate::runner::Severity;

/// Output verbosity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Task progress, skips and the final summary.
    #[default]
    Normal,
    /// Warnings, errors and the final status only.
    Quiet,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("unknown output mode: {}", s)),
        }
    }
}

impl OutputMode {
    pub fn from_quiet(quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    /// Check if this mode shows status messages.
    pub fn shows_status(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Whether a run event of `severity` is printed.
    pub fn shows(&self, severity: Severity) -> bool {
        match self {
            Self::Normal => severity >= Severity::Info,
            Self::Quiet => severity >= Severity::Warn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_mode_from_str() {
        assert_eq!("normal".parse::<OutputMode>(), Ok(OutputMode::Normal));
        assert_eq!("QUIET".parse::<OutputMode>(), Ok(OutputMode::Quiet));
        assert!("verbose".parse::<OutputMode>().is_err());
    }

    #[test]
    fn quiet_hides_progress() {
        assert!(OutputMode::Normal.shows(Severity::Info));
        assert!(!OutputMode::Normal.shows(Severity::Debug));
        assert!(!OutputMode::Quiet.shows(Severity::Info));
        assert!(OutputMode::Quiet.shows(Severity::Warn));
        assert!(!OutputMode::Quiet.shows_status());
    }
}
