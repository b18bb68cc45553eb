//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::error::{ErrorCode, Result, ShipwrightError};
use crate::runner::{CancelToken, ExecutionReport};
use crate::ui::UserInterface;

/// The command did what was asked.
pub const EXIT_SUCCESS: i32 = 0;
/// The run failed and everything it changed was put back.
pub const EXIT_FAILURE: i32 = 1;
/// Bad configuration or usage; nothing ran.
pub const EXIT_USAGE: i32 = 2;
/// A rollback failed; the repository or host needs manual repair.
pub const EXIT_DIRTY: i32 = 3;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: EXIT_SUCCESS,
        }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    /// Map a finished run to its exit code.
    pub fn from_report(report: &ExecutionReport) -> Self {
        if report.success {
            Self::success()
        } else if report.requires_intervention() {
            Self::failure(EXIT_DIRTY)
        } else {
            Self::failure(EXIT_FAILURE)
        }
    }

    /// Exit code for an error that stopped a command before any task ran.
    pub fn exit_code_for(err: &ShipwrightError) -> i32 {
        match err.code() {
            ErrorCode::Validation | ErrorCode::Invalid | ErrorCode::NotFound => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
    config_path: Option<PathBuf>,
    colors: bool,
    cancel: CancelToken,
}

impl CommandDispatcher {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            config_path: None,
            colors: false,
            cancel: CancelToken::new(),
        }
    }

    /// Use this config file instead of discovering one.
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// Token that interrupts a running `run` between tasks.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        match &cli.command {
            Commands::Run(args) => {
                let cmd = super::run::RunCommand::new(&self.project_root, args.clone())
                    .with_config_path(self.config_path.clone())
                    .with_colors(self.colors)
                    .with_cancel_token(self.cancel.clone());
                cmd.execute(ui)
            }
            Commands::List => {
                let cmd = super::list::ListCommand::new(&self.project_root);
                cmd.execute(ui)
            }
            Commands::Config(args) => {
                let cmd = super::config::ConfigCommand::new(&self.project_root, args.clone())
                    .with_config_path(self.config_path.clone());
                cmd.execute(ui)
            }
            Commands::Completions(args) => {
                let cmd = super::completions::CompletionsCommand::new(args.clone());
                cmd.execute(ui)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(EXIT_DIRTY);
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
    }

    #[test]
    fn configuration_errors_are_usage_errors() {
        let err = ShipwrightError::validation("no manifests");
        assert_eq!(CommandResult::exit_code_for(&err), EXIT_USAGE);
        let err = ShipwrightError::not_found("Unknown command 'deploy'");
        assert_eq!(CommandResult::exit_code_for(&err), EXIT_USAGE);
        let err = ShipwrightError::io("permission denied");
        assert_eq!(CommandResult::exit_code_for(&err), EXIT_FAILURE);
    }

    #[test]
    fn dispatcher_creation() {
        let dispatcher = CommandDispatcher::new(PathBuf::from("/test"));
        assert_eq!(dispatcher.project_root(), Path::new("/test"));
    }
}
