//! Shell completions generation.
//!
//! The `shipwright completions` command generates shell completion scripts.

use clap::CommandFactory;

use crate::cli::args::{Cli, CompletionsArgs};
use crate::error::{Result, ShipwrightError};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The completions command implementation.
pub struct CompletionsCommand {
    args: CompletionsArgs,
}

impl CompletionsCommand {
    pub fn new(args: CompletionsArgs) -> Self {
        Self { args }
    }

    /// The completion script as text.
    pub fn script(&self) -> Result<String> {
        let mut cmd = Cli::command();
        let mut buf = Vec::new();
        clap_complete::generate(self.args.shell, &mut cmd, "shipwright", &mut buf);
        String::from_utf8(buf).map_err(|e| {
            ShipwrightError::unexpected("completion script is not UTF-8").with_cause(e)
        })
    }
}

impl Command for CompletionsCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        ui.print(self.script()?.trim_end());
        Ok(CommandResult::success())
    }
}
