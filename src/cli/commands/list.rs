//! List command implementation.
//!
//! The `shipwright list` command shows every registered command and the
//! order its tasks run in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::commands::CommandRegistry;
use crate::error::Result;
use crate::runner::resolve;
use crate::services::{GitCli, LocalFileSystem, Services};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The list command implementation.
pub struct ListCommand {
    project_root: PathBuf,
}

impl ListCommand {
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
        }
    }

    /// Lines describing every command in `registry`.
    pub fn describe(&self, registry: &CommandRegistry, ui: &dyn UserInterface) -> Result<Vec<String>> {
        // Tasks are only inspected here, never run.
        let services = Arc::new(Services::new(
            Arc::new(LocalFileSystem::new(&self.project_root).dry_run(true)),
            Arc::new(GitCli::new(&self.project_root).dry_run(true)),
        ));
        let theme = ui.theme();

        let mut lines = Vec::new();
        for definition in registry.get_all() {
            lines.push(format!(
                "{} {}",
                theme.task.apply_to(definition.name()),
                theme.muted.apply_to(format!("- {}", definition.description()))
            ));

            let tasks = definition.tasks(&services);
            for (i, id) in resolve(&tasks)?.iter().enumerate() {
                let Some(task) = tasks.iter().find(|t| t.id() == id) else {
                    continue;
                };
                let mut line = format!("  {}. {} - {}", i + 1, id, task.description());
                if !task.dependencies().is_empty() {
                    line.push_str(&format!(
                        " {}",
                        theme.muted.apply_to(format!("(after {})", task.dependencies().join(", ")))
                    ));
                }
                if task.supports_undo() {
                    line.push_str(&format!(" {}", theme.muted.apply_to("[undoable]")));
                }
                lines.push(line);
            }
            lines.push(String::new());
        }
        lines.pop();
        Ok(lines)
    }
}

impl Command for ListCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let registry = CommandRegistry::builtin();
        for line in self.describe(&registry, ui)? {
            ui.print(&line);
        }
        Ok(CommandResult::success())
    }
}
