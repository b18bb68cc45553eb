//! Config command implementation.
//!
//! The `shipwright config` command shows the resolved configuration, checks
//! it against a command's rules, or prints the file's JSON schema.

use std::path::{Path, PathBuf};

use crate::cli::args::ConfigArgs;
use crate::commands::CommandRegistry;
use crate::config::{discover_config, json_schema, load_config};
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, EXIT_USAGE};

/// The config command implementation.
pub struct ConfigCommand {
    project_root: PathBuf,
    config_path: Option<PathBuf>,
    args: ConfigArgs,
}

impl ConfigCommand {
    pub fn new(project_root: &Path, args: ConfigArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_path: None,
            args,
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }
}

impl Command for ConfigCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        if self.args.schema {
            ui.print(&serde_json::to_string_pretty(&json_schema())?);
            return Ok(CommandResult::success());
        }

        let config = load_config(&self.project_root, self.config_path.as_deref())?;
        let source = self
            .config_path
            .clone()
            .or_else(|| discover_config(&self.project_root));

        if let Some(name) = &self.args.command {
            let registry = CommandRegistry::builtin();
            let issues = registry.get(name)?.validate(&config);
            if issues.is_empty() {
                ui.success(&format!("Configuration is valid for '{}'", name));
                return Ok(CommandResult::success());
            }
            ui.error(&format!("Configuration is not valid for '{}':", name));
            for issue in &issues {
                ui.error(&format!("  {}", issue));
            }
            return Ok(CommandResult::failure(EXIT_USAGE));
        }

        match source {
            Some(path) => ui.message(&format!("# {}", path.display())),
            None => ui.message("# defaults (no configuration file found)"),
        }
        ui.print(serde_yaml::to_string(&config)?.trim_end());
        Ok(CommandResult::success())
    }
}
