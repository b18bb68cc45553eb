//! The `shipwright run` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cli::args::RunArgs;
use crate::commands::CommandRegistry;
use crate::config::load_config;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::runner::{CancelToken, Orchestrator, TracingSink};
use crate::services::Services;
use crate::ui::{show_report, ConsoleSink, UserInterface};

use super::dispatcher::{Command, CommandResult, EXIT_USAGE};

/// Runs one registered command end to end.
pub struct RunCommand {
    project_root: PathBuf,
    config_path: Option<PathBuf>,
    args: RunArgs,
    colors: bool,
    cancel: CancelToken,
}

impl RunCommand {
    pub fn new(project_root: &Path, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_path: None,
            args,
            colors: false,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let registry = CommandRegistry::builtin();
        let definition = registry.get(&self.args.command)?;

        let mut config = load_config(&self.project_root, self.config_path.as_deref())?;
        self.args.overrides().apply(&mut config);

        let issues = definition.validate(&config);
        if !issues.is_empty() {
            ui.error(&format!(
                "Configuration is not valid for '{}':",
                definition.name()
            ));
            for issue in &issues {
                ui.error(&format!("  {}", issue));
            }
            return Ok(CommandResult::failure(EXIT_USAGE));
        }

        let services = Arc::new(Services::local(&self.project_root, &config)?);
        let tasks = definition.tasks(&services);
        debug!("Running '{}' with {:?}", definition.name(), services);

        if !self.args.json {
            let mut title = format!("shipwright {}", definition.name());
            if let Some(name) = &config.project_name {
                title.push_str(&format!(" · {}", name));
            }
            if config.dry_run {
                title.push_str(" (dry run)");
            }
            ui.show_header(&title);
        }

        let context = ExecutionContext::new(config).with_command(definition.name());
        // Events reach the console once; logs carry them at debug level only.
        let mut orchestrator = Orchestrator::silent().with_cancel_token(self.cancel.clone());
        if self.args.json {
            orchestrator = orchestrator.with_sink(TracingSink::new());
        } else {
            orchestrator = orchestrator
                .with_sink(ConsoleSink::new(ui.output_mode(), self.colors))
                .with_sink(TracingSink::demoted());
        }

        let report = orchestrator.run(&tasks, context);

        if self.args.json {
            ui.print(&serde_json::to_string_pretty(&report)?);
        } else {
            show_report(ui, &report);
        }

        Ok(CommandResult::from_report(&report))
    }
}
