//! Command registry.
//!
//! A command is a named task graph plus the configuration rules that must
//! hold before it runs. The registry keeps commands in registration order.
//!
//! # Example
//!
//! ```
//! use shipwright::commands::CommandRegistry;
//!
//! let registry = CommandRegistry::builtin();
//! assert!(registry.has("release"));
//!
//! let names: Vec<&str> = registry.get_all().iter().map(|c| c.name()).collect();
//! assert_eq!(names, vec!["release", "bump", "changelog"]);
//! ```

use std::sync::Arc;

use crate::config::{validator, ReleaseConfig, ValidationIssue};
use crate::error::{Result, ShipwrightError};
use crate::pipeline;
use crate::services::Services;
use crate::task::TaskRef;

/// Builds a fresh task graph for one run.
pub type GraphBuilder = fn(&Arc<Services>) -> Vec<TaskRef>;

/// Checks a configuration against a command's requirements.
pub type ConfigSchema = fn(&ReleaseConfig) -> Vec<ValidationIssue>;

/// A registered command.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    name: String,
    description: String,
    build: GraphBuilder,
    schema: ConfigSchema,
}

impl CommandDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        build: GraphBuilder,
        schema: ConfigSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            build,
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Build the command's tasks.
    pub fn tasks(&self, services: &Arc<Services>) -> Vec<TaskRef> {
        (self.build)(services)
    }

    /// Every rule `config` breaks for this command.
    pub fn validate(&self, config: &ReleaseConfig) -> Vec<ValidationIssue> {
        (self.schema)(config)
    }
}

/// Name-keyed collection of commands.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    commands: Vec<CommandDefinition>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `release`, `bump` and `changelog` commands.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for command in [
            CommandDefinition::new(
                "release",
                "Bump, changelog, commit, tag, push and publish a release",
                pipeline::release_tasks,
                validator::release_schema,
            ),
            CommandDefinition::new(
                "bump",
                "Write the next version into the manifests",
                pipeline::bump_tasks,
                validator::bump_schema,
            ),
            CommandDefinition::new(
                "changelog",
                "Add the next version's section to the changelog",
                pipeline::changelog_tasks,
                validator::changelog_schema,
            ),
        ] {
            registry.commands.push(command);
        }
        registry
    }

    /// Add a command; a name already registered is a `CONFLICT`.
    pub fn register(&mut self, command: CommandDefinition) -> Result<()> {
        if self.has(command.name()) {
            return Err(ShipwrightError::conflict(format!(
                "Command '{}' is already registered",
                command.name()
            ))
            .in_component("commands"));
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&CommandDefinition> {
        self.commands.iter().find(|c| c.name == name).ok_or_else(|| {
            let known: Vec<&str> = self.commands.iter().map(|c| c.name()).collect();
            ShipwrightError::not_found(format!(
                "Unknown command '{}' (available: {})",
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
            .in_component("commands")
        })
    }

    /// All commands in registration order.
    pub fn get_all(&self) -> &[CommandDefinition] {
        &self.commands
    }

    pub fn has(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
