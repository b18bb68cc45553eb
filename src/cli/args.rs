//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::{BumpStrategy, RunOverrides};

/// Shipwright - release automation with rollback.
#[derive(Debug, Parser)]
#[command(name = "shipwright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides .shipwright.yml in the project root)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Only show warnings, errors and the final status
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a release command (release, bump, changelog)
    Run(RunArgs),

    /// List commands and their tasks
    List,

    /// Show the resolved configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Command to run
    pub command: String,

    /// Print what would change without writing, committing or publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Bump strategy (auto, major, minor, patch, prerelease, none)
    #[arg(long, value_name = "STRATEGY")]
    pub bump: Option<BumpStrategy>,

    /// Release exactly this version
    #[arg(long, value_name = "VERSION", conflicts_with = "bump")]
    pub set_version: Option<String>,

    /// Do not push the branch and tag
    #[arg(long)]
    pub no_push: bool,

    /// Do not create a hosted release
    #[arg(long)]
    pub no_publish: bool,

    /// Allow uncommitted changes in the working tree
    #[arg(long)]
    pub allow_dirty: bool,

    /// Print the execution report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            dry_run: self.dry_run,
            bump: self.bump,
            explicit_version: self.set_version.clone(),
            no_push: self.no_push,
            no_publish: self.no_publish,
            allow_dirty: self.allow_dirty,
        }
    }
}

/// Arguments for the `config` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Check the configuration against a command's rules
    #[arg(long, value_name = "NAME")]
    pub command: Option<String>,

    /// Print the configuration file's JSON schema
    #[arg(long, conflicts_with = "command")]
    pub schema: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
