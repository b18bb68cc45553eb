//! Shipwright - release automation with ordered tasks and rollback.
//!
//! A release is a graph of tasks (bump the manifests, write the changelog,
//! commit, tag, push, publish). The orchestrator runs them in dependency
//! order, lets a task skip itself or redirect the run, and undoes completed
//! tasks in reverse order when something fails.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`commands`] - Registry of named commands and their task graphs
//! - [`config`] - Configuration loading, overrides, and validation
//! - [`context`] - Execution context shared by the tasks of one run
//! - [`error`] - Error codes, error type, and result alias
//! - [`pipeline`] - The release tasks
//! - [`runner`] - Graph resolution, orchestration, and rollback
//! - [`services`] - Filesystem, git, process, and release host adapters
//! - [`task`] - The task contract
//! - [`ui`] - Terminal output
//!
//! # Example
//!
//! ```
//! use shipwright::config::ReleaseConfig;
//! use shipwright::context::ExecutionContext;
//! use shipwright::runner::{Orchestrator, RunState};
//! use shipwright::task::FnTask;
//!
//! let tasks = vec![
//!     FnTask::new("build", |ctx| ctx.set("artifact", "app.tar.gz")).into_ref(),
//!     FnTask::new("upload", |ctx| {
//!         let artifact: String = ctx.get_as("artifact")?;
//!         ctx.set("uploaded", artifact)
//!     })
//!     .depends_on(["build"])
//!     .into_ref(),
//! ];
//!
//! let report = Orchestrator::silent().run(&tasks, ExecutionContext::new(ReleaseConfig::default()));
//!
//! assert_eq!(report.state, RunState::Succeeded);
//! assert_eq!(report.executed, vec!["build", "upload"]);
//! assert_eq!(report.data.get("uploaded").unwrap(), "app.tar.gz");
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod services;
pub mod task;
pub mod ui;

pub use error::{ErrorCode, Result, ShipwrightError};
