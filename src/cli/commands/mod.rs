//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait and is routed by
//! [`CommandDispatcher`].

pub mod completions;
pub mod config;
pub mod dispatcher;
pub mod list;
pub mod run;

pub use dispatcher::{
    Command, CommandDispatcher, CommandResult, EXIT_DIRTY, EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE,
};
