//! Shipwright CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use shipwright::cli::{Cli, CommandDispatcher, CommandResult};
use shipwright::runner::CancelToken;
use shipwright::ui::{create_ui, should_use_colors, OutputMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// ANSI escapes are written only when `ansi` is set.
fn init_tracing(debug: bool, ansi: bool) {
    let filter = if debug {
        EnvFilter::new("shipwright=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shipwright=info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Cancel the run between tasks on Ctrl-C.
fn install_cancel_handler(token: CancelToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || token.cancel())
        .map_err(|e| anyhow::anyhow!("Failed to set signal handler: {}", e))
}

fn project_root(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.project {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir().context("Cannot determine the current directory"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        std::env::set_var("NO_COLOR", "1");
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    let colors = !cli.no_color && should_use_colors();
    init_tracing(cli.debug, colors);

    tracing::debug!("Shipwright starting with args: {:?}", cli);

    let mut ui = create_ui(OutputMode::from_quiet(cli.quiet), colors);

    let project_root = match project_root(&cli) {
        Ok(root) => root,
        Err(e) => {
            ui.error(&format!("Error: {:#}", e));
            return ExitCode::from(2);
        }
    };

    let cancel = CancelToken::new();
    if let Err(e) = install_cancel_handler(cancel.clone()) {
        tracing::warn!("{:#}", e);
    }

    let dispatcher = CommandDispatcher::new(project_root)
        .with_config_path(cli.config.clone())
        .with_colors(colors)
        .with_cancel_token(cancel);

    match dispatcher.dispatch(&cli, ui.as_mut()) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            ExitCode::from(CommandResult::exit_code_for(&e) as u8)
        }
    }
}
