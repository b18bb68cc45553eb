//! External program execution.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, ShipwrightError};

/// Result of running an external program.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub duration: Duration,

    /// Whether the program exited with code 0.
    pub success: bool,
}

impl CommandResult {
    /// Trimmed stdout.
    pub fn output(&self) -> &str {
        self.stdout.trim()
    }

    /// Turn a non-zero exit into a `FAILED` error naming the command line.
    pub fn check(self, command_line: &str) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let detail = self.stderr.trim();
        let code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        Err(ShipwrightError::failed(if detail.is_empty() {
            format!("`{}` exited with {}", command_line, code)
        } else {
            format!("`{}` exited with {}: {}", command_line, code, detail)
        }))
    }
}

/// Options for program execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with the process environment).
    pub env: HashMap<String, String>,
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// Failing to spawn the program is an error; a non-zero exit is not.
pub fn execute(program: &str, args: &[&str], options: &CommandOptions) -> Result<CommandResult> {
    let start = Instant::now();
    let command_line = render(program, args);
    debug!("Running `{}`", command_line);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    let output = cmd.output().map_err(|e| {
        ShipwrightError::from(e)
            .context(format!("running `{}`", command_line))
            .in_component("process")
    })?;

    Ok(CommandResult {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration: start.elapsed(),
        success: output.status.success(),
    })
}

/// Render a program and its arguments as a single display string.
pub fn render(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push_str(&format!("{:?}", arg));
        } else {
            line.push_str(arg);
        }
    }
    line
}
