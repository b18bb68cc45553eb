//! Error types for shipwright operations.
//!
//! This module defines [`ShipwrightError`], the single error value used by
//! every component, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Every error carries an [`ErrorCode`] drawn from a closed set, so callers
//!   can branch on the kind of failure without matching on message text
//! - Lower-level errors are wrapped as the `cause` and stay reachable through
//!   [`std::error::Error::source`]
//! - `retryable` is advisory only; nothing in the engine retries on its own
//! - `anyhow` is reserved for the binary entry point

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed lower-level error kept as the cause of a [`ShipwrightError`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Closed set of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input or configuration failed validation.
    Validation,
    /// A referenced entity (task, key, command, file) does not exist.
    NotFound,
    /// The operation collides with existing state (duplicate, cycle, sealed).
    Conflict,
    /// Filesystem, process or network I/O failed.
    Io,
    /// An operation ran out of time.
    Timeout,
    /// An internal invariant broke.
    Unexpected,
    /// A task or external operation reported failure.
    Failed,
    /// A value has the wrong shape or type.
    Invalid,
}

impl ErrorCode {
    /// Upper-case identifier used in messages and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Io => "IO",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Unexpected => "UNEXPECTED",
            ErrorCode::Failed => "FAILED",
            ErrorCode::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for shipwright operations.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct ShipwrightError {
    code: ErrorCode,
    message: String,
    #[source]
    cause: Option<Cause>,
    component: Option<String>,
    retryable: bool,
}

impl ShipwrightError {
    /// Create an error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            component: None,
            retryable: false,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Io, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message).retryable()
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unexpected, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Failed, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Invalid, message)
    }

    /// Attach the lower-level error that caused this one.
    pub fn with_cause(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Name the component that raised the error (e.g. `"graph"`, `"git"`).
    pub fn in_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Mark the error as safe to retry.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Prefix the message with extra context, keeping code and cause.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Serializable projection of this error for reports.
    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary::from(self)
    }
}

/// Plain-data view of a [`ShipwrightError`], safe to clone and serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub retryable: bool,
}

impl From<&ShipwrightError> for ErrorSummary {
    fn from(err: &ShipwrightError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            cause: err.cause.as_ref().map(|c| c.to_string()),
            source: err.component.clone(),
            retryable: err.retryable,
        }
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {})", cause)?;
        }
        Ok(())
    }
}

impl From<std::io::Error> for ShipwrightError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::NotFound,
            std::io::ErrorKind::TimedOut => ErrorCode::Timeout,
            _ => ErrorCode::Io,
        };
        Self::new(code, err.to_string()).with_cause(err)
    }
}

impl From<serde_yaml::Error> for ShipwrightError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::invalid(format!("YAML error: {}", err)).with_cause(err)
    }
}

impl From<serde_json::Error> for ShipwrightError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(format!("JSON error: {}", err)).with_cause(err)
    }
}

impl From<semver::Error> for ShipwrightError {
    fn from(err: semver::Error) -> Self {
        Self::invalid(format!("Invalid version: {}", err)).with_cause(err)
    }
}

impl From<reqwest::Error> for ShipwrightError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("HTTP request timed out: {}", err)).with_cause(err)
        } else if err.is_connect() {
            Self::io(format!("HTTP connection failed: {}", err))
                .retryable()
                .with_cause(err)
        } else {
            Self::io(format!("HTTP error: {}", err)).with_cause(err)
        }
    }
}

impl From<anyhow::Error> for ShipwrightError {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_cause(err)
    }
}

/// Result type alias for shipwright operations.
pub type Result<T> = std::result::Result<T, ShipwrightError>;
