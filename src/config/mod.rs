//! Configuration loading, parsing, and validation for shipwright.
//!
//! - Schema definitions in [`schema`]
//! - File discovery, loading and CLI overrides in [`loader`]
//! - Per-command validation rules in [`validator`]
//!
//! # Example
//!
//! ```
//! use shipwright::config::{load_config, validator};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(temp.path().join("Cargo.toml"), "[package]\nversion = \"0.1.0\"\n").unwrap();
//! fs::write(temp.path().join(".shipwright.yml"), "project_name: demo").unwrap();
//!
//! let config = load_config(temp.path(), None).unwrap();
//! assert_eq!(config.project_name.as_deref(), Some("demo"));
//! assert!(validator::bump_schema(&config).is_empty());
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use schema::{
    BumpStrategy, ChangelogConfig, GitConfig, HostedReleaseConfig, Provider, ReleaseConfig,
    VersionConfig,
};

pub use loader::{
    detect_manifests, discover_config, is_config_not_found, load_config, load_config_file,
    parse_config, RunOverrides, CONFIG_FILE_NAMES,
};

pub use validator::{ensure_valid, ValidationIssue};

/// JSON schema of the configuration file.
pub fn json_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(ReleaseConfig);
    serde_json::to_value(schema).unwrap_or_default()
}
