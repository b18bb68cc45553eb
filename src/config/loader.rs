//! Configuration file discovery and loading.
//!
//! Lookup order inside the project root (first hit wins):
//! 1. `.shipwright.yml`
//! 2. `.shipwright.yaml`
//! 3. `shipwright.yml`
//!
//! A missing file is not an error: every setting has a default, and the
//! manifest list is filled by detection when the file leaves it empty.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::schema::{BumpStrategy, ReleaseConfig};
use crate::error::{ErrorCode, Result, ShipwrightError};
use crate::services::manifest::ManifestKind;

/// File names searched for in the project root.
pub const CONFIG_FILE_NAMES: [&str; 3] = [".shipwright.yml", ".shipwright.yaml", "shipwright.yml"];

/// Find the project config file, if any.
pub fn discover_config(project_root: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.is_file())
}

/// Parse YAML content into a [`ReleaseConfig`].
///
/// # Errors
///
/// Returns `VALIDATION` naming `source_path` if the YAML is malformed or has
/// unknown fields.
pub fn parse_config(content: &str, source_path: &Path) -> Result<ReleaseConfig> {
    if content.trim().is_empty() {
        return Ok(ReleaseConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| {
        ShipwrightError::validation(format!(
            "Failed to parse config at {}: {}",
            source_path.display(),
            e
        ))
        .in_component("config")
        .with_cause(e)
    })
}

/// Load a single config file.
///
/// # Errors
///
/// Returns `NOT_FOUND` if the file does not exist.
pub fn load_config_file(path: &Path) -> Result<ReleaseConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ShipwrightError::not_found(format!("Configuration not found: {}", path.display()))
                .in_component("config")
        } else {
            ShipwrightError::from(e).context(format!("reading {}", path.display()))
        }
    })?;
    parse_config(&content, path)
}

/// Load configuration for a project.
///
/// If `config_override` is given that file must exist; otherwise the project
/// root is searched and defaults are used when nothing is found. Manifests
/// are detected when the configuration lists none.
pub fn load_config(project_root: &Path, config_override: Option<&Path>) -> Result<ReleaseConfig> {
    let mut config = match config_override {
        Some(path) => load_config_file(path)?,
        None => match discover_config(project_root) {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                load_config_file(&path)?
            }
            None => {
                debug!("No config file in {}, using defaults", project_root.display());
                ReleaseConfig::default()
            }
        },
    };

    if config.version.manifests.is_empty() {
        config.version.manifests = detect_manifests(project_root);
        debug!("Detected manifests: {:?}", config.version.manifests);
    }

    Ok(config)
}

/// Manifest files present in the project root, in a fixed preference order.
pub fn detect_manifests(project_root: &Path) -> Vec<PathBuf> {
    ManifestKind::KNOWN_FILES
        .iter()
        .filter(|name| project_root.join(name).is_file())
        .map(PathBuf::from)
        .collect()
}

/// Command-line overrides applied on top of the loaded file.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub dry_run: bool,
    pub bump: Option<BumpStrategy>,
    pub explicit_version: Option<String>,
    pub no_push: bool,
    pub no_publish: bool,
    pub allow_dirty: bool,
}

impl RunOverrides {
    /// Apply the overrides. Flags only ever switch behavior off or on in the
    /// direction the user asked for.
    pub fn apply(&self, config: &mut ReleaseConfig) {
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(bump) = self.bump {
            config.version.bump = bump;
        }
        if let Some(version) = &self.explicit_version {
            config.version.explicit = Some(version.clone());
        }
        if self.no_push {
            config.git.push = false;
        }
        if self.no_publish {
            config.release.enabled = false;
        }
        if self.allow_dirty {
            config.git.require_clean = false;
        }
    }
}

/// Whether an error came from a missing config file.
pub fn is_config_not_found(err: &ShipwrightError) -> bool {
    err.code() == ErrorCode::NotFound && err.component() == Some("config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discover_prefers_hidden_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("shipwright.yml"), "").unwrap();
        fs::write(temp.path().join(".shipwright.yml"), "").unwrap();

        let found = discover_config(temp.path()).unwrap();
        assert!(found.ends_with(".shipwright.yml"));
    }

    #[test]
    fn discover_returns_none_without_file() {
        let temp = TempDir::new().unwrap();
        assert!(discover_config(temp.path()).is_none());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), None).unwrap();
        assert!(config.changelog.enabled);
        assert!(config.version.manifests.is_empty());
    }

    #[test]
    fn explicit_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = load_config(temp.path(), Some(&temp.path().join("nope.yml"))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(is_config_not_found(&err));
    }

    #[test]
    fn parse_error_is_validation_with_path() {
        let err = parse_config("version: [", Path::new("/tmp/.shipwright.yml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
        assert!(err.message().contains(".shipwright.yml"));
    }

    #[test]
    fn empty_content_is_default() {
        let config = parse_config("  \n", Path::new("x.yml")).unwrap();
        assert_eq!(config, ReleaseConfig::default());
    }

    #[test]
    fn detects_manifests_in_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("package.json"), "{}").unwrap();
        fs::write(temp.path().join("Cargo.toml"), "").unwrap();

        let manifests = detect_manifests(temp.path());
        assert_eq!(
            manifests,
            vec![PathBuf::from("Cargo.toml"), PathBuf::from("package.json")]
        );
    }

    #[test]
    fn configured_manifests_are_not_replaced() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Cargo.toml"), "").unwrap();
        fs::write(
            temp.path().join(".shipwright.yml"),
            "version:\n  manifests: [VERSION]\n",
        )
        .unwrap();

        let config = load_config(temp.path(), None).unwrap();
        assert_eq!(config.version.manifests, vec![PathBuf::from("VERSION")]);
    }

    #[test]
    fn overrides_apply() {
        let mut config = ReleaseConfig::default();
        config.release.enabled = true;

        RunOverrides {
            dry_run: true,
            bump: Some(BumpStrategy::Major),
            explicit_version: Some("3.0.0".to_string()),
            no_push: true,
            no_publish: true,
            allow_dirty: true,
        }
        .apply(&mut config);

        assert!(config.dry_run);
        assert_eq!(config.version.bump, BumpStrategy::Major);
        assert_eq!(config.version.explicit.as_deref(), Some("3.0.0"));
        assert!(!config.git.push);
        assert!(!config.release.enabled);
        assert!(!config.git.require_clean);
    }

    #[test]
    fn default_overrides_change_nothing() {
        let mut config = ReleaseConfig::default();
        RunOverrides::default().apply(&mut config);
        assert_eq!(config, ReleaseConfig::default());
    }
}
