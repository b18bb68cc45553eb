//! Configuration schema definitions for shipwright.
//!
//! This module contains the struct definitions that map to the
//! `.shipwright.yml` file format.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root configuration structure for `.shipwright.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Project name (for display purposes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Version bump settings
    pub version: VersionConfig,

    /// Changelog generation settings
    pub changelog: ChangelogConfig,

    /// Commit, tag and push settings
    pub git: GitConfig,

    /// Hosting-provider release settings
    pub release: HostedReleaseConfig,

    /// Plan and log every change without touching files, git or the network
    #[serde(skip_serializing_if = "is_false")]
    pub dry_run: bool,
}

/// How the next version is derived from the current one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BumpStrategy {
    /// Infer from conventional commits since the last tag
    #[default]
    Auto,
    Major,
    Minor,
    Patch,
    /// Start or continue a pre-release series (`1.2.4-rc.1`)
    Prerelease,
    /// Keep the current version
    #[serde(rename = "none")]
    Keep,
}

impl BumpStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpStrategy::Auto => "auto",
            BumpStrategy::Major => "major",
            BumpStrategy::Minor => "minor",
            BumpStrategy::Patch => "patch",
            BumpStrategy::Prerelease => "prerelease",
            BumpStrategy::Keep => "none",
        }
    }
}

impl fmt::Display for BumpStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BumpStrategy::Auto),
            "major" => Ok(BumpStrategy::Major),
            "minor" => Ok(BumpStrategy::Minor),
            "patch" => Ok(BumpStrategy::Patch),
            "prerelease" | "pre" => Ok(BumpStrategy::Prerelease),
            "none" | "keep" => Ok(BumpStrategy::Keep),
            other => Err(format!(
                "unknown bump strategy '{}' (expected auto, major, minor, patch, prerelease or none)",
                other
            )),
        }
    }
}

/// Version bump settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct VersionConfig {
    /// Manifest files holding the version (relative to the project root).
    /// Detected automatically when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<PathBuf>,

    /// Bump strategy
    pub bump: BumpStrategy,

    /// Identifier used for pre-release versions
    pub prerelease_id: String,

    /// Release exactly this version instead of computing one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit: Option<String>,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            manifests: Vec::new(),
            bump: BumpStrategy::default(),
            prerelease_id: default_prerelease_id(),
            explicit: None,
        }
    }
}

fn default_prerelease_id() -> String {
    "rc".to_string()
}

/// Changelog generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ChangelogConfig {
    /// Generate a changelog section for the release
    pub enabled: bool,

    /// Changelog file (relative to the project root)
    pub path: PathBuf,

    /// Heading written when the changelog file is created
    pub title: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("CHANGELOG.md"),
            title: "# Changelog".to_string(),
        }
    }
}

/// Commit, tag and push settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    /// Refuse to release from a working tree with uncommitted changes
    pub require_clean: bool,

    /// Commit the bumped manifests and changelog
    pub commit: bool,

    /// Commit message; `{version}` and `{tag}` are substituted
    pub commit_message: String,

    /// Create an annotated tag
    pub tag: bool,

    /// Prefix prepended to the version to form the tag name
    pub tag_prefix: String,

    /// Annotated tag message; `{version}` and `{tag}` are substituted
    pub tag_message: String,

    /// Push the branch and tag
    pub push: bool,

    /// Remote to push to
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            require_clean: true,
            commit: true,
            commit_message: "chore(release): {version}".to_string(),
            tag: true,
            tag_prefix: "v".to_string(),
            tag_message: "Release {version}".to_string(),
            push: true,
            remote: "origin".to_string(),
        }
    }
}

impl GitConfig {
    /// Tag name for a version, e.g. `v1.2.3`.
    pub fn tag_name(&self, version: &str) -> String {
        format!("{}{}", self.tag_prefix, version)
    }

    /// Render a message template for a version.
    pub fn render(&self, template: &str, version: &str) -> String {
        template
            .replace("{version}", version)
            .replace("{tag}", &self.tag_name(version))
    }
}

/// Supported hosting providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Github,
    Gitlab,
}

impl Provider {
    /// Environment variable consulted for the API token when none is configured.
    pub fn default_token_env(&self) -> &'static str {
        match self {
            Provider::Github => "GITHUB_TOKEN",
            Provider::Gitlab => "GITLAB_TOKEN",
        }
    }

    pub fn default_api_url(&self) -> &'static str {
        match self {
            Provider::Github => "https://api.github.com",
            Provider::Gitlab => "https://gitlab.com/api/v4",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Github => f.write_str("github"),
            Provider::Gitlab => f.write_str("gitlab"),
        }
    }
}

/// Hosting-provider release settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct HostedReleaseConfig {
    /// Create a release on the hosting provider
    #[serde(skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Hosting provider
    pub provider: Provider,

    /// `owner/repo` on GitHub, project path or numeric ID on GitLab
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Environment variable holding the API token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// API base URL (for self-hosted instances)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Create the release as a draft
    #[serde(skip_serializing_if = "is_false")]
    pub draft: bool,
}

impl HostedReleaseConfig {
    pub fn token_env(&self) -> &str {
        self.token_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_token_env())
    }

    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_url())
    }
}

fn is_false(v: &bool) -> bool {
    !v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config: ReleaseConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ReleaseConfig::default());
        assert!(config.changelog.enabled);
        assert!(config.git.push);
        assert!(!config.release.enabled);
    }

    #[test]
    fn parses_full_config() {
        let yaml = r#"
project_name: demo
version:
  manifests: [Cargo.toml, package.json]
  bump: minor
  prerelease_id: beta
changelog:
  path: docs/CHANGES.md
git:
  tag_prefix: ""
  push: false
release:
  enabled: true
  provider: gitlab
  repository: group/demo
"#;
        let config: ReleaseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.project_name.as_deref(), Some("demo"));
        assert_eq!(config.version.manifests.len(), 2);
        assert_eq!(config.version.bump, BumpStrategy::Minor);
        assert_eq!(config.version.prerelease_id, "beta");
        assert_eq!(config.changelog.path, PathBuf::from("docs/CHANGES.md"));
        assert_eq!(config.git.tag_prefix, "");
        assert!(!config.git.push);
        assert!(config.git.commit);
        assert_eq!(config.release.provider, Provider::Gitlab);
    }

    #[test]
    fn bump_none_maps_to_keep() {
        let config: VersionConfig = serde_yaml::from_str("bump: none").unwrap();
        assert_eq!(config.bump, BumpStrategy::Keep);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ReleaseConfig, _> = serde_yaml::from_str("gti: {}");
        assert!(result.is_err());
    }

    #[test]
    fn bump_strategy_from_str() {
        assert_eq!("MAJOR".parse::<BumpStrategy>().unwrap(), BumpStrategy::Major);
        assert_eq!("pre".parse::<BumpStrategy>().unwrap(), BumpStrategy::Prerelease);
        assert_eq!("none".parse::<BumpStrategy>().unwrap(), BumpStrategy::Keep);
        assert!("huge".parse::<BumpStrategy>().is_err());
    }

    #[test]
    fn tag_name_and_templates() {
        let git = GitConfig::default();
        assert_eq!(git.tag_name("1.2.3"), "v1.2.3");
        assert_eq!(git.render("chore(release): {version}", "1.2.3"), "chore(release): 1.2.3");
        assert_eq!(git.render("Release {tag}", "1.2.3"), "Release v1.2.3");
    }

    #[test]
    fn provider_defaults() {
        let release = HostedReleaseConfig::default();
        assert_eq!(release.token_env(), "GITHUB_TOKEN");
        assert_eq!(release.api_url(), "https://api.github.com");

        let gitlab = HostedReleaseConfig {
            provider: Provider::Gitlab,
            token_env: Some("CI_JOB_TOKEN".to_string()),
            ..Default::default()
        };
        assert_eq!(gitlab.token_env(), "CI_JOB_TOKEN");
        assert_eq!(gitlab.api_url(), "https://gitlab.com/api/v4");
    }

    #[test]
    fn defaults_skip_when_serialized() {
        let yaml = serde_yaml::to_string(&ReleaseConfig::default()).unwrap();
        assert!(!yaml.contains("dry_run"));
        assert!(!yaml.contains("project_name"));
    }
}
