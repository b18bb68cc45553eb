//! Configuration validation rules.
//!
//! Every command carries a schema: a function returning all
//! [`ValidationIssue`]s for a configuration. Issues are collected rather than
//! stopping at the first one, so users can fix several problems at once.
//! [`ensure_valid`] turns a non-empty list into a `VALIDATION` error, which
//! keeps the run from starting.

use std::fmt;

use crate::config::schema::{Provider, ReleaseConfig};
use crate::error::{Result, ShipwrightError};
use crate::services::manifest::ManifestKind;

/// A single problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Dotted path of the offending field
    pub field: String,
}

impl ValidationIssue {
    fn new(rule: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
            field: field.to_string(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.field, self.message, self.rule)
    }
}

/// Checks shared by every command.
pub fn validate_common(config: &ReleaseConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Some(explicit) = &config.version.explicit {
        if semver::Version::parse(explicit.trim_start_matches('v')).is_err() {
            issues.push(ValidationIssue::new(
                "invalid-version",
                "version.explicit",
                format!("'{}' is not a semantic version", explicit),
            ));
        }
    }

    let pre = &config.version.prerelease_id;
    if pre.is_empty() || !pre.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        issues.push(ValidationIssue::new(
            "invalid-prerelease-id",
            "version.prerelease_id",
            format!("'{}' must be non-empty and contain only [0-9A-Za-z-]", pre),
        ));
    }

    if config.git.tag_prefix.chars().any(char::is_whitespace) {
        issues.push(ValidationIssue::new(
            "invalid-tag-prefix",
            "git.tag_prefix",
            "tag prefix must not contain whitespace",
        ));
    }

    issues
}

/// Checks for commands that rewrite version manifests.
pub fn validate_manifests(config: &ReleaseConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if config.version.manifests.is_empty() {
        issues.push(ValidationIssue::new(
            "no-manifests",
            "version.manifests",
            format!(
                "no version manifest configured or detected (looked for {})",
                ManifestKind::KNOWN_FILES.join(", ")
            ),
        ));
    }

    for manifest in &config.version.manifests {
        if ManifestKind::detect(manifest).is_none() {
            issues.push(ValidationIssue::new(
                "unknown-manifest",
                "version.manifests",
                format!("unsupported manifest '{}'", manifest.display()),
            ));
        }
    }

    issues
}

/// Checks for commands that write the changelog.
pub fn validate_changelog(config: &ReleaseConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if config.changelog.enabled && config.changelog.path.as_os_str().is_empty() {
        issues.push(ValidationIssue::new(
            "missing-changelog-path",
            "changelog.path",
            "changelog path must not be empty",
        ));
    }
    issues
}

/// Schema of the `bump` command.
pub fn bump_schema(config: &ReleaseConfig) -> Vec<ValidationIssue> {
    let mut issues = validate_common(config);
    issues.extend(validate_manifests(config));
    issues
}

/// Schema of the `changelog` command.
pub fn changelog_schema(config: &ReleaseConfig) -> Vec<ValidationIssue> {
    let mut issues = validate_common(config);
    if !config.changelog.enabled {
        issues.push(ValidationIssue::new(
            "changelog-disabled",
            "changelog.enabled",
            "the changelog command needs changelog.enabled: true",
        ));
    }
    issues.extend(validate_changelog(config));
    issues
}

/// Schema of the `release` command.
pub fn release_schema(config: &ReleaseConfig) -> Vec<ValidationIssue> {
    let mut issues = validate_common(config);
    issues.extend(validate_manifests(config));
    issues.extend(validate_changelog(config));

    if config.git.commit && !config.git.commit_message.contains("{version}") {
        issues.push(ValidationIssue::new(
            "commit-message-without-version",
            "git.commit_message",
            "commit message must contain {version}",
        ));
    }

    if config.git.tag && !config.git.commit && (config.changelog.enabled || !config.version.manifests.is_empty()) {
        issues.push(ValidationIssue::new(
            "tag-without-commit",
            "git.tag",
            "tagging without committing would tag the previous commit; enable git.commit",
        ));
    }

    let release = &config.release;
    if release.enabled {
        if !config.git.tag || !config.git.push {
            issues.push(ValidationIssue::new(
                "release-without-pushed-tag",
                "release.enabled",
                "a hosted release needs git.tag and git.push so the tag exists on the remote",
            ));
        }

        match release.repository.as_deref().map(str::trim) {
            None | Some("") => issues.push(ValidationIssue::new(
                "missing-repository",
                "release.repository",
                "release.repository is required when release.enabled is true",
            )),
            Some(repo) if release.provider == Provider::Github => {
                let parts: Vec<&str> = repo.split('/').collect();
                if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
                    issues.push(ValidationIssue::new(
                        "invalid-repository",
                        "release.repository",
                        format!("'{}' must have the form owner/repo", repo),
                    ));
                }
            }
            Some(_) => {}
        }

        if let Some(url) = &release.api_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                issues.push(ValidationIssue::new(
                    "invalid-api-url",
                    "release.api_url",
                    format!("'{}' must be an http(s) URL", url),
                ));
            }
        }
    }

    issues
}

/// Fail with `VALIDATION` if any issue was found.
pub fn ensure_valid(issues: &[ValidationIssue]) -> Result<()> {
    if issues.is_empty() {
        return Ok(());
    }
    let details: Vec<String> = issues.iter().map(|i| format!("  - {}", i)).collect();
    Err(ShipwrightError::validation(format!(
        "Invalid configuration ({} issue{}):\n{}",
        issues.len(),
        if issues.len() == 1 { "" } else { "s" },
        details.join("\n")
    ))
    .in_component("config"))
}
