//! Version manifests.
//!
//! Reads and rewrites the version field of the manifest formats shipwright
//! understands. Edits are plain text substitutions on the version literal, so
//! comments, key order and whitespace survive untouched.

use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

use crate::error::{Result, ShipwrightError};

static TOML_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[\s*([A-Za-z0-9_.\-]+)\s*\]").unwrap());

static TOML_VERSION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*version\s*=\s*["']([^"']*)["']"#).unwrap());

static JSON_VERSION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""version"\s*:\s*"([^"]*)""#).unwrap());

/// Supported manifest formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// `Cargo.toml` (`[package]` or `[workspace.package]`)
    Cargo,
    /// `package.json` (top-level `version`)
    PackageJson,
    /// `pyproject.toml` (`[project]` or `[tool.poetry]`)
    Pyproject,
    /// A file holding nothing but the version
    PlainVersion,
}

impl ManifestKind {
    /// File names recognized during detection, in preference order.
    pub const KNOWN_FILES: [&'static str; 4] =
        ["Cargo.toml", "package.json", "pyproject.toml", "VERSION"];

    /// Recognize a manifest by its file name.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        match name {
            "Cargo.toml" => Some(ManifestKind::Cargo),
            "package.json" => Some(ManifestKind::PackageJson),
            "pyproject.toml" => Some(ManifestKind::Pyproject),
            "VERSION" | "VERSION.txt" => Some(ManifestKind::PlainVersion),
            _ => None,
        }
    }

    /// Like [`detect`](Self::detect) but fails with `VALIDATION`.
    pub fn for_path(path: &Path) -> Result<Self> {
        Self::detect(path).ok_or_else(|| {
            ShipwrightError::validation(format!("unsupported manifest '{}'", path.display()))
                .in_component("manifest")
        })
    }

    fn toml_sections(&self) -> &'static [&'static str] {
        match self {
            ManifestKind::Cargo => &["package", "workspace.package"],
            ManifestKind::Pyproject => &["project", "tool.poetry"],
            _ => &[],
        }
    }

    /// Byte range of the version literal inside `content`.
    fn locate(&self, content: &str) -> Result<Range<usize>> {
        let range = match self {
            ManifestKind::Cargo | ManifestKind::Pyproject => {
                locate_toml_version(content, self.toml_sections())
            }
            ManifestKind::PackageJson => locate_json_version(content)?,
            ManifestKind::PlainVersion => {
                let start = content.len() - content.trim_start().len();
                let end = content.trim_end().len();
                (start < end).then_some(start..end)
            }
        };
        range.ok_or_else(|| {
            ShipwrightError::not_found(format!("no version field found in {}", self))
                .in_component("manifest")
        })
    }

    /// Read the version declared in `content`.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the manifest has no version field and `INVALID`
    /// if the declared version is not semver.
    pub fn read_version(&self, content: &str) -> Result<Version> {
        let range = self.locate(content)?;
        let raw = &content[range];
        Version::parse(raw.trim_start_matches('v')).map_err(|e| {
            ShipwrightError::invalid(format!("{} declares '{}', which is not semver", self, raw))
                .in_component("manifest")
                .with_cause(e)
        })
    }

    /// Return `content` with the version literal replaced by `version`.
    pub fn replace_version(&self, content: &str, version: &Version) -> Result<String> {
        let range = self.locate(content)?;
        let mut updated = String::with_capacity(content.len() + 8);
        updated.push_str(&content[..range.start]);
        updated.push_str(&version.to_string());
        updated.push_str(&content[range.end..]);
        Ok(updated)
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManifestKind::Cargo => "Cargo.toml",
            ManifestKind::PackageJson => "package.json",
            ManifestKind::Pyproject => "pyproject.toml",
            ManifestKind::PlainVersion => "VERSION",
        };
        f.write_str(name)
    }
}

fn locate_toml_version(content: &str, sections: &[&str]) -> Option<Range<usize>> {
    let mut offset = 0;
    let mut in_section = false;

    for line in content.split_inclusive('\n') {
        if let Some(caps) = TOML_SECTION.captures(line) {
            in_section = sections.contains(&&caps[1]);
        } else if in_section {
            if let Some(value) = TOML_VERSION_KEY.captures(line).and_then(|c| c.get(1)) {
                return Some(offset + value.start()..offset + value.end());
            }
        }
        offset += line.len();
    }

    None
}

fn locate_json_version(content: &str) -> Result<Option<Range<usize>>> {
    let parsed: serde_json::Value = serde_json::from_str(content)?;
    let Some(declared) = parsed.get("version").and_then(|v| v.as_str()) else {
        return Ok(None);
    };

    // Nested objects may also carry a "version" key; take the first literal
    // that matches the top-level value.
    Ok(JSON_VERSION_KEY
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .find(|m| m.as_str() == declared)
        .map(|m| m.range()))
}
