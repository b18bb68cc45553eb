//! Version arithmetic and the `resolve-version` task.

use std::path::Path;
use std::sync::Arc;

use semver::{Prerelease, Version};
use tracing::{debug, info};

use crate::config::{BumpStrategy, ReleaseConfig};
use crate::context::{ExecutionContext, TaskContext};
use crate::error::{Result, ShipwrightError};
use crate::services::{Commit, ManifestKind, Services};
use crate::task::{Flow, Task, TaskSpec};

use super::commits::ConventionalCommit;
use super::keys;

/// Concrete bump level after `auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpLevel {
    Major,
    Minor,
    Patch,
    Prerelease,
    None,
}

impl BumpLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpLevel::Major => "major",
            BumpLevel::Minor => "minor",
            BumpLevel::Patch => "patch",
            BumpLevel::Prerelease => "prerelease",
            BumpLevel::None => "none",
        }
    }
}

/// Infer the bump from conventional commits.
///
/// A breaking change bumps major (minor while below 1.0.0), a feature bumps
/// minor, anything else patch.
pub fn infer_bump(current: &Version, commits: &[Commit]) -> BumpLevel {
    let parsed: Vec<ConventionalCommit> = commits
        .iter()
        .map(ConventionalCommit::parse)
        .filter(|c| !c.is_release_commit())
        .collect();

    if parsed.iter().any(|c| c.breaking) {
        if current.major == 0 {
            BumpLevel::Minor
        } else {
            BumpLevel::Major
        }
    } else if parsed.iter().any(|c| c.is_feature()) {
        BumpLevel::Minor
    } else {
        BumpLevel::Patch
    }
}

/// Apply `level` to `current`.
///
/// Bumping a prerelease to the level it is already a prerelease of
/// releases it (`2.0.0-rc.1` major is `2.0.0`). A prerelease bump of a
/// release starts the next patch's prerelease series (`1.2.3` to
/// `1.2.4-rc.1`); of a prerelease with the same identifier, increments
/// its counter.
pub fn bump(current: &Version, level: BumpLevel, prerelease_id: &str) -> Result<Version> {
    let is_pre = !current.pre.is_empty();
    let next = match level {
        BumpLevel::None => current.clone(),
        BumpLevel::Major => {
            if is_pre && current.minor == 0 && current.patch == 0 {
                Version::new(current.major, 0, 0)
            } else {
                Version::new(current.major + 1, 0, 0)
            }
        }
        BumpLevel::Minor => {
            if is_pre && current.patch == 0 {
                Version::new(current.major, current.minor, 0)
            } else {
                Version::new(current.major, current.minor + 1, 0)
            }
        }
        BumpLevel::Patch => {
            if is_pre {
                Version::new(current.major, current.minor, current.patch)
            } else {
                Version::new(current.major, current.minor, current.patch + 1)
            }
        }
        BumpLevel::Prerelease => {
            let counter = prerelease_counter(&current.pre, prerelease_id);
            let mut next = match counter {
                Some(_) => Version::new(current.major, current.minor, current.patch),
                None if is_pre => Version::new(current.major, current.minor, current.patch),
                None => Version::new(current.major, current.minor, current.patch + 1),
            };
            let n = counter.map_or(1, |n| n + 1);
            next.pre = Prerelease::new(&format!("{}.{}", prerelease_id, n))?;
            next
        }
    };
    Ok(next)
}

/// The numeric counter of a `<id>.<n>` prerelease.
fn prerelease_counter(pre: &Prerelease, id: &str) -> Option<u64> {
    let (head, counter) = pre.as_str().rsplit_once('.')?;
    if head != id {
        return None;
    }
    counter.parse().ok()
}

/// Work out the next version from the configuration and history.
pub fn next_version(
    current: &Version,
    config: &ReleaseConfig,
    commits: &[Commit],
) -> Result<(Version, BumpLevel)> {
    if let Some(explicit) = &config.version.explicit {
        let explicit = Version::parse(explicit.trim_start_matches('v'))?;
        if explicit <= *current {
            return Err(ShipwrightError::invalid(format!(
                "explicit version {} must be greater than the current version {}",
                explicit, current
            ))
            .in_component("version"));
        }
        return Ok((explicit, BumpLevel::None));
    }

    let level = match config.version.bump {
        BumpStrategy::Auto => infer_bump(current, commits),
        BumpStrategy::Major => BumpLevel::Major,
        BumpStrategy::Minor => BumpLevel::Minor,
        BumpStrategy::Patch => BumpLevel::Patch,
        BumpStrategy::Prerelease => BumpLevel::Prerelease,
        BumpStrategy::Keep => BumpLevel::None,
    };
    Ok((bump(current, level, &config.version.prerelease_id)?, level))
}

/// Current version: from the first manifest, else from the latest tag, else
/// `0.0.0`.
pub fn current_version(
    services: &Services,
    config: &ReleaseConfig,
    previous_tag: Option<&str>,
) -> Result<Version> {
    if let Some(path) = config.version.manifests.first() {
        return read_manifest_version(services, path);
    }
    if let Some(tag) = previous_tag {
        let stripped = tag.strip_prefix(config.git.tag_prefix.as_str()).unwrap_or(tag);
        if let Ok(version) = Version::parse(stripped) {
            return Ok(version);
        }
    }
    Ok(Version::new(0, 0, 0))
}

pub fn read_manifest_version(services: &Services, path: &Path) -> Result<Version> {
    let kind = ManifestKind::for_path(path)?;
    let content = services.fs.read_to_string(path)?;
    kind.read_version(&content)
        .map_err(|e| e.context(path.display()))
}

/// Determines the current and next versions.
///
/// When the version does not change and a skip target is set, the tasks
/// between this one and the target are bypassed.
pub struct ResolveVersion {
    spec: TaskSpec,
    services: Arc<Services>,
    skip_to: Option<String>,
}

impl ResolveVersion {
    pub fn new(spec: TaskSpec, services: Arc<Services>) -> Self {
        Self {
            spec,
            services,
            skip_to: None,
        }
    }

    pub fn skip_to_when_unchanged(mut self, target: impl Into<String>) -> Self {
        self.skip_to = Some(target.into());
        self
    }
}

impl Task for ResolveVersion {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        let config = ctx.config().clone();

        let previous_tag: Option<String> = if ctx.has(keys::PREVIOUS_TAG) {
            ctx.get_as(keys::PREVIOUS_TAG)?
        } else {
            let tag = self.services.vcs.latest_tag(&config.git.tag_prefix)?;
            ctx.set(keys::PREVIOUS_TAG, &tag)?;
            tag
        };

        let commits = self.services.vcs.commits_since(previous_tag.as_deref())?;
        let current = current_version(&self.services, &config, previous_tag.as_deref())?;
        let (next, level) = next_version(&current, &config, &commits)?;

        info!("Version {} -> {} ({})", current, next, level.as_str());
        debug!("{} commit(s) since {:?}", commits.len(), previous_tag);

        ctx.set(keys::COMMITS, &commits)?;
        ctx.set(keys::CURRENT_VERSION, current.to_string())?;
        ctx.set(keys::NEXT_VERSION, next.to_string())?;
        ctx.set(keys::BUMP, level.as_str())
    }

    fn next(&self, ctx: &ExecutionContext) -> Result<Flow> {
        let current: String = ctx.get_as(keys::CURRENT_VERSION)?;
        let next: String = ctx.get_as(keys::NEXT_VERSION)?;
        Ok(match &self.skip_to {
            Some(target) if current == next => Flow::SkipTo(target.clone()),
            _ => Flow::Continue,
        })
    }
}
