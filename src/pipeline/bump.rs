//! Writing the next version into the manifests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semver::Version;
use tracing::{debug, info};

use crate::context::{ExecutionContext, TaskContext};
use crate::error::Result;
use crate::services::{ManifestKind, Services};
use crate::task::{SkipDecision, Task, TaskSpec};

use super::keys;

/// Record `path` as written by this run.
pub(crate) fn mark_changed(ctx: &mut TaskContext<'_>, path: &Path) -> Result<()> {
    let mut changed: Vec<PathBuf> = if ctx.has(keys::CHANGED_FILES) {
        ctx.get_as(keys::CHANGED_FILES)?
    } else {
        Vec::new()
    };
    if !changed.iter().any(|p| p == path) {
        changed.push(path.to_path_buf());
    }
    ctx.set(keys::CHANGED_FILES, changed)
}

/// Rewrites the version field of every configured manifest.
///
/// Original contents are saved before each write so undo can restore a
/// partially applied bump.
pub struct BumpManifest {
    spec: TaskSpec,
    services: Arc<Services>,
}

impl BumpManifest {
    pub fn new(spec: TaskSpec, services: Arc<Services>) -> Self {
        Self { spec, services }
    }
}

impl Task for BumpManifest {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn should_execute(&self, ctx: &ExecutionContext) -> Result<SkipDecision> {
        let current: String = ctx.get_as(keys::CURRENT_VERSION)?;
        let next: String = ctx.get_as(keys::NEXT_VERSION)?;
        Ok(if current == next {
            SkipDecision::skip(format!("version stays at {}", current))
        } else {
            SkipDecision::Run
        })
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        let next: Version = ctx.get_as::<String>(keys::NEXT_VERSION)?.parse()?;
        let manifests = ctx.config().version.manifests.clone();

        for path in &manifests {
            let kind = ManifestKind::for_path(path)?;
            let original = self.services.fs.read_to_string(path)?;
            let updated = kind
                .replace_version(&original, &next)
                .map_err(|e| e.context(path.display()))?;

            let key = path.display().to_string();
            save_backup(ctx, &key, &original)?;

            self.services.fs.write(path, &updated)?;
            mark_changed(ctx, path)?;
            info!("{} -> {}", path.display(), next);
        }
        Ok(())
    }

    fn supports_undo(&self) -> bool {
        true
    }

    fn undo(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        if !ctx.has(keys::MANIFEST_BACKUPS) {
            return Ok(());
        }
        let backups: BTreeMap<String, String> = ctx.get_as(keys::MANIFEST_BACKUPS)?;
        for (path, original) in &backups {
            let path = Path::new(path);
            if self.services.fs.read_to_string(path).ok().as_deref() == Some(original.as_str()) {
                continue;
            }
            debug!("Restoring {}", path.display());
            self.services.fs.write(path, original)?;
        }
        ctx.remove(keys::MANIFEST_BACKUPS);
        Ok(())
    }
}

fn save_backup(ctx: &mut TaskContext<'_>, path: &str, original: &str) -> Result<()> {
    let mut backups: BTreeMap<String, String> = if ctx.has(keys::MANIFEST_BACKUPS) {
        ctx.get_as(keys::MANIFEST_BACKUPS)?
    } else {
        BTreeMap::new()
    };
    backups
        .entry(path.to_string())
        .or_insert_with(|| original.to_string());
    ctx.set(keys::MANIFEST_BACKUPS, backups)
}
