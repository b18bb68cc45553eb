//! Checks that must pass before anything is changed.

use std::sync::Arc;

use tracing::debug;

use crate::context::TaskContext;
use crate::error::{Result, ShipwrightError};
use crate::services::{ManifestKind, Services};
use crate::task::{Task, TaskSpec};

use super::keys;

/// Verifies the repository and manifests, and records the branch and the
/// previous release tag.
pub struct Preflight {
    spec: TaskSpec,
    services: Arc<Services>,
}

impl Preflight {
    pub fn new(spec: TaskSpec, services: Arc<Services>) -> Self {
        Self { spec, services }
    }
}

impl Task for Preflight {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        let vcs = &self.services.vcs;
        let config = ctx.config().clone();

        if !vcs.is_repository() {
            return Err(ShipwrightError::failed(format!(
                "{} is not a git repository",
                self.services.fs.root().display()
            ))
            .in_component("preflight"));
        }

        if config.git.require_clean {
            let changed = vcs.changed_files()?;
            if !changed.is_empty() {
                return Err(ShipwrightError::conflict(format!(
                    "working tree has uncommitted changes: {}",
                    changed.join(", ")
                ))
                .in_component("preflight"));
            }
        }

        for path in &config.version.manifests {
            ManifestKind::for_path(path)?;
            if !self.services.fs.exists(path) {
                return Err(ShipwrightError::not_found(format!(
                    "manifest {} does not exist",
                    path.display()
                ))
                .in_component("preflight"));
            }
        }

        let branch = vcs.current_branch()?;
        let previous_tag = vcs.latest_tag(&config.git.tag_prefix)?;
        debug!("On branch {}, previous tag {:?}", branch, previous_tag);

        ctx.set(keys::BRANCH, branch)?;
        ctx.set(keys::PREVIOUS_TAG, previous_tag)
    }
}
