//! Publishing the hosted release.

use std::sync::Arc;

use semver::Version;
use tracing::info;

use crate::context::{ExecutionContext, TaskContext};
use crate::error::{Result, ShipwrightError};
use crate::services::{HostedRelease, ReleaseRequest, Services};
use crate::task::{SkipDecision, Task, TaskSpec};

use super::keys;

/// Creates a release on the hosting provider for the pushed tag.
pub struct PublishRelease {
    spec: TaskSpec,
    services: Arc<Services>,
}

impl PublishRelease {
    pub fn new(spec: TaskSpec, services: Arc<Services>) -> Self {
        Self { spec, services }
    }
}

impl Task for PublishRelease {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn should_execute(&self, ctx: &ExecutionContext) -> Result<SkipDecision> {
        Ok(if ctx.config().release.enabled {
            SkipDecision::Run
        } else {
            SkipDecision::skip("hosted releases are disabled")
        })
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        let host = self.services.host()?;
        let version: String = ctx.get_as(keys::NEXT_VERSION)?;
        let tag: String = ctx.get_as(keys::TAG).map_err(|_| {
            ShipwrightError::invalid("no release tag was created in this run")
                .in_component("publish")
        })?;
        let body = if ctx.has(keys::CHANGELOG_ENTRY) {
            ctx.get_as(keys::CHANGELOG_ENTRY)?
        } else {
            format!("Release {}", version)
        };

        let request = ReleaseRequest {
            name: tag.clone(),
            tag,
            body,
            draft: ctx.config().release.draft,
            prerelease: !version.parse::<Version>()?.pre.is_empty(),
        };

        if let Some(existing) = host.find_release(&request.tag)? {
            return Err(ShipwrightError::conflict(format!(
                "a release for {} already exists at {}",
                existing.tag, existing.url
            ))
            .in_component("publish"));
        }

        let release = host.create_release(&request)?;
        info!("Published {} {}", release.tag, release.url);
        ctx.set(keys::HOSTED_RELEASE, &release)
    }

    fn supports_undo(&self) -> bool {
        true
    }

    fn undo(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        if !ctx.has(keys::HOSTED_RELEASE) {
            return Ok(());
        }
        let release: HostedRelease = ctx.get_as(keys::HOSTED_RELEASE)?;
        self.services.host()?.delete_release(&release)?;
        ctx.remove(keys::HOSTED_RELEASE);
        Ok(())
    }
}
