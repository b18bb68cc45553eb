//! Release commit, tag and push.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::context::{ExecutionContext, TaskContext};
use crate::error::{Result, ShipwrightError};
use crate::services::Services;
use crate::task::{SkipDecision, Task, TaskSpec};

use super::keys;

fn next_version(ctx: &ExecutionContext) -> Result<String> {
    ctx.get_as(keys::NEXT_VERSION)
}

/// Commits the files the run changed.
pub struct CommitRelease {
    spec: TaskSpec,
    services: Arc<Services>,
}

impl CommitRelease {
    pub fn new(spec: TaskSpec, services: Arc<Services>) -> Self {
        Self { spec, services }
    }
}

impl Task for CommitRelease {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn should_execute(&self, ctx: &ExecutionContext) -> Result<SkipDecision> {
        if !ctx.config().git.commit {
            return Ok(SkipDecision::skip("git.commit is disabled"));
        }
        let changed: Vec<PathBuf> = if ctx.has(keys::CHANGED_FILES) {
            ctx.get_as(keys::CHANGED_FILES)?
        } else {
            Vec::new()
        };
        Ok(if changed.is_empty() {
            SkipDecision::skip("no files changed")
        } else {
            SkipDecision::Run
        })
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        let version = next_version(ctx)?;
        let changed: Vec<PathBuf> = ctx.get_as(keys::CHANGED_FILES)?;
        let git = &ctx.config().git;
        let message = git.render(&git.commit_message, &version);

        self.services.vcs.stage(&changed)?;
        let sha = self.services.vcs.commit(&message)?;
        info!("Committed {}", sha.get(..7).unwrap_or(&sha));
        ctx.set(keys::COMMIT_SHA, sha)
    }

    fn supports_undo(&self) -> bool {
        true
    }

    fn undo(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        if !ctx.has(keys::COMMIT_SHA) {
            return Ok(());
        }
        self.services.vcs.reset_last_commit()?;
        ctx.remove(keys::COMMIT_SHA);
        Ok(())
    }
}

/// Creates the annotated release tag.
pub struct CreateTag {
    spec: TaskSpec,
    services: Arc<Services>,
}

impl CreateTag {
    pub fn new(spec: TaskSpec, services: Arc<Services>) -> Self {
        Self { spec, services }
    }
}

impl Task for CreateTag {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn should_execute(&self, ctx: &ExecutionContext) -> Result<SkipDecision> {
        Ok(if ctx.config().git.tag {
            SkipDecision::Run
        } else {
            SkipDecision::skip("git.tag is disabled")
        })
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        let version = next_version(ctx)?;
        let git = &ctx.config().git;
        let name = git.tag_name(&version);
        let message = git.render(&git.tag_message, &version);

        if self.services.vcs.tag_exists(&name)? {
            return Err(
                ShipwrightError::conflict(format!("tag {} already exists", name)).in_component("git"),
            );
        }
        self.services.vcs.create_tag(&name, &message)?;
        info!("Tagged {}", name);
        ctx.set(keys::TAG, name)
    }

    fn supports_undo(&self) -> bool {
        true
    }

    fn undo(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        if !ctx.has(keys::TAG) {
            return Ok(());
        }
        let name: String = ctx.get_as(keys::TAG)?;
        self.services.vcs.delete_tag(&name)?;
        ctx.remove(keys::TAG);
        Ok(())
    }
}

/// Pushes the branch and tag to the remote.
///
/// A push cannot be taken back: it never registers for rollback, and once it
/// has happened rollback leaves the local commit and tag alone.
pub struct PushRelease {
    spec: TaskSpec,
    services: Arc<Services>,
}

impl PushRelease {
    pub fn new(spec: TaskSpec, services: Arc<Services>) -> Self {
        Self { spec, services }
    }
}

impl Task for PushRelease {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn should_execute(&self, ctx: &ExecutionContext) -> Result<SkipDecision> {
        Ok(if ctx.config().git.push {
            SkipDecision::Run
        } else {
            SkipDecision::skip("git.push is disabled")
        })
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        let branch: String = if ctx.has(keys::BRANCH) {
            ctx.get_as(keys::BRANCH)?
        } else {
            self.services.vcs.current_branch()?
        };
        let tag: Option<String> = if ctx.has(keys::TAG) {
            Some(ctx.get_as(keys::TAG)?)
        } else {
            None
        };
        let remote = ctx.config().git.remote.clone();

        self.services.vcs.push(&remote, &branch, tag.as_deref())?;
        info!("Pushed {} to {}", branch, remote);
        ctx.set(keys::PUSHED, true)
    }

    fn is_irreversible(&self, ctx: &ExecutionContext) -> bool {
        !ctx.config().dry_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleaseConfig;
    use crate::error::ErrorCode;
    use crate::services::{MockFileSystem, MockVcs};

    fn services(vcs: Arc<MockVcs>) -> Arc<Services> {
        Arc::new(Services::new(Arc::new(MockFileSystem::new()), vcs))
    }

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(ReleaseConfig::default());
        ctx.set(keys::NEXT_VERSION, "1.3.0").unwrap();
        ctx
    }

    #[test]
    fn commit_stages_changed_files() {
        let vcs = Arc::new(MockVcs::new());
        let task = CommitRelease::new(TaskSpec::new("commit", "Commit"), services(Arc::clone(&vcs)));
        let mut ctx = ctx();
        ctx.set(keys::CHANGED_FILES, vec!["Cargo.toml", "CHANGELOG.md"])
            .unwrap();

        assert!(!task.should_execute(&ctx).unwrap().is_skip());
        task.execute(&mut TaskContext::new(&mut ctx)).unwrap();

        assert_eq!(
            vcs.calls(),
            vec![
                "stage Cargo.toml CHANGELOG.md",
                "commit chore(release): 1.3.0"
            ]
        );
        assert!(ctx.has(keys::COMMIT_SHA));

        task.undo(&mut TaskContext::new(&mut ctx)).unwrap();
        assert_eq!(vcs.calls().last().unwrap(), "reset HEAD~1");
    }

    #[test]
    fn commit_skipped_without_changes() {
        let task = CommitRelease::new(
            TaskSpec::new("commit", "Commit"),
            services(Arc::new(MockVcs::new())),
        );
        let decision = task.should_execute(&ctx()).unwrap();
        assert_eq!(decision, SkipDecision::skip("no files changed"));
    }

    #[test]
    fn commit_undo_without_commit_does_nothing() {
        let vcs = Arc::new(MockVcs::new());
        let task = CommitRelease::new(TaskSpec::new("commit", "Commit"), services(Arc::clone(&vcs)));
        task.undo(&mut TaskContext::new(&mut ctx())).unwrap();
        assert!(vcs.calls().is_empty());
    }

    #[test]
    fn tag_and_undo() {
        let vcs = Arc::new(MockVcs::new());
        let task = CreateTag::new(TaskSpec::new("tag", "Tag"), services(Arc::clone(&vcs)));
        let mut ctx = ctx();

        task.execute(&mut TaskContext::new(&mut ctx)).unwrap();
        assert_eq!(vcs.tags(), vec!["v1.3.0"]);

        task.undo(&mut TaskContext::new(&mut ctx)).unwrap();
        assert!(vcs.tags().is_empty());
    }

    #[test]
    fn existing_tag_is_conflict() {
        let vcs = Arc::new(MockVcs::new().with_tag("v1.3.0"));
        let task = CreateTag::new(TaskSpec::new("tag", "Tag"), services(vcs));
        let err = task.execute(&mut TaskContext::new(&mut ctx())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[test]
    fn push_uses_recorded_branch_and_tag() {
        let vcs = Arc::new(MockVcs::new());
        let task = PushRelease::new(TaskSpec::new("push", "Push"), services(Arc::clone(&vcs)));
        let mut ctx = ctx();
        ctx.set(keys::BRANCH, "release/1.x").unwrap();
        ctx.set(keys::TAG, "v1.3.0").unwrap();

        task.execute(&mut TaskContext::new(&mut ctx)).unwrap();

        assert_eq!(vcs.calls(), vec!["push origin release/1.x v1.3.0"]);
        assert!(!task.supports_undo());
    }

    #[test]
    fn push_is_irreversible_unless_dry_run() {
        let task = PushRelease::new(
            TaskSpec::new("push", "Push"),
            services(Arc::new(MockVcs::new())),
        );
        assert!(task.is_irreversible(&ctx()));

        let mut config = ReleaseConfig::default();
        config.dry_run = true;
        assert!(!task.is_irreversible(&ExecutionContext::new(config)));
    }
}
