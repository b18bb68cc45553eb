//! Release task bodies and the graphs the built-in commands run.
//!
//! | id | depends on | skipped when | undo |
//! |----|------------|--------------|------|
//! | `preflight` | | never | |
//! | `resolve-version` | `preflight` | never | |
//! | `bump-manifest` | `resolve-version` | version unchanged | restore manifests |
//! | `changelog` | `resolve-version` | changelog disabled | restore or remove file |
//! | `commit` | `bump-manifest`, `changelog` | commits disabled, nothing changed | reset the commit |
//! | `tag` | `commit` | tags disabled | delete the tag |
//! | `push` | `tag` | pushes disabled | |
//! | `publish` | `push` | hosted releases disabled | delete the release |
//!
//! In `release`, an unchanged version makes `resolve-version` skip through
//! to `changelog`.

pub mod bump;
pub mod changelog;
pub mod commits;
pub mod git;
pub mod keys;
pub mod preflight;
pub mod publish;
pub mod version;

use std::sync::Arc;

use crate::services::Services;
use crate::task::{Task, TaskRef, TaskSpec};

pub use bump::BumpManifest;
pub use changelog::UpdateChangelog;
pub use git::{CommitRelease, CreateTag, PushRelease};
pub use preflight::Preflight;
pub use publish::PublishRelease;
pub use version::ResolveVersion;

pub const PREFLIGHT: &str = "preflight";
pub const RESOLVE_VERSION: &str = "resolve-version";
pub const BUMP_MANIFEST: &str = "bump-manifest";
pub const CHANGELOG: &str = "changelog";
pub const COMMIT: &str = "commit";
pub const TAG: &str = "tag";
pub const PUSH: &str = "push";
pub const PUBLISH: &str = "publish";

fn shared(task: impl Task + 'static) -> TaskRef {
    Arc::new(task)
}

fn preflight(services: &Arc<Services>) -> TaskRef {
    shared(Preflight::new(
        TaskSpec::new(PREFLIGHT, "Check the repository and manifests"),
        Arc::clone(services),
    ))
}

fn bump_manifest(services: &Arc<Services>) -> TaskRef {
    shared(BumpManifest::new(
        TaskSpec::new(BUMP_MANIFEST, "Write the new version into the manifests")
            .depends_on([RESOLVE_VERSION]),
        Arc::clone(services),
    ))
}

fn resolve_version_spec() -> TaskSpec {
    TaskSpec::new(RESOLVE_VERSION, "Work out the next version")
}

/// Every task of a full release.
pub fn release_tasks(services: &Arc<Services>) -> Vec<TaskRef> {
    vec![
        preflight(services),
        shared(
            ResolveVersion::new(
                resolve_version_spec().depends_on([PREFLIGHT]),
                Arc::clone(services),
            )
            .skip_to_when_unchanged(CHANGELOG),
        ),
        bump_manifest(services),
        shared(UpdateChangelog::new(
            TaskSpec::new(CHANGELOG, "Add the release to the changelog").depends_on([RESOLVE_VERSION]),
            Arc::clone(services),
        )),
        shared(CommitRelease::new(
            TaskSpec::new(COMMIT, "Commit the release changes").depends_on([BUMP_MANIFEST, CHANGELOG]),
            Arc::clone(services),
        )),
        shared(CreateTag::new(
            TaskSpec::new(TAG, "Create the release tag").depends_on([COMMIT]),
            Arc::clone(services),
        )),
        shared(PushRelease::new(
            TaskSpec::new(PUSH, "Push the branch and tag").depends_on([TAG]),
            Arc::clone(services),
        )),
        shared(PublishRelease::new(
            TaskSpec::new(PUBLISH, "Publish the hosted release").depends_on([PUSH]),
            Arc::clone(services),
        )),
    ]
}

/// Version bump only: no changelog, commit or tag.
pub fn bump_tasks(services: &Arc<Services>) -> Vec<TaskRef> {
    vec![
        preflight(services),
        shared(ResolveVersion::new(
            resolve_version_spec().depends_on([PREFLIGHT]),
            Arc::clone(services),
        )),
        bump_manifest(services),
    ]
}

/// Changelog only.
pub fn changelog_tasks(services: &Arc<Services>) -> Vec<TaskRef> {
    vec![
        shared(ResolveVersion::new(resolve_version_spec(), Arc::clone(services))),
        shared(UpdateChangelog::new(
            TaskSpec::new(CHANGELOG, "Add the release to the changelog").depends_on([RESOLVE_VERSION]),
            Arc::clone(services),
        )),
    ]
}
