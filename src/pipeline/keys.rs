//! Execution data keys shared by the release tasks.

/// Version read from the first manifest (string).
pub const CURRENT_VERSION: &str = "version.current";
/// Version the run releases (string).
pub const NEXT_VERSION: &str = "version.next";
/// Bump that produced the next version (string).
pub const BUMP: &str = "version.bump";

/// Branch checked out when the run started.
pub const BRANCH: &str = "git.branch";
/// Most recent release tag before this run, if any.
pub const PREVIOUS_TAG: &str = "git.previous_tag";
/// Commits since the previous tag, newest first.
pub const COMMITS: &str = "git.commits";
/// Hash of the release commit.
pub const COMMIT_SHA: &str = "git.commit";
/// Tag created by this run.
pub const TAG: &str = "git.tag";
pub const PUSHED: &str = "git.pushed";

/// Original manifest contents keyed by path.
pub const MANIFEST_BACKUPS: &str = "manifest.backups";
/// Changelog contents before this run; `null` when the file did not exist.
pub const CHANGELOG_BACKUP: &str = "changelog.backup";
/// The rendered changelog section for this release.
pub const CHANGELOG_ENTRY: &str = "changelog.entry";

/// Files written by this run, to be committed.
pub const CHANGED_FILES: &str = "release.changed_files";
/// The hosted release created by this run.
pub const HOSTED_RELEASE: &str = "release.hosted";
