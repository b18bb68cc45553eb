//! In-memory providers for testing.
//!
//! Each mock records what was done to it so tests can assert on the
//! sequence of operations, and can be told to fail specific operations.
//!
//! # Example
//!
//! ```
//! use shipwright::services::{MockVcs, VersionControl};
//!
//! let vcs = MockVcs::new().with_tag("v1.0.0").with_commit("feat: add export");
//! vcs.create_tag("v1.1.0", "Release 1.1.0").unwrap();
//!
//! assert_eq!(vcs.latest_tag("v").unwrap().as_deref(), Some("v1.1.0"));
//! assert!(vcs.calls().contains(&"tag v1.1.0".to_string()));
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::Provider;
use crate::error::{Result, ShipwrightError};

use super::fs::FileSystem;
use super::git::{Commit, VersionControl};
use super::host::{HostedRelease, ReleaseHost, ReleaseRequest};

fn injected(op: &str) -> ShipwrightError {
    ShipwrightError::failed(format!("{} failed (injected)", op)).in_component("mock")
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Files held in a map keyed by relative path.
#[derive(Debug, Default)]
pub struct MockFileSystem {
    root: PathBuf,
    files: Mutex<BTreeMap<PathBuf, String>>,
    failing_writes: Mutex<HashSet<PathBuf>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/project"),
            ..Default::default()
        }
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        lock(&self.files).insert(path.into(), contents.into());
        self
    }

    /// Make every write to `path` fail.
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        lock(&self.failing_writes).insert(path.into());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.files).get(path.as_ref()).cloned()
    }
}

impl FileSystem for MockFileSystem {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.contents(path).ok_or_else(|| {
            ShipwrightError::not_found(format!("File not found: {}", path.display()))
                .in_component("fs")
        })
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if lock(&self.failing_writes).contains(path) {
            return Err(injected(&format!("write {}", path.display())));
        }
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        lock(&self.files).remove(path);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct VcsState {
    dirty: Vec<String>,
    branch: String,
    tags: Vec<String>,
    commits: Vec<Commit>,
    staged: Vec<PathBuf>,
    calls: Vec<String>,
    failing: HashSet<String>,
    next_sha: u32,
}

/// A repository that lives in memory.
///
/// Operations append a short description to [`MockVcs::calls`]
/// (`"commit chore: x"`, `"tag v1.0.0"`, `"push origin main v1.0.0"`).
/// Names passed to [`MockVcs::fail_on`] are the first word of those
/// descriptions.
#[derive(Debug)]
pub struct MockVcs {
    state: Mutex<VcsState>,
}

impl Default for MockVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVcs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VcsState {
                branch: "main".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        lock(&self.state).tags.push(tag.into());
        self
    }

    /// Add a commit on top of the history.
    pub fn with_commit(self, subject: impl Into<String>) -> Self {
        self.add_commit(subject, "");
        self
    }

    pub fn with_dirty_file(self, path: impl Into<String>) -> Self {
        lock(&self.state).dirty.push(path.into());
        self
    }

    pub fn add_commit(&self, subject: impl Into<String>, body: impl Into<String>) {
        let mut state = lock(&self.state);
        state.next_sha += 1;
        let sha = format!("{:040x}", state.next_sha);
        state.commits.insert(0, Commit::new(sha, subject, body));
    }

    /// Make the named operation fail.
    pub fn fail_on(&self, op: &str) {
        lock(&self.state).failing.insert(op.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn tags(&self) -> Vec<String> {
        lock(&self.state).tags.clone()
    }

    pub fn commits(&self) -> Vec<Commit> {
        lock(&self.state).commits.clone()
    }

    fn record(&self, op: &str, call: String) -> Result<()> {
        let mut state = lock(&self.state);
        if state.failing.contains(op) {
            return Err(injected(op));
        }
        state.calls.push(call);
        Ok(())
    }
}

impl VersionControl for MockVcs {
    fn is_repository(&self) -> bool {
        true
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(lock(&self.state).dirty.is_empty())
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        let state = lock(&self.state);
        let mut files = state.dirty.clone();
        files.extend(state.staged.iter().map(|p| p.display().to_string()));
        Ok(files)
    }

    fn current_branch(&self) -> Result<String> {
        Ok(lock(&self.state).branch.clone())
    }

    fn latest_tag(&self, prefix: &str) -> Result<Option<String>> {
        Ok(lock(&self.state)
            .tags
            .iter()
            .rev()
            .find(|t| t.starts_with(prefix))
            .cloned())
    }

    fn commits_since(&self, _tag: Option<&str>) -> Result<Vec<Commit>> {
        Ok(lock(&self.state).commits.clone())
    }

    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        let rendered: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        self.record("stage", format!("stage {}", rendered.join(" ")))?;
        lock(&self.state).staged.extend(paths.iter().cloned());
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        self.record("commit", format!("commit {}", message))?;
        let mut state = lock(&self.state);
        state.staged.clear();
        state.dirty.clear();
        state.next_sha += 1;
        let sha = format!("{:040x}", state.next_sha);
        Ok(sha)
    }

    fn reset_last_commit(&self) -> Result<()> {
        self.record("reset", "reset HEAD~1".to_string())
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(lock(&self.state).tags.iter().any(|t| t == name))
    }

    fn create_tag(&self, name: &str, _message: &str) -> Result<()> {
        self.record("tag", format!("tag {}", name))?;
        lock(&self.state).tags.push(name.to_string());
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.record("delete-tag", format!("delete-tag {}", name))?;
        lock(&self.state).tags.retain(|t| t != name);
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str, tag: Option<&str>) -> Result<()> {
        let call = match tag {
            Some(tag) => format!("push {} {} {}", remote, branch, tag),
            None => format!("push {} {}", remote, branch),
        };
        self.record("push", call)
    }
}

/// A release host that keeps releases in memory.
#[derive(Debug, Default)]
pub struct MockHost {
    releases: Mutex<Vec<HostedRelease>>,
    fail_create: Mutex<bool>,
    fail_delete: Mutex<bool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self) {
        *lock(&self.fail_create) = true;
    }

    pub fn fail_delete(&self) {
        *lock(&self.fail_delete) = true;
    }

    pub fn releases(&self) -> Vec<HostedRelease> {
        lock(&self.releases).clone()
    }
}

impl ReleaseHost for MockHost {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn create_release(&self, request: &ReleaseRequest) -> Result<HostedRelease> {
        if *lock(&self.fail_create) {
            return Err(injected("create release"));
        }
        let mut releases = lock(&self.releases);
        let release = HostedRelease {
            id: (releases.len() + 1).to_string(),
            tag: request.tag.clone(),
            url: format!("https://example.test/releases/{}", request.tag),
        };
        releases.push(release.clone());
        Ok(release)
    }

    fn find_release(&self, tag: &str) -> Result<Option<HostedRelease>> {
        Ok(lock(&self.releases).iter().find(|r| r.tag == tag).cloned())
    }

    fn delete_release(&self, release: &HostedRelease) -> Result<()> {
        if *lock(&self.fail_delete) {
            return Err(injected("delete release"));
        }
        lock(&self.releases).retain(|r| r.id != release.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_round_trip() {
        let fs = MockFileSystem::new().with_file("VERSION", "1.0.0\n");
        assert!(fs.exists(Path::new("VERSION")));
        fs.write(Path::new("VERSION"), "1.1.0\n").unwrap();
        assert_eq!(fs.contents("VERSION").as_deref(), Some("1.1.0\n"));
        fs.remove(Path::new("VERSION")).unwrap();
        assert!(!fs.exists(Path::new("VERSION")));
    }

    #[test]
    fn mock_vcs_records_calls_and_fails_on_demand() {
        let vcs = MockVcs::new();
        vcs.commit("chore(release): 1.0.0").unwrap();
        vcs.fail_on("push");
        assert!(vcs.push("origin", "main", Some("v1.0.0")).is_err());
        assert_eq!(vcs.calls(), vec!["commit chore(release): 1.0.0"]);
    }

    #[test]
    fn mock_vcs_commits_are_newest_first() {
        let vcs = MockVcs::new().with_commit("first").with_commit("second");
        let commits = vcs.commits_since(None).unwrap();
        assert_eq!(commits[0].subject, "second");
        assert_eq!(commits[1].subject, "first");
    }

    #[test]
    fn mock_host_create_and_delete() {
        let host = MockHost::new();
        let release = host
            .create_release(&ReleaseRequest {
                tag: "v1.0.0".to_string(),
                name: "v1.0.0".to_string(),
                body: String::new(),
                draft: false,
                prerelease: false,
            })
            .unwrap();
        assert_eq!(host.find_release("v1.0.0").unwrap(), Some(release.clone()));
        host.delete_release(&release).unwrap();
        assert!(host.releases().is_empty());
    }
}
