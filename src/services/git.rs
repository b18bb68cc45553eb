//! Version control through the `git` binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ShipwrightError};

use super::process::{self, CommandOptions, CommandResult};

/// One commit as seen by the changelog and version inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub subject: String,
    pub body: String,
}

impl Commit {
    pub fn new(sha: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// First seven characters of the hash.
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

/// Repository operations used by the release pipeline.
pub trait VersionControl: Send + Sync {
    fn is_repository(&self) -> bool;

    /// No staged, unstaged or untracked changes.
    fn is_clean(&self) -> Result<bool>;

    /// Paths with uncommitted changes, as reported by `git status`.
    fn changed_files(&self) -> Result<Vec<String>>;

    fn current_branch(&self) -> Result<String>;

    /// Most recent tag reachable from HEAD whose name starts with `prefix`.
    fn latest_tag(&self, prefix: &str) -> Result<Option<String>>;

    /// Commits after `tag` (or all commits when `None`), newest first.
    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<Commit>>;

    fn stage(&self, paths: &[PathBuf]) -> Result<()>;

    /// Commit the staged changes and return the new commit's hash.
    fn commit(&self, message: &str) -> Result<String>;

    /// Drop the last commit, keeping its changes in the working tree.
    fn reset_last_commit(&self) -> Result<()>;

    fn tag_exists(&self, name: &str) -> Result<bool>;

    fn create_tag(&self, name: &str, message: &str) -> Result<()>;

    fn delete_tag(&self, name: &str) -> Result<()>;

    /// Push `branch` and `tag` to `remote`.
    fn push(&self, remote: &str, branch: &str, tag: Option<&str>) -> Result<()>;
}

// Field and record separators for `git log` output.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// [`VersionControl`] backed by the `git` command line.
///
/// Mutating commands are logged and skipped in dry-run mode.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    dry_run: bool,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn options(&self) -> CommandOptions {
        CommandOptions {
            cwd: Some(self.root.clone()),
            ..Default::default()
        }
    }

    fn run(&self, args: &[&str]) -> Result<CommandResult> {
        process::execute("git", args, &self.options()).map_err(|e| e.in_component("git"))
    }

    /// Run and require a zero exit.
    fn git(&self, args: &[&str]) -> Result<String> {
        let result = self.run(args)?;
        let line = process::render("git", args);
        result
            .check(&line)
            .map(|r| r.output().to_string())
            .map_err(|e| e.in_component("git"))
    }

    /// Run a mutating command, unless in dry-run mode.
    fn git_mut(&self, args: &[&str]) -> Result<String> {
        if self.dry_run {
            info!("[dry-run] {}", process::render("git", args));
            return Ok(String::new());
        }
        self.git(args)
    }

    fn has_head(&self) -> bool {
        self.run(&["rev-parse", "--verify", "--quiet", "HEAD"])
            .map(|r| r.success)
            .unwrap_or(false)
    }
}

impl VersionControl for GitCli {
    fn is_repository(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"])
            .map(|r| r.success && r.output() == "true")
            .unwrap_or(false)
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.changed_files()?.is_empty())
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        let status = self.run(&["status", "--porcelain", "-z"])?;
        let status = status.check("git status --porcelain -z")?;
        Ok(parse_status(&status.stdout))
    }

    fn current_branch(&self) -> Result<String> {
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch == "HEAD" {
            return Err(ShipwrightError::conflict(
                "HEAD is detached; check out a branch before releasing",
            )
            .in_component("git"));
        }
        Ok(branch)
    }

    fn latest_tag(&self, prefix: &str) -> Result<Option<String>> {
        if !self.has_head() {
            return Ok(None);
        }
        let pattern = format!("{}*", prefix);
        let result = self.run(&["describe", "--tags", "--abbrev=0", "--match", &pattern])?;
        // describe exits non-zero when nothing matches
        Ok(result
            .success
            .then(|| result.output().to_string())
            .filter(|t| !t.is_empty()))
    }

    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<Commit>> {
        if !self.has_head() {
            return Ok(Vec::new());
        }
        let format = format!("--format=%H{f}%s{f}%b{r}", f = FIELD_SEP, r = RECORD_SEP);
        let range = tag.map(|t| format!("{}..HEAD", t));
        let mut args = vec!["log", format.as_str()];
        if let Some(range) = &range {
            args.push(range.as_str());
        }
        let log = self.run(&args)?.check("git log")?;
        Ok(parse_log(&log.stdout))
    }

    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let rendered: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let mut args = vec!["add", "--"];
        args.extend(rendered.iter().map(String::as_str));
        self.git_mut(&args).map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<String> {
        if self.dry_run {
            info!("[dry-run] git commit -m {:?}", message);
            return Ok("0000000".to_string());
        }
        self.git(&["commit", "-m", message])?;
        self.git(&["rev-parse", "HEAD"])
    }

    fn reset_last_commit(&self) -> Result<()> {
        self.git_mut(&["reset", "--mixed", "HEAD~1"]).map(|_| ())
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        let tag_ref = format!("refs/tags/{}", name);
        Ok(self
            .run(&["rev-parse", "--verify", "--quiet", &tag_ref])?
            .success)
    }

    fn create_tag(&self, name: &str, message: &str) -> Result<()> {
        self.git_mut(&["tag", "-a", name, "-m", message]).map(|_| ())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.git_mut(&["tag", "-d", name]).map(|_| ())
    }

    fn push(&self, remote: &str, branch: &str, tag: Option<&str>) -> Result<()> {
        let mut args = vec!["push", "--atomic", remote, branch];
        if let Some(tag) = tag {
            args.push(tag);
        }
        self.git_mut(&args).map(|_| ())
    }
}

fn parse_log(output: &str) -> Vec<Commit> {
    output
        .split(RECORD_SEP)
        .filter_map(|record| {
            let record = record.trim_start_matches('\n');
            if record.trim().is_empty() {
                return None;
            }
            let mut fields = record.splitn(3, FIELD_SEP);
            let sha = fields.next()?.trim();
            let subject = fields.next().unwrap_or_default().trim();
            let body = fields.next().unwrap_or_default().trim();
            Some(Commit::new(sha, subject, body))
        })
        .collect()
}

/// Paths from `git status --porcelain -z` output, unquoted. Renames and
/// copies yield their new path.
fn parse_status(output: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut entries = output.split('\0');
    while let Some(entry) = entries.next() {
        if entry.len() < 4 {
            continue;
        }
        let (code, path) = entry.split_at(3);
        if code.starts_with(['R', 'C']) {
            // source path of the rename
            entries.next();
        }
        paths.push(path.to_string());
    }
    paths
}
