//! Changelog rendering and the `changelog` task.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::context::{ExecutionContext, TaskContext};
use crate::error::{Result, ShipwrightError};
use crate::services::{Commit, Services};
use crate::task::{SkipDecision, Task, TaskSpec};

use super::bump::mark_changed;
use super::commits::{ConventionalCommit, Section};
use super::keys;

/// Render the changelog section for `version`.
pub fn render_entry(version: &str, date: NaiveDate, commits: &[Commit]) -> String {
    let mut sections: BTreeMap<Section, Vec<ConventionalCommit>> = BTreeMap::new();
    for commit in commits {
        let parsed = ConventionalCommit::parse(commit);
        if parsed.is_release_commit() {
            continue;
        }
        sections.entry(parsed.section()).or_default().push(parsed);
    }

    let mut out = format!("## [{}] - {}\n", version, date.format("%Y-%m-%d"));
    if sections.is_empty() {
        out.push_str("\nNo notable changes.\n");
        return out;
    }

    for section in Section::ALL {
        let Some(entries) = sections.get(&section) else {
            continue;
        };
        out.push_str(&format!("\n### {}\n\n", section.title()));
        for entry in entries {
            out.push_str("- ");
            if let Some(scope) = &entry.scope {
                out.push_str(&format!("**{}:** ", scope));
            }
            out.push_str(&entry.description);
            out.push_str(&format!(" ({})\n", entry.short_sha));
        }
    }
    out
}

/// Insert `entry` into an existing changelog (below its title) or start a
/// new one.
///
/// Fails with `CONFLICT` when the changelog already has a section for the
/// version.
pub fn insert_entry(existing: Option<&str>, title: &str, version: &str, entry: &str) -> Result<String> {
    let Some(existing) = existing.filter(|e| !e.trim().is_empty()) else {
        return Ok(format!("{}\n\n{}", title, entry));
    };

    let heading = format!("## [{}]", version);
    if existing.lines().any(|l| l.starts_with(&heading)) {
        return Err(ShipwrightError::conflict(format!(
            "changelog already has an entry for {}",
            version
        ))
        .in_component("changelog"));
    }

    let mut lines = existing.lines();
    match lines.next() {
        Some(first) if first.trim() == title.trim() => {
            let rest: Vec<&str> = lines.skip_while(|l| l.trim().is_empty()).collect();
            let mut out = format!("{}\n\n{}", first, entry);
            if !rest.is_empty() {
                out.push('\n');
                out.push_str(&rest.join("\n"));
                out.push('\n');
            }
            Ok(out)
        }
        _ => Ok(format!("{}\n{}", entry, existing)),
    }
}

/// Writes the release's section into the changelog file.
///
/// The previous file contents are kept so undo can restore them, or remove
/// a file this run created.
pub struct UpdateChangelog {
    spec: TaskSpec,
    services: Arc<Services>,
}

impl UpdateChangelog {
    pub fn new(spec: TaskSpec, services: Arc<Services>) -> Self {
        Self { spec, services }
    }
}

impl Task for UpdateChangelog {
    fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn should_execute(&self, ctx: &ExecutionContext) -> Result<SkipDecision> {
        Ok(if ctx.config().changelog.enabled {
            SkipDecision::Run
        } else {
            SkipDecision::skip("changelog disabled")
        })
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        let config = ctx.config().changelog.clone();
        let version: String = ctx.get_as(keys::NEXT_VERSION)?;
        let commits: Vec<Commit> = if ctx.has(keys::COMMITS) {
            ctx.get_as(keys::COMMITS)?
        } else {
            Vec::new()
        };

        let entry = render_entry(&version, Utc::now().date_naive(), &commits);
        let existing = if self.services.fs.exists(&config.path) {
            Some(self.services.fs.read_to_string(&config.path)?)
        } else {
            None
        };
        let updated = insert_entry(existing.as_deref(), &config.title, &version, &entry)?;

        ctx.set(keys::CHANGELOG_BACKUP, &existing)?;
        ctx.set(keys::CHANGELOG_ENTRY, &entry)?;

        self.services.fs.write(&config.path, &updated)?;
        mark_changed(ctx, &config.path)?;
        info!("Updated {} for {}", config.path.display(), version);
        Ok(())
    }

    fn supports_undo(&self) -> bool {
        true
    }

    fn undo(&self, ctx: &mut TaskContext<'_>) -> Result<()> {
        if !ctx.has(keys::CHANGELOG_BACKUP) {
            return Ok(());
        }
        let path = ctx.config().changelog.path.clone();
        let backup: Option<String> = ctx.get_as(keys::CHANGELOG_BACKUP)?;
        match backup {
            Some(original) => {
                debug!("Restoring {}", path.display());
                self.services.fs.write(&path, &original)?;
            }
            None => {
                debug!("Removing {}", path.display());
                self.services.fs.remove(&path)?;
            }
        }
        ctx.remove(keys::CHANGELOG_BACKUP);
        Ok(())
    }
}
