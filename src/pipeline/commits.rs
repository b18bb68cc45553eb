//! Conventional commit parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::services::Commit;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<kind>[A-Za-z]+)(?:\((?P<scope>[^()]*)\))?(?P<bang>!)?:\s+(?P<desc>.+)$")
        .unwrap()
});

static BREAKING_FOOTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^BREAKING[ -]CHANGE:\s*(?P<note>.*)$").unwrap());

/// Changelog section a commit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Breaking,
    Features,
    Fixes,
    Performance,
    Other,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Breaking,
        Section::Features,
        Section::Fixes,
        Section::Performance,
        Section::Other,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Breaking => "Breaking Changes",
            Section::Features => "Features",
            Section::Fixes => "Bug Fixes",
            Section::Performance => "Performance",
            Section::Other => "Other Changes",
        }
    }
}

/// A commit message split into its conventional parts.
///
/// Messages that do not follow the convention keep their subject as the
/// description and have no kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
    pub kind: Option<String>,
    pub scope: Option<String>,
    pub breaking: bool,
    pub description: String,
    pub short_sha: String,
}

impl ConventionalCommit {
    pub fn parse(commit: &Commit) -> Self {
        let breaking_footer = BREAKING_FOOTER.is_match(&commit.body);
        let short_sha = commit.short_sha().to_string();

        match HEADER.captures(commit.subject.trim()) {
            Some(caps) => Self {
                kind: Some(caps["kind"].to_lowercase()),
                scope: caps
                    .name("scope")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty()),
                breaking: caps.name("bang").is_some() || breaking_footer,
                description: caps["desc"].trim().to_string(),
                short_sha,
            },
            None => Self {
                kind: None,
                scope: None,
                breaking: breaking_footer,
                description: commit.subject.trim().to_string(),
                short_sha,
            },
        }
    }

    pub fn is_feature(&self) -> bool {
        self.kind.as_deref() == Some("feat")
    }

    pub fn section(&self) -> Section {
        if self.breaking {
            return Section::Breaking;
        }
        match self.kind.as_deref() {
            Some("feat") => Section::Features,
            Some("fix") => Section::Fixes,
            Some("perf") => Section::Performance,
            _ => Section::Other,
        }
    }

    /// Commits produced by earlier releases.
    pub fn is_release_commit(&self) -> bool {
        self.kind.as_deref() == Some("chore") && self.scope.as_deref() == Some("release")
    }
}
