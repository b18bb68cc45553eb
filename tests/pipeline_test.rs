//! The built-in release command run against in-memory services.

use std::path::PathBuf;
use std::sync::Arc;

use shipwright::commands::CommandRegistry;
use shipwright::config::{BumpStrategy, ReleaseConfig};
use shipwright::context::ExecutionContext;
use shipwright::runner::{ExecutionReport, MemorySink, Orchestrator, RunState, TaskStatus};
use shipwright::services::{MockFileSystem, MockHost, MockVcs, Services};

const MANIFEST: &str = "[package]\nname = \"widget\"\nversion = \"1.2.3\"\nedition = \"2021\"\n";

struct Fixture {
    fs: Arc<MockFileSystem>,
    vcs: Arc<MockVcs>,
    host: Arc<MockHost>,
    config: ReleaseConfig,
}

impl Fixture {
    fn new() -> Self {
        let mut config = ReleaseConfig::default();
        config.version.manifests = vec![PathBuf::from("Cargo.toml")];
        config.release.enabled = true;
        config.release.repository = Some("acme/widget".to_string());

        Self {
            fs: Arc::new(MockFileSystem::new().with_file("Cargo.toml", MANIFEST)),
            vcs: Arc::new(
                MockVcs::new()
                    .with_tag("v1.2.3")
                    .with_commit("fix(parser): handle empty input")
                    .with_commit("feat(cli): add --json output"),
            ),
            host: Arc::new(MockHost::new()),
            config,
        }
    }

    fn run(&self, command: &str) -> ExecutionReport {
        let services = Arc::new(
            Services::new(self.fs.clone(), self.vcs.clone()).with_host(self.host.clone()),
        );
        let registry = CommandRegistry::builtin();
        let definition = registry.get(command).unwrap();
        assert!(definition.validate(&self.config).is_empty());

        let tasks = definition.tasks(&services);
        let context = ExecutionContext::new(self.config.clone()).with_command(command);
        Orchestrator::silent().run(&tasks, context)
    }
}

#[test]
fn release_runs_every_task() {
    let fixture = Fixture::new();

    let report = fixture.run("release");

    assert!(report.success, "{:?}", report.error);
    assert_eq!(
        report.executed,
        vec![
            "preflight",
            "resolve-version",
            "bump-manifest",
            "changelog",
            "commit",
            "tag",
            "push",
            "publish"
        ]
    );

    let manifest = fixture.fs.contents("Cargo.toml").unwrap();
    assert!(manifest.contains("version = \"1.3.0\""));
    assert!(manifest.contains("name = \"widget\""));

    let changelog = fixture.fs.contents("CHANGELOG.md").unwrap();
    assert!(changelog.starts_with("# Changelog\n\n## [1.3.0] - "));
    assert!(changelog.contains("### Features\n\n- **cli:** add --json output"));
    assert!(changelog.contains("### Bug Fixes\n\n- **parser:** handle empty input"));

    assert_eq!(
        fixture.vcs.calls(),
        vec![
            "stage Cargo.toml CHANGELOG.md",
            "commit chore(release): 1.3.0",
            "tag v1.3.0",
            "push origin main v1.3.0",
        ]
    );

    let releases = fixture.host.releases();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].tag, "v1.3.0");
    assert_eq!(report.data.get("version.bump").unwrap(), "minor");
}

#[test]
fn push_failure_rolls_back_tag_commit_changelog_and_manifest() {
    let fixture = Fixture::new();
    fixture.vcs.fail_on("push");

    let report = fixture.run("release");

    assert_eq!(report.state, RunState::RolledBack);
    assert!(report.is_clean_failure());
    assert_eq!(report.failed, vec!["push"]);
    assert!(report.record("publish").is_none());
    assert_eq!(
        report.rollback.undone,
        vec!["tag", "commit", "changelog", "bump-manifest"]
    );

    assert_eq!(
        fixture.vcs.calls(),
        vec![
            "stage Cargo.toml CHANGELOG.md",
            "commit chore(release): 1.3.0",
            "tag v1.3.0",
            "delete-tag v1.3.0",
            "reset HEAD~1",
        ]
    );
    assert_eq!(fixture.fs.contents("Cargo.toml").unwrap(), MANIFEST);
    assert!(fixture.fs.contents("CHANGELOG.md").is_none());
    assert!(fixture.host.releases().is_empty());
}

#[test]
fn publish_failure_after_push_needs_intervention() {
    let fixture = Fixture::new();
    fixture.host.fail_create();

    let report = fixture.run("release");

    assert_eq!(report.state, RunState::RollbackFailed);
    assert!(!report.is_clean_failure());
    assert!(report.requires_intervention());
    assert_eq!(report.failed, vec!["publish"]);
    // the pushed tag and commit stay, matching the remote
    assert_eq!(report.rollback.undone, vec!["publish"]);
    assert_eq!(report.rollback.blocked_by.as_deref(), Some("push"));
    assert_eq!(
        report.rollback.pending,
        vec!["tag", "commit", "changelog", "bump-manifest"]
    );
    assert_eq!(
        fixture.vcs.calls(),
        vec![
            "stage Cargo.toml CHANGELOG.md",
            "commit chore(release): 1.3.0",
            "tag v1.3.0",
            "push origin main v1.3.0",
        ]
    );
    assert!(fixture
        .fs
        .contents("Cargo.toml")
        .unwrap()
        .contains("version = \"1.3.0\""));
}

#[test]
fn dry_run_push_is_no_barrier() {
    let mut fixture = Fixture::new();
    fixture.config.dry_run = true;
    fixture.host.fail_create();

    let report = fixture.run("release");

    assert_eq!(report.state, RunState::RolledBack);
    assert!(report.is_clean_failure());
    assert!(report.rollback.blocked_by.is_none());
}

#[test]
fn failed_undo_leaves_run_dirty() {
    let fixture = Fixture::new();
    fixture.vcs.fail_on("push");
    fixture.vcs.fail_on("delete-tag");

    let report = fixture.run("release");

    assert_eq!(report.state, RunState::RollbackFailed);
    assert!(report.requires_intervention());
    let failure = report.rollback.failed.as_ref().unwrap();
    assert_eq!(failure.task, "tag");
    assert_eq!(
        report.rollback.pending,
        vec!["commit", "changelog", "bump-manifest"]
    );
    assert!(fixture
        .fs
        .contents("Cargo.toml")
        .unwrap()
        .contains("version = \"1.3.0\""));
}

#[test]
fn unchanged_version_skips_through_to_changelog() {
    let mut fixture = Fixture::new();
    fixture.config.version.bump = BumpStrategy::Keep;
    fixture.config.git.tag = false;
    fixture.config.git.push = false;
    fixture.config.release.enabled = false;

    let report = fixture.run("release");

    assert!(report.success, "{:?}", report.error);
    assert_eq!(
        report.record("resolve-version").unwrap().reason.as_deref(),
        Some("skip to 'changelog'")
    );
    assert_eq!(report.status_of("bump-manifest"), Some(TaskStatus::Skipped));
    assert_eq!(report.status_of("changelog"), Some(TaskStatus::Executed));
    assert_eq!(fixture.fs.contents("Cargo.toml").unwrap(), MANIFEST);
    assert_eq!(
        fixture.vcs.calls(),
        vec!["stage CHANGELOG.md", "commit chore(release): 1.2.3"]
    );
}

#[test]
fn bump_command_only_touches_manifest() {
    let mut fixture = Fixture::new();
    fixture.config.version.bump = BumpStrategy::Major;

    let report = fixture.run("bump");

    assert!(report.success);
    assert_eq!(
        report.executed,
        vec!["preflight", "resolve-version", "bump-manifest"]
    );
    assert!(fixture
        .fs
        .contents("Cargo.toml")
        .unwrap()
        .contains("version = \"2.0.0\""));
    assert!(fixture.vcs.calls().is_empty());
    assert!(fixture.fs.contents("CHANGELOG.md").is_none());
}

#[test]
fn events_describe_the_run() {
    let fixture = Fixture::new();
    fixture.vcs.fail_on("push");
    let services = Arc::new(
        Services::new(fixture.fs.clone(), fixture.vcs.clone()).with_host(fixture.host.clone()),
    );
    let tasks = CommandRegistry::builtin()
        .get("release")
        .unwrap()
        .tasks(&services);
    let sink = MemorySink::new();

    Orchestrator::silent()
        .with_sink(sink.clone())
        .run(&tasks, ExecutionContext::new(fixture.config.clone()));

    let lines = sink.lines();
    assert!(lines.iter().any(|l| l == "[1/8] preflight - Check the repository and manifests"));
    assert!(lines.iter().any(|l| l.starts_with("push failed: ")));
    assert!(lines.iter().any(|l| l == "Rolling back 4 tasks"));
    assert!(lines.iter().any(|l| l == "Undoing tag"));
    assert!(lines.iter().any(|l| l == "Rollback complete (4 undone)"));
}
