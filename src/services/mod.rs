//! Capability providers used by the release tasks.
//!
//! [`Services`] is built once per process and shared by `Arc` with the task
//! factories. Every provider sits behind a trait so tests can swap in the
//! in-memory versions from [`mock`].

pub mod fs;
pub mod git;
pub mod host;
pub mod manifest;
pub mod mock;
pub mod process;

use std::path::Path;
use std::sync::Arc;

use crate::config::ReleaseConfig;
use crate::error::{Result, ShipwrightError};

pub use fs::{FileSystem, LocalFileSystem};
pub use git::{Commit, GitCli, VersionControl};
pub use host::{GitHubClient, GitLabClient, HostedRelease, ReleaseHost, ReleaseRequest};
pub use manifest::ManifestKind;
pub use mock::{MockFileSystem, MockHost, MockVcs};

/// The capability container handed to task factories.
#[derive(Clone)]
pub struct Services {
    pub fs: Arc<dyn FileSystem>,
    pub vcs: Arc<dyn VersionControl>,
    pub host: Option<Arc<dyn ReleaseHost>>,
}

impl Services {
    pub fn new(fs: Arc<dyn FileSystem>, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            fs,
            vcs,
            host: None,
        }
    }

    pub fn with_host(mut self, host: Arc<dyn ReleaseHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Real providers for the project at `root`.
    ///
    /// The hosting client is only built when hosted releases are enabled.
    pub fn local(root: &Path, config: &ReleaseConfig) -> Result<Self> {
        let fs = LocalFileSystem::new(root).dry_run(config.dry_run);
        let vcs = GitCli::new(root).dry_run(config.dry_run);
        let mut services = Self::new(Arc::new(fs), Arc::new(vcs));
        if config.release.enabled {
            services.host = Some(Arc::from(host::client_for(&config.release, config.dry_run)?));
        }
        Ok(services)
    }

    /// The hosting client, or `NOT_FOUND` when none is configured.
    pub fn host(&self) -> Result<&dyn ReleaseHost> {
        self.host.as_deref().ok_or_else(|| {
            ShipwrightError::not_found("no release host is configured").in_component("host")
        })
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("root", &self.fs.root())
            .field("host", &self.host.as_ref().map(|h| h.provider()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn host_is_optional() {
        let services = Services::new(Arc::new(MockFileSystem::new()), Arc::new(MockVcs::new()));
        assert_eq!(services.host().err().unwrap().code(), ErrorCode::NotFound);

        let services = services.with_host(Arc::new(MockHost::new()));
        assert!(services.host().is_ok());
    }

    #[test]
    fn local_without_release_has_no_host() {
        let temp = tempfile::TempDir::new().unwrap();
        let services = Services::local(temp.path(), &ReleaseConfig::default()).unwrap();
        assert!(services.host.is_none());
        assert_eq!(services.fs.root(), temp.path());
    }
}
