//! Project-rooted filesystem access.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, ShipwrightError};

/// File operations the release tasks need.
///
/// Paths are relative to the project root.
pub trait FileSystem: Send + Sync {
    /// The directory relative paths resolve against.
    fn root(&self) -> &Path;

    fn exists(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    fn remove(&self, path: &Path) -> Result<()>;
}

/// The real filesystem, rooted at a project directory.
///
/// In dry-run mode writes and removals are logged and not performed.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    dry_run: bool,
}

impl LocalFileSystem {
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

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> ShipwrightError {
    ShipwrightError::from(err)
        .context(format!("{} {}", action, path.display()))
        .in_component("fs")
}

impl FileSystem for LocalFileSystem {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path);
        fs::read_to_string(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ShipwrightError::not_found(format!("File not found: {}", path.display()))
                    .in_component("fs")
            } else {
                io_error("reading", path, e)
            }
        })
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] would write {}", path.display());
            return Ok(());
        }
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("creating", parent, e))?;
        }
        debug!("Writing {}", full.display());
        fs::write(&full, contents).map_err(|e| io_error("writing", path, e))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] would remove {}", path.display());
            return Ok(());
        }
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("removing", path, e)),
        }
    }
}
