// # Archive Workspace
//
// Scoped owner of the ephemeral working copy directory.
//
// The directory is created empty at the start of a run and either deleted
// or handed to the operator at the end, depending on the commit mode. If
// the workspace is dropped without `release()` (panic, early return) the
// directory is deleted.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::snapshot::CommitMode;

/// Prefix for working copy directories
const WORKDIR_PREFIX: &str = "cfsync-";

/// Exclusively owned, temporary working copy directory
#[derive(Debug)]
pub struct ArchiveWorkspace {
    dir: TempDir,
}

impl ArchiveWorkspace {
    /// Create an empty working directory
    ///
    /// # Parameters
    ///
    /// - `parent`: Directory to create it in; the system temp dir if `None`
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKDIR_PREFIX);

        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        debug!("Created working directory {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Path of the working directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// End of run: delete the directory, or keep it when commits are disabled
    ///
    /// # Returns
    ///
    /// The retained path for [`CommitMode::Disabled`], `None` otherwise.
    pub fn release(self, mode: CommitMode) -> Result<Option<PathBuf>> {
        match mode {
            CommitMode::Disabled => {
                let path = self.dir.keep();
                info!("Commit disabled. Changes prepared in {}.", path.display());
                Ok(Some(path))
            }
            CommitMode::Enabled => {
                let path = self.dir.path().to_path_buf();
                if let Err(e) = self.dir.close() {
                    warn!("Failed to remove working directory {}: {}", path.display(), e);
                    return Err(e.into());
                }
                debug!("Removed working directory {}", path.display());
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_enabled_deletes() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = ArchiveWorkspace::create(Some(parent.path())).unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("example.com"), "{}").unwrap();

        assert_eq!(workspace.release(CommitMode::Enabled).unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_release_disabled_keeps() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = ArchiveWorkspace::create(Some(parent.path())).unwrap();
        let path = workspace.path().to_path_buf();

        let kept = workspace.release(CommitMode::Disabled).unwrap();
        assert_eq!(kept.as_deref(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_drop_deletes() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let workspace = ArchiveWorkspace::create(Some(parent.path())).unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_prefix() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = ArchiveWorkspace::create(Some(parent.path())).unwrap();
        let name = workspace.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(WORKDIR_PREFIX));
    }
}
