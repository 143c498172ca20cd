// # Archive Repository Trait
//
// Defines the interface the snapshot archiver needs from the
// version-controlled working copy.
//
// ## Purpose
//
// The archiver never diffs file contents itself. It writes every zone
// file unconditionally and then asks the repository whether the path
// differs from the last commit. Content hashing stays with the VCS.
//
// ## Implementations
//
// - git (libgit2): `archive::GitArchive`

use std::path::{Path, PathBuf};

/// Identifier of a created commit (hex object id for git)
pub type CommitId = String;

/// Trait for archive repository implementations
///
/// All paths passed to and returned from this trait are relative to
/// [`ArchiveRepository::workdir`].
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Read and write the working copy and its index
/// - ✅ Create commits and push them to the configured remote
///
/// ## Forbidden Capabilities
/// - ❌ Decide whether a commit is needed (owned by `SnapshotArchiver`)
/// - ❌ Delete the working copy (owned by `ArchiveWorkspace`)
pub trait ArchiveRepository: Send + Sync {
    /// Root of the working copy
    fn workdir(&self) -> &Path;

    /// Whether the working tree version of `path` differs from the last commit
    ///
    /// Untracked paths count as modified.
    fn is_modified(&self, path: &Path) -> Result<bool, crate::Error>;

    /// Stage the current working tree content of `path`
    fn stage(&self, path: &Path) -> Result<(), crate::Error>;

    /// Stage the removal of `path` and delete it from the working tree
    fn stage_removal(&self, path: &Path) -> Result<(), crate::Error>;

    /// Tracked files at the top level of the working copy
    fn tracked_files(&self) -> Result<Vec<PathBuf>, crate::Error>;

    /// Create a single commit from everything staged
    fn commit(&self, message: &str) -> Result<CommitId, crate::Error>;

    /// Push the current branch to the remote it was cloned from
    fn push(&self) -> Result<(), crate::Error>;
}
