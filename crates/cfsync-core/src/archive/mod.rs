// # Archive Implementations
//
// The git-backed ArchiveRepository and the scoped working directory it
// lives in for the duration of one run.

pub mod git;
pub mod workspace;

pub use git::GitArchive;
pub use workspace::ArchiveWorkspace;
