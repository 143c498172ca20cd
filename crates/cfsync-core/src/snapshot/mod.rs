//! Snapshot archiver
//!
//! The archiver owns the snapshot-and-commit protocol for one run:
//!
//! 1. Sanitize the zone name into a [`ZoneFileName`]
//! 2. Note whether the file already exists
//! 3. Serialize the payload canonically and always overwrite the file
//! 4. Ask the repository whether the path now differs from the last commit
//! 5. Stage new or modified paths
//!
//! After the last zone, [`SnapshotArchiver::finish`] produces at most one
//! commit (and one push) covering everything staged.
//!
//! ```text
//! (zone, payload) ──► sanitize ──► write ──► is_new || is_modified? ──► stage
//!                                                                         │
//!                                           finish() ◄────────────────────┘
//!                                              │
//!                     ┌────────────────────────┼──────────────────────┐
//!                     ▼                        ▼                      ▼
//!              commit + push              no changes           commit disabled
//! ```

pub mod canonical;
pub mod filename;

pub use canonical::to_canonical_string;
pub use filename::{ZoneFileName, encode_path_segment};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::io::Write;
use tokio::fs;
use tracing::{debug, info};

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::traits::{ArchiveRepository, CommitId, ZoneName};

/// Fixed message for every archive commit
pub const COMMIT_MESSAGE: &str = "autocommit of changes";

/// Whether a run may commit and push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Commit staged changes and push them upstream
    #[default]
    Enabled,
    /// Dry run: write and stage locally, keep the working copy, never commit
    Disabled,
}

impl CommitMode {
    /// Build from a `--no-commit` style flag
    pub fn from_no_commit(no_commit: bool) -> Self {
        if no_commit {
            CommitMode::Disabled
        } else {
            CommitMode::Enabled
        }
    }

    /// Whether commits are enabled
    pub fn is_enabled(&self) -> bool {
        matches!(self, CommitMode::Enabled)
    }
}

/// What happened to one archive file during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneOutcome {
    /// File did not exist before this run
    Created,
    /// File existed and its content changed
    Modified,
    /// File rewritten with identical content
    Unchanged,
    /// File removed because its zone is gone (pruning only)
    Removed,
}

impl ZoneOutcome {
    /// Whether this outcome stages something
    pub fn is_change(&self) -> bool {
        !matches!(self, ZoneOutcome::Unchanged)
    }
}

/// Per-file entry of a [`RunReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneChange {
    /// Path relative to the archive root
    pub file: PathBuf,
    /// What happened to it
    pub outcome: ZoneOutcome,
}

/// Final disposition of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// One commit was created and pushed
    Committed {
        /// The pushed commit
        commit: CommitId,
    },
    /// Remote data matched the archive
    NoChanges,
    /// Dry run; nothing committed regardless of changes
    CommitDisabled,
}

/// Result of one archiver run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Whether any archive file changed
    pub modified: bool,
    /// Per-file outcomes in processing order
    pub changes: Vec<ZoneChange>,
    /// Final disposition
    pub outcome: RunOutcome,
    /// When archiving started
    pub started_at: DateTime<Utc>,
    /// When archiving finished
    pub finished_at: DateTime<Utc>,
    /// Working copy left on disk for inspection (dry runs only)
    pub retained_workdir: Option<PathBuf>,
}

impl RunReport {
    /// Number of files whose outcome is a change
    pub fn changed_count(&self) -> usize {
        self.changes.iter().filter(|c| c.outcome.is_change()).count()
    }
}

/// Archiver behavior switches
#[derive(Debug, Clone, Default)]
pub struct ArchiverOptions {
    /// Remove tracked files whose zone was not seen this run
    pub prune_stale_zones: bool,
    /// Files pruning never touches
    pub prune_exclude: Vec<String>,
}

impl From<&ArchiveConfig> for ArchiverOptions {
    fn from(config: &ArchiveConfig) -> Self {
        Self {
            prune_stale_zones: config.prune_stale_zones,
            prune_exclude: config.prune_exclude.clone(),
        }
    }
}

/// Snapshot-and-commit protocol over an [`ArchiveRepository`]
///
/// One archiver covers exactly one run. Feed it zones with
/// [`record`](Self::record), then call [`finish`](Self::finish) once.
pub struct SnapshotArchiver<'r> {
    repo: &'r dyn ArchiveRepository,
    options: ArchiverOptions,
    seen: BTreeSet<ZoneFileName>,
    changes: Vec<ZoneChange>,
    modified: bool,
    pruned: bool,
    started_at: DateTime<Utc>,
}

impl<'r> SnapshotArchiver<'r> {
    /// Create an archiver for one run over `repo`
    pub fn new(repo: &'r dyn ArchiveRepository, options: ArchiverOptions) -> Self {
        Self {
            repo,
            options,
            seen: BTreeSet::new(),
            changes: Vec::new(),
            modified: false,
            pruned: false,
            started_at: Utc::now(),
        }
    }

    /// Whether any zone has been staged so far
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Write one zone snapshot and stage it if it changed
    ///
    /// # Errors
    ///
    /// Invalid zone names, I/O failures and repository failures are all
    /// returned as-is; the caller is expected to abort the run.
    pub async fn record<T: Serialize + ?Sized>(
        &mut self,
        zone: &ZoneName,
        payload: &T,
    ) -> Result<ZoneOutcome> {
        let file = ZoneFileName::from_zone(zone)?;
        let path = self.repo.workdir().join(file.as_path());

        let is_new = !fs::try_exists(&path).await?;
        let text = to_canonical_string(payload)?;
        write_file(&path, text.as_bytes())?;

        let outcome = if is_new {
            ZoneOutcome::Created
        } else if self.repo.is_modified(file.as_path())? {
            ZoneOutcome::Modified
        } else {
            ZoneOutcome::Unchanged
        };

        if outcome.is_change() {
            self.repo.stage(file.as_path())?;
            self.modified = true;
        }

        debug!(zone = %zone, file = %file, ?outcome, "Zone snapshot written");
        self.note_change(file.as_path(), outcome);
        self.seen.insert(file);
        Ok(outcome)
    }

    /// Record every `(zone, payload)` pair in order
    pub async fn record_all<I, T>(&mut self, zones: I) -> Result<()>
    where
        I: IntoIterator<Item = (ZoneName, T)>,
        T: Serialize,
    {
        for (zone, payload) in zones {
            self.record(&zone, &payload).await?;
        }
        Ok(())
    }

    /// Stage removal of stale zone files if pruning is enabled
    ///
    /// Runs at most once per archiver. Call it after the last
    /// [`record`](Self::record) when [`is_modified`](Self::is_modified)
    /// must account for removals before [`finish`](Self::finish).
    pub fn prune(&mut self) -> Result<()> {
        if self.options.prune_stale_zones && !self.pruned {
            self.prune_stale()?;
        }
        self.pruned = true;
        Ok(())
    }

    /// Close the run: prune if not done yet, then commit and push at most once
    pub fn finish(mut self, mode: CommitMode) -> Result<RunReport> {
        self.prune()?;

        if !self.modified {
            info!("Remote data matched archive. No changes recorded.");
        }

        let outcome = match (mode, self.modified) {
            (CommitMode::Disabled, _) => {
                info!(
                    "Commit disabled; {} change(s) staged but not committed",
                    self.changed_count()
                );
                RunOutcome::CommitDisabled
            }
            (CommitMode::Enabled, false) => RunOutcome::NoChanges,
            (CommitMode::Enabled, true) => {
                let commit = self.repo.commit(COMMIT_MESSAGE)?;
                info!("Created commit {} with {} change(s)", commit, self.changed_count());
                self.repo.push()?;
                info!("Pushed commit {}", commit);
                RunOutcome::Committed { commit }
            }
        };

        Ok(RunReport {
            modified: self.modified,
            changes: self.changes,
            outcome,
            started_at: self.started_at,
            finished_at: Utc::now(),
            retained_workdir: None,
        })
    }

    /// Stage removal of tracked files that no zone wrote this run
    fn prune_stale(&mut self) -> Result<()> {
        for path in self.repo.tracked_files()? {
            let name = path.to_string_lossy();
            if name.starts_with('.')
                || self.options.prune_exclude.iter().any(|keep| keep.as_str() == name)
                || self.seen.iter().any(|seen| seen.as_str() == name)
            {
                continue;
            }

            info!(file = %name, "Removing stale zone file");
            self.repo.stage_removal(&path)?;
            self.modified = true;
            self.note_change(&path, ZoneOutcome::Removed);
        }
        Ok(())
    }

    fn note_change(&mut self, file: &Path, outcome: ZoneOutcome) {
        // A zone listed twice keeps its first change outcome
        if let Some(existing) = self.changes.iter_mut().find(|c| c.file == file) {
            if !existing.outcome.is_change() {
                existing.outcome = outcome;
            }
            return;
        }
        self.changes.push(ZoneChange {
            file: file.to_path_buf(),
            outcome,
        });
    }

    fn changed_count(&self) -> usize {
        self.changes.iter().filter(|c| c.outcome.is_change()).count()
    }
}

/// Write-then-rename so a crash never leaves a half-written snapshot
///
/// The temporary file gets a short random name next to `path`, so any
/// name that fits the filesystem also fits while it is being written.
fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::invalid_input(format!("No parent directory for {}", path.display())))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".cfsync-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
