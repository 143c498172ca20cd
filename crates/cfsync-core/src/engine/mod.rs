//! Core sync engine
//!
//! The SyncEngine is responsible for one complete run:
//! - Cloning the archive into a fresh working directory
//! - Authenticating and listing zones via ConfigFetcher
//! - Writing each zone through the SnapshotArchiver
//! - Committing and pushing at most once
//! - Deleting (or retaining) the working directory
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐                        ┌────────────────┐
//! │ ConfigFetcher │── (ZoneRef, payload) ─►│ SnapshotArchiver│
//! └───────────────┘                        └────────────────┘
//!         ▲                                         │
//!         │                                         ▼
//! ┌───────────────┐                        ┌────────────────┐
//! │  SyncEngine   │── clone / release ────►│   GitArchive   │
//! └───────────────┘                        │ (in workspace) │
//!                                          └────────────────┘
//! ```
//!
//! ## Phases
//!
//! `Cloned → Fetching → Writing → (Dirty | Clean) → [Committed] → CleanedUp`
//!
//! Each transition is logged and, when a subscriber asked for them,
//! sent on the phase channel.

use std::fmt;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveWorkspace, GitArchive};
use crate::config::ArchiveConfig;
use crate::error::Result;
use crate::snapshot::{ArchiverOptions, RunOutcome, RunReport, SnapshotArchiver};
use crate::traits::ConfigFetcher;

pub use crate::snapshot::CommitMode;

/// Run lifecycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// Archive cloned into the working directory
    Cloned,
    /// Authenticating and listing zones
    Fetching,
    /// Fetching and writing zone snapshots
    Writing,
    /// At least one archive file changed (entered before any commit)
    Dirty,
    /// Every archive file matched the last commit
    Clean,
    /// Commit created and pushed
    Committed,
    /// Working directory deleted or retained
    CleanedUp,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Cloned => "cloned",
            RunPhase::Fetching => "fetching",
            RunPhase::Writing => "writing",
            RunPhase::Dirty => "dirty",
            RunPhase::Clean => "clean",
            RunPhase::Committed => "committed",
            RunPhase::CleanedUp => "cleaned_up",
        };
        f.write_str(name)
    }
}

/// Core sync engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Optionally [`subscribe()`](SyncEngine::subscribe) to phase transitions
/// 3. Call [`SyncEngine::run()`] once per sync
///
/// ## Failure
///
/// Any error from the fetcher or the repository aborts the run before
/// the commit. The working directory follows the commit mode either way:
/// deleted when commits are enabled, kept when they are disabled.
pub struct SyncEngine {
    /// Remote configuration source
    fetcher: Box<dyn ConfigFetcher>,

    /// Archive repository settings
    archive: ArchiveConfig,

    /// Whether the run may commit and push
    mode: CommitMode,

    /// Phase sender for external monitoring
    phase_tx: Option<mpsc::Sender<RunPhase>>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Parameters
    ///
    /// - `fetcher`: Protocol implementation used for every fetch
    /// - `archive`: Archive repository configuration
    /// - `mode`: Commit mode for this run
    pub fn new(fetcher: Box<dyn ConfigFetcher>, archive: ArchiveConfig, mode: CommitMode) -> Self {
        Self {
            fetcher,
            archive,
            mode,
            phase_tx: None,
        }
    }

    /// Receive phase transitions on a bounded channel
    ///
    /// Phases are dropped (with a warning) when the channel is full.
    pub fn subscribe(&mut self, capacity: usize) -> mpsc::Receiver<RunPhase> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.phase_tx = Some(tx);
        rx
    }

    /// Commit mode of this engine
    pub fn mode(&self) -> CommitMode {
        self.mode
    }

    /// Run one sync
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The run finished; see [`RunReport::outcome`]
    /// - `Err(Error)`: The run aborted; nothing was committed or pushed
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            "Starting sync using {} protocol (commit {})",
            self.fetcher.protocol_name(),
            if self.mode.is_enabled() { "enabled" } else { "disabled" }
        );

        let workspace = ArchiveWorkspace::create(self.archive.workdir_parent.as_deref())?;
        let result = self.run_in(workspace.path()).await;

        if let Err(e) = &result {
            error!("Sync aborted: {}", e);
        }

        let released = workspace.release(self.mode);
        self.enter(RunPhase::CleanedUp);

        match (result, released) {
            (Ok(mut report), Ok(retained)) => {
                report.retained_workdir = retained;
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!("Cleanup after failed run also failed: {}", cleanup);
                Err(e)
            }
        }
    }

    /// Everything between creating and releasing the working directory
    ///
    /// The repository handle is dropped before this returns, so the
    /// directory can be removed afterwards.
    async fn run_in(&self, workdir: &Path) -> Result<RunReport> {
        let repo = GitArchive::clone_into(&self.archive, workdir)?;
        self.enter(RunPhase::Cloned);

        self.enter(RunPhase::Fetching);
        let session = self.fetcher.authenticate().await?;
        let zones = self.fetcher.list_zones(&session).await?;
        info!("Found {} zone(s)", zones.len());

        self.enter(RunPhase::Writing);
        let mut archiver = SnapshotArchiver::new(&repo, ArchiverOptions::from(&self.archive));
        for zone in &zones {
            debug!(zone = %zone.name, "Fetching zone configuration");
            let payload = self.fetcher.fetch_zone_config(&session, zone).await?;
            archiver.record(&zone.name, &payload).await?;
        }

        archiver.prune()?;
        self.enter(if archiver.is_modified() {
            RunPhase::Dirty
        } else {
            RunPhase::Clean
        });

        let report = archiver.finish(self.mode)?;
        if matches!(report.outcome, RunOutcome::Committed { .. }) {
            self.enter(RunPhase::Committed);
        }

        Ok(report)
    }

    /// Log a phase transition and forward it to the subscriber
    fn enter(&self, phase: RunPhase) {
        debug!(%phase, "Run phase");
        if let Some(tx) = &self.phase_tx {
            if tx.try_send(phase).is_err() {
                warn!("Phase channel full or closed, dropping phase {}", phase);
            }
        }
    }
}
