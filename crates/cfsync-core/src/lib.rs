// # cfsync-core
//
// Core library for archiving CDN/DNS zone configuration snapshots.
//
// ## Architecture Overview
//
// This library provides the functionality behind a single sync run:
// - **ConfigFetcher**: Trait for authenticating to a provider and fetching per-zone payloads
// - **ArchiveRepository**: Trait for the version-controlled working copy (git-backed by default)
// - **SnapshotArchiver**: Canonical write + change detection + single-commit protocol
// - **SyncEngine**: Orchestrates one run: clone → fetch → write → commit → cleanup
// - **FetcherRegistry**: Plugin-based registry for fetcher protocols
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Fetchers know nothing about git, the archiver knows nothing about HTTP
// 2. **Deterministic Output**: Canonical JSON makes git's content hash the change detector
// 3. **Plugin-Based**: Fetch protocols are registered by name, selected by configuration
// 4. **Library-First**: All core functionality can be used as a library
// 5. **All-or-nothing**: A run either commits once or leaves the remote untouched

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod snapshot;
pub mod traits;

// Re-export core types for convenience
pub use archive::{ArchiveWorkspace, GitArchive};
pub use config::{ArchiveConfig, FetchProtocol, FetcherConfig, SyncConfig};
pub use engine::{CommitMode, RunPhase, SyncEngine};
pub use error::{Error, Result};
pub use registry::FetcherRegistry;
pub use snapshot::{
    ArchiverOptions, RunOutcome, RunReport, SnapshotArchiver, ZoneChange, ZoneFileName, ZoneOutcome,
};
pub use traits::{
    AccountContext, ArchiveRepository, ConfigFetcher, ConfigFetcherFactory, Session,
    SessionCredential, ZoneName, ZoneRef,
};
