//! Core traits for cfsync
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ConfigFetcher`]: Authenticate and pull per-zone configuration payloads
//! - [`ArchiveRepository`]: Version-controlled working copy used by the archiver

pub mod archive_repository;
pub mod config_fetcher;

pub use archive_repository::{ArchiveRepository, CommitId};
pub use config_fetcher::{
    AccountContext, ConfigFetcher, ConfigFetcherFactory, Session, SessionCredential, ZoneName,
    ZoneRef,
};
