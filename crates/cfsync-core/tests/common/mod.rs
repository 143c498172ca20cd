//! Test doubles and common utilities for contract tests
//!
//! - [`StaticFetcher`]: a ConfigFetcher serving a fixed zone list, with
//!   call counters and optional injected failures
//! - [`TestRemote`]: a bare git repository standing in for the upstream
//!   archive, seeded with a README commit

#![allow(dead_code)]

use async_trait::async_trait;
use cfsync_core::error::{Error, Result};
use cfsync_core::traits::{AccountContext, ConfigFetcher, Session, SessionCredential, ZoneRef};
use cfsync_core::{ArchiveConfig, ZoneName};
use git2::{Repository, Signature};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Branch the test remote's HEAD points at
pub const BRANCH: &str = "refs/heads/main";

/// A ConfigFetcher that serves a fixed list of zones
pub struct StaticFetcher {
    zones: Vec<(ZoneRef, Value)>,
    /// Fail fetching this zone with a provider error
    fail_on: Option<ZoneName>,
    /// Fail authentication
    reject_login: bool,
    /// Bare repository to commit to while zones are listed
    advance_upstream: Option<PathBuf>,
    auth_calls: Arc<AtomicUsize>,
    fetch_calls: Arc<AtomicUsize>,
}

impl StaticFetcher {
    /// Serve `zones` in the given order
    pub fn new(zones: Vec<(&str, Value)>) -> Self {
        let zones = zones
            .into_iter()
            .enumerate()
            .map(|(i, (name, payload))| (ZoneRef::new(name, format!("zone-{}", i)), payload))
            .collect();

        Self {
            zones,
            fail_on: None,
            reject_login: false,
            advance_upstream: None,
            auth_calls: Arc::new(AtomicUsize::new(0)),
            fetch_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make `fetch_zone_config` fail for `zone`
    pub fn failing_on(mut self, zone: &str) -> Self {
        self.fail_on = Some(ZoneName::new(zone));
        self
    }

    /// Make `authenticate` fail
    pub fn rejecting_login(mut self) -> Self {
        self.reject_login = true;
        self
    }

    /// Commit to `remote` during `list_zones`, after the run has cloned
    pub fn advancing_upstream(mut self, remote: &TestRemote) -> Self {
        self.advance_upstream = Some(remote.path.clone());
        self
    }

    /// Counter handles that outlive the fetcher once it is boxed
    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (self.auth_calls.clone(), self.fetch_calls.clone())
    }
}

#[async_trait]
impl ConfigFetcher for StaticFetcher {
    async fn authenticate(&self) -> Result<Session> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_login {
            return Err(Error::auth("Login appears to have failed."));
        }

        Ok(Session::new(
            AccountContext {
                username: "ops@example.com".to_string(),
                user_id: "42".to_string(),
            },
            SessionCredential::AccessToken("test-token".to_string()),
        ))
    }

    async fn list_zones(&self, _session: &Session) -> Result<Vec<ZoneRef>> {
        if let Some(path) = &self.advance_upstream {
            commit_to(path, &[("concurrent.example", "{}")]);
        }
        Ok(self.zones.iter().map(|(zone, _)| zone.clone()).collect())
    }

    async fn fetch_zone_config(&self, _session: &Session, zone: &ZoneRef) -> Result<Value> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_ref() == Some(&zone.name) {
            return Err(Error::provider("static", "HTTP 503 (transient)"));
        }

        self.zones
            .iter()
            .find(|(z, _)| z.name == zone.name)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| Error::not_found(format!("zone {}", zone.name)))
    }

    fn protocol_name(&self) -> &'static str {
        "static"
    }
}

/// Bare repository acting as the upstream archive
pub struct TestRemote {
    root: tempfile::TempDir,
    path: PathBuf,
}

impl TestRemote {
    /// Create a bare remote whose first commit holds a README
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("archive.git");
        let repo = Repository::init_bare(&path).unwrap();
        repo.set_head(BRANCH).unwrap();

        let remote = Self { root, path };
        remote.commit_files(&[("README.md", "Zone configuration archive\n")]);
        remote
    }

    /// Clone URL of the remote
    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Archive config pointing at this remote, with working copies under `parent`
    pub fn archive_config(&self, parent: &Path) -> ArchiveConfig {
        ArchiveConfig::new(self.url()).with_workdir_parent(parent)
    }

    /// Add a commit on top of HEAD that writes `files`
    pub fn commit_files(&self, files: &[(&str, &str)]) {
        commit_to(&self.path, files);
    }

    /// Number of commits reachable from HEAD
    pub fn commit_count(&self) -> usize {
        let repo = self.repo();
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.count()
    }

    /// Message and author of the HEAD commit
    pub fn head_commit(&self) -> (String, String, String) {
        let repo = self.repo();
        let commit = repo.head().unwrap().peel_to_commit().unwrap();
        let author = commit.author();
        (
            commit.message().unwrap_or_default().to_string(),
            author.name().unwrap_or_default().to_string(),
            author.email().unwrap_or_default().to_string(),
        )
    }

    /// Contents of a top-level file at HEAD
    pub fn read_file(&self, name: &str) -> Option<String> {
        let repo = self.repo();
        let tree = repo.head().unwrap().peel_to_tree().unwrap();
        let entry = tree.get_path(Path::new(name)).ok()?;
        let blob = repo.find_blob(entry.id()).ok()?;
        Some(String::from_utf8_lossy(blob.content()).into_owned())
    }

    /// Sorted top-level file names at HEAD
    pub fn file_names(&self) -> Vec<String> {
        let repo = self.repo();
        let tree = repo.head().unwrap().peel_to_tree().unwrap();
        let mut names: Vec<String> = tree
            .iter()
            .filter_map(|entry| entry.name().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    /// Scratch directory next to the remote, for working copies
    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        let dir = self.root.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn repo(&self) -> Repository {
        Repository::open_bare(&self.path).unwrap()
    }
}

/// Add a commit on top of HEAD of the bare repository at `path`
fn commit_to(path: &Path, files: &[(&str, &str)]) {
    let repo = Repository::open_bare(path).unwrap();
    let parent = repo.head().ok().map(|head| head.peel_to_commit().unwrap());
    let base_tree = parent.as_ref().map(|c| c.tree().unwrap());

    let mut builder = repo.treebuilder(base_tree.as_ref()).unwrap();
    for (name, contents) in files {
        let blob = repo.blob(contents.as_bytes()).unwrap();
        builder.insert(name, blob, 0o100644).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let signature = Signature::now("seed", "seed@localhost").unwrap();
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some(BRANCH), &signature, &signature, "seed", &tree, &parents)
        .unwrap();
}

/// Number of entries in a directory
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
