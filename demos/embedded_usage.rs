//! Minimal embedding example for cfsync-core
//!
//! Drives the sync engine with an in-process fetcher against a throwaway
//! bare repository: one run that commits, one that finds nothing to do,
//! and one dry run that leaves its working copy behind.

use cfsync_core::traits::{AccountContext, ConfigFetcher, Session, SessionCredential, ZoneRef};
use cfsync_core::{ArchiveConfig, CommitMode, Result, RunReport, SyncEngine};
use serde_json::{Value, json};
use std::path::Path;

/// Fetcher serving a fixed set of zones
struct EmbeddedFetcher {
    zones: Vec<(ZoneRef, Value)>,
}

impl EmbeddedFetcher {
    fn new(settings_ssl: &str) -> Self {
        Self {
            zones: vec![
                (
                    ZoneRef::new("example.com", "zone-1"),
                    json!({
                        "pagerules": [],
                        "settings": [{"id": "ssl", "value": settings_ssl}],
                    }),
                ),
                (
                    ZoneRef::new("example.org", "zone-2"),
                    json!({
                        "settings": [{"id": "always_use_https", "value": "on"}],
                        "pagerules": [{"id": "rule-1", "targets": ["example.org/*"]}],
                    }),
                ),
            ],
        }
    }
}

#[async_trait::async_trait]
impl ConfigFetcher for EmbeddedFetcher {
    async fn authenticate(&self) -> Result<Session> {
        println!("[Embedded] Authenticating");
        Ok(Session::new(
            AccountContext {
                username: "ops@example.com".to_string(),
                user_id: "1".to_string(),
            },
            SessionCredential::AccessToken("embedded".to_string()),
        ))
    }

    async fn list_zones(&self, _session: &Session) -> Result<Vec<ZoneRef>> {
        Ok(self.zones.iter().map(|(zone, _)| zone.clone()).collect())
    }

    async fn fetch_zone_config(&self, _session: &Session, zone: &ZoneRef) -> Result<Value> {
        println!("[Embedded] Fetching {}", zone.name);
        Ok(self
            .zones
            .iter()
            .find(|(z, _)| z == zone)
            .map(|(_, payload)| payload.clone())
            .unwrap_or(Value::Null))
    }

    fn protocol_name(&self) -> &'static str {
        "embedded"
    }
}

async fn run_once(remote: &Path, ssl: &str, mode: CommitMode) -> Result<RunReport> {
    let archive = ArchiveConfig::new(remote.to_string_lossy());
    let mut engine = SyncEngine::new(Box::new(EmbeddedFetcher::new(ssl)), archive, mode);

    let mut phases = engine.subscribe(16);
    let report = engine.run().await?;
    while let Ok(phase) = phases.try_recv() {
        println!("[Phase] {}", phase);
    }
    Ok(report)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded cfsync-core Example ===\n");

    let scratch = tempfile::tempdir()?;
    let remote = scratch.path().join("archive.git");
    git2::Repository::init_bare(&remote)?;

    println!("1. First run: every zone is new");
    let report = run_once(&remote, "flexible", CommitMode::Enabled).await?;
    println!("   outcome: {:?}, changes: {}\n", report.outcome, report.changed_count());

    println!("2. Second run: identical data");
    let report = run_once(&remote, "flexible", CommitMode::Enabled).await?;
    println!("   outcome: {:?}\n", report.outcome);

    println!("3. Dry run with a changed setting");
    let report = run_once(&remote, "full", CommitMode::Disabled).await?;
    println!("   outcome: {:?}", report.outcome);
    if let Some(kept) = &report.retained_workdir {
        let text = std::fs::read_to_string(kept.join("example.com"))?;
        println!("   example.com in {}:\n{}", kept.display(), text);
        std::fs::remove_dir_all(kept)?;
    }

    println!("\n=== Embedding Successful ===");
    Ok(())
}
