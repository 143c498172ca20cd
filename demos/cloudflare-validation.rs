// # Cloudflare fetcher validation tool
//
// Logs in with a real cfsync config file, lists zones and fetches the
// first one, printing its canonical form. Never touches the archive
// repository.
//
// ## Usage
//
// ```bash
// CFSYNC_CONFIG=/etc/cfsync.toml cargo run -p demos --bin cloudflare_validation
// ```

use cfsync_core::config::DEFAULT_CONFIG_PATH;
use cfsync_core::snapshot::{ZoneFileName, to_canonical_string};
use cfsync_core::{FetcherRegistry, SyncConfig};
use std::env;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let path = env::var("CFSYNC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = SyncConfig::load(&path)?;
    tracing::info!("Validating {} protocol", config.cloudflare.protocol);

    let registry = FetcherRegistry::new();
    cfsync_fetcher_cloudflare::register(&registry);
    let fetcher = registry.create_fetcher(&config.cloudflare)?;

    let session = fetcher.authenticate().await?;
    tracing::info!("Login succeeded");

    let zones = fetcher.list_zones(&session).await?;
    tracing::info!("Account has {} zone(s)", zones.len());
    for zone in &zones {
        println!("{} -> {}", zone.name, ZoneFileName::from_zone(&zone.name)?);
    }

    if let Some(zone) = zones.first() {
        let payload = fetcher.fetch_zone_config(&session, zone).await?;
        println!("{}", to_canonical_string(&payload)?);
    }

    Ok(())
}
