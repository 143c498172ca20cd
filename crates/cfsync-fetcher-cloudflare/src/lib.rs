// # Cloudflare Config Fetchers
//
// This crate provides the two Cloudflare ConfigFetcher implementations
// for cfsync:
//
// - **v4** (`CloudflareV4Fetcher`): dashboard login with a scraped security
//   token, then REST v4 calls authenticated with `X-Auth-Email`/`X-Auth-Key`
// - **legacy** (`CloudflareLegacyFetcher`): form login returning an access
//   token, then dashboard `/api/v2` calls carrying that token
//
// Both produce the same per-zone payload:
//
// ```json
// { "pagerules": <page rules>, "settings": <zone settings> }
// ```
//
// ## Behavior
//
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Cookies kept for the whole run
// - ✅ Status codes mapped to specific errors (401/403, 404, 429, 5xx)
// - ✅ Zone listing follows pagination (v4)
// - ❌ NO retry logic (any error aborts the run)
// - ❌ NO caching between runs
//
// ## Security Requirements
//
// - API key, password and access token NEVER appear in logs or errors
// - Request URLs are stripped from transport errors

mod http;
pub mod legacy;
pub mod v4;

pub use legacy::CloudflareLegacyFetcher;
pub use v4::CloudflareV4Fetcher;

use cfsync_core::config::{FetchProtocol, FetcherConfig};
use cfsync_core::traits::{ConfigFetcher, ConfigFetcherFactory};
use cfsync_core::{FetcherRegistry, Result};

/// Cloudflare REST v4 base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare dashboard base URL
pub const CLOUDFLARE_WEB_BASE: &str = "https://www.cloudflare.com";

/// Factory for creating Cloudflare fetchers
///
/// The protocol is taken from [`FetcherConfig::protocol`].
pub struct CloudflareFactory;

impl ConfigFetcherFactory for CloudflareFactory {
    fn create(&self, config: &FetcherConfig) -> Result<Box<dyn ConfigFetcher>> {
        config.validate()?;

        let api_base = config.api_base_url.as_deref().unwrap_or(CLOUDFLARE_API_BASE);
        let web_base = config.web_base_url.as_deref().unwrap_or(CLOUDFLARE_WEB_BASE);

        match config.protocol {
            FetchProtocol::V4 => Ok(Box::new(CloudflareV4Fetcher::new(
                config.username.clone(),
                config.user_id.clone(),
                config.api_key.clone(),
                config.login_pass.clone(),
                api_base,
                web_base,
            )?)),
            FetchProtocol::Legacy => Ok(Box::new(CloudflareLegacyFetcher::new(
                config.username.clone(),
                config.user_id.clone(),
                config.login_pass.clone(),
                web_base,
            )?)),
        }
    }
}

/// Register both Cloudflare protocols with a registry
///
/// # Example
///
/// ```rust
/// use cfsync_core::FetcherRegistry;
///
/// let registry = FetcherRegistry::new();
/// cfsync_fetcher_cloudflare::register(&registry);
/// assert!(registry.has_fetcher("v4"));
/// assert!(registry.has_fetcher("legacy"));
/// ```
pub fn register(registry: &FetcherRegistry) {
    registry.register_fetcher(FetchProtocol::V4.type_name(), Box::new(CloudflareFactory));
    registry.register_fetcher(FetchProtocol::Legacy.type_name(), Box::new(CloudflareFactory));
}
