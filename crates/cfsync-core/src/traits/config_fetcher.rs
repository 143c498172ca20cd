// # Config Fetcher Trait
//
// Defines the interface for pulling zone configuration from a remote provider.
//
// ## Implementations
//
// - Cloudflare v4 (security-token login + REST v4): `cfsync-fetcher-cloudflare` crate
// - Cloudflare legacy (form login + access token): `cfsync-fetcher-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfsync_core::ConfigFetcher;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let fetcher = /* ConfigFetcher implementation */;
//
//     let session = fetcher.authenticate().await?;
//     for zone in fetcher.list_zones(&session).await? {
//         let payload = fetcher.fetch_zone_config(&session, &zone).await?;
//         println!("{}: {}", zone.name, payload);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque zone identifier as returned by the remote provider
///
/// This is untrusted data. Use [`crate::snapshot::ZoneFileName`] before
/// letting it anywhere near the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneName(String);

impl ZoneName {
    /// Wrap a provider-supplied zone name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the raw name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ZoneName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A zone as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRef {
    /// Zone name; the identifier used for archive files
    pub name: ZoneName,
    /// Provider-internal zone id (some endpoints address zones by id)
    pub id: String,
}

impl ZoneRef {
    /// Create a new zone reference
    pub fn new(name: impl Into<ZoneName>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Account identifiers every fetch call needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    /// Login e-mail
    pub username: String,
    /// Account/user identifier
    pub user_id: String,
}

/// Credential obtained by [`ConfigFetcher::authenticate`]
#[derive(Clone, PartialEq, Eq)]
pub enum SessionCredential {
    /// Header-based auth (`X-Auth-Email` / `X-Auth-Key`)
    ApiKey {
        /// Account e-mail
        email: String,
        /// API key
        key: String,
    },
    /// Opaque access token handed out by a form login
    AccessToken(String),
}

// Custom Debug implementation that hides the secrets
impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionCredential::ApiKey { email, .. } => f
                .debug_struct("ApiKey")
                .field("email", email)
                .field("key", &"<REDACTED>")
                .finish(),
            SessionCredential::AccessToken(_) => {
                f.debug_tuple("AccessToken").field(&"<REDACTED>").finish()
            }
        }
    }
}

/// Authenticated context threaded through every fetch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Account identifiers
    pub account: AccountContext,
    /// Credential for subsequent requests
    pub credential: SessionCredential,
}

impl Session {
    /// Create a new session
    pub fn new(account: AccountContext, credential: SessionCredential) -> Self {
        Self {
            account,
            credential,
        }
    }

    /// The access token, if this session was established with one
    pub fn access_token(&self) -> Option<&str> {
        match &self.credential {
            SessionCredential::AccessToken(token) => Some(token),
            SessionCredential::ApiKey { .. } => None,
        }
    }
}

/// Trait for remote config fetcher implementations
///
/// A fetcher is used in strict sequence by the engine:
/// `authenticate()` once, `list_zones()` once, then
/// `fetch_zone_config()` for each zone in listing order.
///
/// # Trust Level: Untrusted
///
/// Fetchers talk to the network and nothing else:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to their provider's endpoints
/// - ✅ Keep a cookie jar inside their HTTP client
/// - ✅ Parse provider-specific responses
///
/// ## Forbidden Capabilities
/// - ❌ Touch the archive working copy (owned by `SnapshotArchiver`)
/// - ❌ Retry, back off or skip zones (any error aborts the run)
/// - ❌ Log credentials
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    /// Log in and return the session used by all further calls
    ///
    /// # Returns
    ///
    /// - `Ok(Session)`: Authenticated session
    /// - `Err(Error::Authentication)`: Login or token acquisition failed
    async fn authenticate(&self) -> Result<Session, crate::Error>;

    /// List every zone visible to the account
    async fn list_zones(&self, session: &Session) -> Result<Vec<ZoneRef>, crate::Error>;

    /// Fetch the full configuration snapshot of one zone
    ///
    /// The returned payload is opaque to the archiver; it only has to be
    /// JSON-serializable.
    async fn fetch_zone_config(
        &self,
        session: &Session,
        zone: &ZoneRef,
    ) -> Result<serde_json::Value, crate::Error>;

    /// Get the protocol name (for logging/debugging)
    fn protocol_name(&self) -> &'static str;
}

/// Helper trait for constructing fetchers from configuration
pub trait ConfigFetcherFactory: Send + Sync {
    /// Create a ConfigFetcher instance from configuration
    fn create(
        &self,
        config: &crate::config::FetcherConfig,
    ) -> Result<Box<dyn ConfigFetcher>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_debug_redacts_credentials() {
        let session = Session::new(
            AccountContext {
                username: "ops@example.com".to_string(),
                user_id: "42".to_string(),
            },
            SessionCredential::ApiKey {
                email: "ops@example.com".to_string(),
                key: "very-secret".to_string(),
            },
        );
        let debug_str = format!("{:?}", session);
        assert!(!debug_str.contains("very-secret"));
        assert!(debug_str.contains("ops@example.com"));

        let token = SessionCredential::AccessToken("tok-123".to_string());
        assert!(!format!("{:?}", token).contains("tok-123"));
    }

    #[test]
    fn test_access_token_accessor() {
        let account = AccountContext {
            username: "u".to_string(),
            user_id: "1".to_string(),
        };
        let session = Session::new(
            account.clone(),
            SessionCredential::AccessToken("abc".to_string()),
        );
        assert_eq!(session.access_token(), Some("abc"));

        let session = Session::new(
            account,
            SessionCredential::ApiKey {
                email: "u".to_string(),
                key: "k".to_string(),
            },
        );
        assert_eq!(session.access_token(), None);
    }
}
