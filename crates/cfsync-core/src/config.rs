//! Configuration types for cfsync
//!
//! This module defines all configuration structures used throughout the crate.
//! The on-disk format is TOML with a `[cloudflare]` and an `[archive]` table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cfsync.toml";

/// Main cfsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote fetcher configuration
    pub cloudflare: FetcherConfig,

    /// Archive repository configuration
    pub archive: ArchiveConfig,
}

impl SyncConfig {
    /// Load and validate configuration from a TOML file
    ///
    /// A missing or unreadable file, a parse error and a missing or empty
    /// required key are all reported as [`crate::Error::Config`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("No config found at {}: {}", path.display(), e))
        })?;

        let config = Self::from_toml(&contents)
            .map_err(|e| crate::Error::config(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, crate::Error> {
        let config: SyncConfig = toml::from_str(contents)
            .map_err(|e| crate::Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.cloudflare.validate()?;
        self.archive.validate()?;
        Ok(())
    }
}

/// Login/fetch protocol used against the remote provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchProtocol {
    /// Security-token browser login plus the v4 REST API
    #[default]
    V4,
    /// Form login with an opaque access token against the older endpoints
    Legacy,
}

impl FetchProtocol {
    /// Registry name of the protocol
    pub fn type_name(&self) -> &'static str {
        match self {
            FetchProtocol::V4 => "v4",
            FetchProtocol::Legacy => "legacy",
        }
    }
}

impl fmt::Display for FetchProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Remote fetcher configuration
///
/// The Debug implementation does NOT expose `api_key` or `login_pass`.
#[derive(Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Which login/fetch protocol to use
    #[serde(default)]
    pub protocol: FetchProtocol,

    /// Account e-mail used for login and `X-Auth-Email`
    pub username: String,

    /// Account/user identifier used by the page-rule endpoints
    pub user_id: String,

    /// API key used for `X-Auth-Key`
    /// ⚠️ NEVER log this value
    pub api_key: String,

    /// Web login password
    /// ⚠️ NEVER log this value
    pub login_pass: String,

    /// Override for the REST API base URL
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Override for the web (login, legacy endpoints) base URL
    #[serde(default)]
    pub web_base_url: Option<String>,
}

impl FetcherConfig {
    /// Validate the fetcher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let required = [
            ("username", &self.username),
            ("user_id", &self.user_id),
            ("api_key", &self.api_key),
            ("login_pass", &self.login_pass),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(crate::Error::config(format!(
                    "cloudflare.{} cannot be empty",
                    key
                )));
            }
        }

        for url in [&self.api_base_url, &self.web_base_url].into_iter().flatten() {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(crate::Error::config(format!(
                    "Base URL must use HTTP or HTTPS scheme. Got: {}",
                    url
                )));
            }
        }

        Ok(())
    }

    /// Get the protocol type name
    pub fn type_name(&self) -> &'static str {
        self.protocol.type_name()
    }
}

// Custom Debug implementation that hides the credentials
impl fmt::Debug for FetcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherConfig")
            .field("protocol", &self.protocol)
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("api_key", &"<REDACTED>")
            .field("login_pass", &"<REDACTED>")
            .field("api_base_url", &self.api_base_url)
            .field("web_base_url", &self.web_base_url)
            .finish()
    }
}

/// Archive repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// URL (or local path) of the archive repository to clone and push to
    pub repo_url: String,

    /// Remove archived zones that the provider no longer returns
    ///
    /// Off by default: the archive is append-only unless asked otherwise.
    #[serde(default)]
    pub prune_stale_zones: bool,

    /// Tracked files that pruning must never remove
    #[serde(default = "default_prune_exclude")]
    pub prune_exclude: Vec<String>,

    /// Commit author name
    #[serde(default = "default_author_name")]
    pub author_name: String,

    /// Commit author e-mail
    #[serde(default = "default_author_email")]
    pub author_email: String,

    /// Directory in which the ephemeral working copy is created
    ///
    /// Defaults to the system temporary directory.
    #[serde(default)]
    pub workdir_parent: Option<PathBuf>,
}

impl ArchiveConfig {
    /// Create an archive configuration with defaults
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            prune_stale_zones: false,
            prune_exclude: default_prune_exclude(),
            author_name: default_author_name(),
            author_email: default_author_email(),
            workdir_parent: None,
        }
    }

    /// Enable or disable stale zone pruning
    pub fn with_prune_stale_zones(mut self, prune: bool) -> Self {
        self.prune_stale_zones = prune;
        self
    }

    /// Create working copies under the given directory
    pub fn with_workdir_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.workdir_parent = Some(parent.into());
        self
    }

    /// Validate the archive configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.repo_url.trim().is_empty() {
            return Err(crate::Error::config("archive.repo_url cannot be empty"));
        }
        if self.author_name.trim().is_empty() || self.author_email.trim().is_empty() {
            return Err(crate::Error::config(
                "archive.author_name and archive.author_email cannot be empty",
            ));
        }
        Ok(())
    }
}

fn default_prune_exclude() -> Vec<String> {
    vec!["README.md".to_string()]
}

fn default_author_name() -> String {
    "cfsync".to_string()
}

fn default_author_email() -> String {
    "cfsync@localhost".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[cloudflare]
username = "ops@example.com"
user_id = "12345"
api_key = "secret-key"
login_pass = "secret-pass"

[archive]
repo_url = "git@example.com:ops/cf-archive.git"
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = SyncConfig::from_toml(FULL).unwrap();
        assert_eq!(config.cloudflare.protocol, FetchProtocol::V4);
        assert_eq!(config.cloudflare.username, "ops@example.com");
        assert_eq!(config.archive.repo_url, "git@example.com:ops/cf-archive.git");
        assert!(!config.archive.prune_stale_zones);
        assert_eq!(config.archive.author_name, "cfsync");
        assert_eq!(config.archive.prune_exclude, vec!["README.md".to_string()]);
    }

    #[test]
    fn test_parse_legacy_protocol() {
        let toml_str = FULL.replace("[cloudflare]", "[cloudflare]\nprotocol = \"legacy\"");
        let config = SyncConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config.cloudflare.protocol, FetchProtocol::Legacy);
        assert_eq!(config.cloudflare.type_name(), "legacy");
    }

    #[test]
    fn test_missing_required_key_is_config_error() {
        let toml_str = FULL.replace("login_pass = \"secret-pass\"\n", "");
        let err = SyncConfig::from_toml(&toml_str).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("login_pass"));
    }

    #[test]
    fn test_empty_required_key_is_config_error() {
        let toml_str = FULL.replace("\"12345\"", "\"\"");
        let err = SyncConfig::from_toml(&toml_str).unwrap_err();
        assert!(err.to_string().contains("cloudflare.user_id"));
    }

    #[test]
    fn test_missing_archive_section() {
        let toml_str = FULL.split("[archive]").next().unwrap().to_string();
        assert!(SyncConfig::from_toml(&toml_str).unwrap_err().is_config());
    }

    #[test]
    fn test_invalid_base_url_scheme() {
        let toml_str = FULL.replace(
            "[archive]",
            "api_base_url = \"ftp://example.com\"\n\n[archive]",
        );
        assert!(SyncConfig::from_toml(&toml_str).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = SyncConfig::load("/nonexistent/cfsync.toml").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("No config found"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfsync.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.cloudflare.user_id, "12345");
    }

    #[test]
    fn test_credentials_not_exposed_in_debug() {
        let config = SyncConfig::from_toml(FULL).unwrap();
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret-key"));
        assert!(!debug_str.contains("secret-pass"));
        assert!(debug_str.contains("ops@example.com"));
    }
}
