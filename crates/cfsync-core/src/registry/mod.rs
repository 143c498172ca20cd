//! Plugin-based fetcher registry
//!
//! The registry allows fetch protocols to be registered dynamically at
//! runtime, so the protocol is selected by configuration rather than by
//! duplicated end-to-end code paths.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cfsync_core::registry::FetcherRegistry;
//!
//! let registry = FetcherRegistry::new();
//! cfsync_fetcher_cloudflare::register(&registry);
//!
//! let fetcher = registry.create_fetcher(&config.cloudflare)?;
//! ```

use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use crate::traits::{ConfigFetcher, ConfigFetcherFactory};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type FactoryMap = HashMap<String, Box<dyn ConfigFetcherFactory>>;

/// Registry of fetcher factories keyed by protocol name
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct FetcherRegistry {
    /// Registered fetcher factories
    fetchers: RwLock<FactoryMap>,
}

impl FetcherRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetcher factory
    ///
    /// # Parameters
    ///
    /// - `name`: Protocol name (e.g., "v4", "legacy")
    /// - `factory`: Factory object for creating fetcher instances
    pub fn register_fetcher(&self, name: impl Into<String>, factory: Box<dyn ConfigFetcherFactory>) {
        self.write().insert(name.into(), factory);
    }

    /// Create a fetcher from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ConfigFetcher>)`: Created fetcher instance
    /// - `Err(Error)`: If the protocol is not registered or creation fails
    pub fn create_fetcher(&self, config: &FetcherConfig) -> Result<Box<dyn ConfigFetcher>> {
        let protocol = config.type_name();
        let fetchers = self.read();

        let factory = fetchers
            .get(protocol)
            .ok_or_else(|| Error::config(format!("Unknown fetch protocol: {}", protocol)))?;

        factory.create(config)
    }

    /// List all registered protocol names
    pub fn list_fetchers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a protocol is registered
    pub fn has_fetcher(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    fn read(&self) -> RwLockReadGuard<'_, FactoryMap> {
        self.fetchers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FactoryMap> {
        self.fetchers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
