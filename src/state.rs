//! Shared application state: configuration, provider client, dedup service.

use std::sync::Arc;

use crate::config::{Config, StoreSettings};
use crate::services::{CapiClient, DedupService};
use crate::store::{KvStore, MemoryStore, RedisStore, RestStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub capi: CapiClient,
    /// None when no store backend is configured; the relay then forwards
    /// every event without dedup or counting.
    pub dedup: Option<DedupService>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;
        Self::with_config(config)
    }

    /// Builds the state from an already-loaded config, constructing the
    /// store backend the settings name.
    pub fn with_config(config: Config) -> anyhow::Result<Self> {
        let store: Option<Arc<dyn KvStore>> = match &config.store {
            StoreSettings::Redis { url } => Some(Arc::new(RedisStore::connect(url)?)),
            StoreSettings::Rest { url, token } => {
                Some(Arc::new(RestStore::new(url.clone(), token.clone())?))
            }
            StoreSettings::Memory => Some(Arc::new(MemoryStore::new())),
            StoreSettings::Disabled => None,
        };
        Self::with_store(config, store)
    }

    /// Assembles the state around an injected store. Lets tests substitute
    /// their own `KvStore` implementation.
    pub fn with_store(
        config: Config,
        store: Option<Arc<dyn KvStore>>,
    ) -> anyhow::Result<Self> {
        let capi = CapiClient::new(config.capi_base_url.clone())?;
        let dedup = store.map(|s| DedupService::new(s, &config.dedup));
        Ok(AppState {
            config,
            capi,
            dedup,
        })
    }

    pub fn store_label(&self) -> &'static str {
        self.config.store.label()
    }
}
