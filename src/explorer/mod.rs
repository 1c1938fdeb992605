//! Explorer module - connection management and live chain feeds.
//!
//! Components, leaves first: the endpoint store persists candidate RPC URLs,
//! the validator health-checks a URL, the session client owns the live
//! connection, the live feed keeps bounded block/transaction buffers, and the
//! session manager ties them together behind connect/switch/disconnect.

pub mod types;
pub mod storage;
pub mod endpoint_store;
pub mod wire;
pub mod decode;
pub mod rpc;
pub mod ws_client;
pub mod validator;
pub mod session;
pub mod feed;
pub mod manager;
pub mod abci;

// Re-export main types
pub use types::{
    ConnectionState, EventKind, ExplorerConfig, ExplorerError, FeedUpdate, PresetEndpoint,
    ChainEventSender, ChainEventReceiver,
};

// Re-export key components
pub use storage::{KvStorage, MemoryStorage, SqliteStorage};
pub use endpoint_store::{normalize_endpoint, EndpointSnapshot, EndpointStore};
pub use rpc::{RpcConnector, RpcTransport, TendermintConnector};
pub use validator::ConnectionValidator;
pub use session::SessionClient;
pub use feed::{FeedBuffer, LiveFeed, SubscriptionHandle};
pub use manager::SessionManager;
pub use decode::{decode_msg, decode_tx_body, short_type_name, tx_hash};

use std::sync::Arc;
use tracing::info;

/// Explorer builder for convenient construction with sensible defaults.
pub struct ExplorerBuilder {
    config: ExplorerConfig,
}

impl ExplorerBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ExplorerConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ExplorerConfig) -> Self {
        Self { config }
    }

    /// Set the number of entries kept in each feed buffer.
    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.config.feed_capacity = capacity;
        self
    }

    /// Set the validation timeout in milliseconds.
    pub fn with_validate_timeout(mut self, timeout_ms: u64) -> Self {
        self.config.validate_timeout_ms = timeout_ms;
        self
    }

    /// Set the session open timeout in milliseconds.
    pub fn with_open_timeout(mut self, timeout_ms: u64) -> Self {
        self.config.open_timeout_ms = timeout_ms;
        self
    }

    /// Set the per-request timeout in milliseconds.
    pub fn with_request_timeout(mut self, timeout_ms: u64) -> Self {
        self.config.request_timeout_ms = timeout_ms;
        self
    }

    /// Persist endpoints to a SQLite file.
    pub fn with_storage_path(mut self, path: impl Into<String>) -> Self {
        self.config.storage_path = Some(path.into());
        self
    }

    /// Set quick-connect endpoints.
    pub fn with_preset_endpoints(mut self, presets: Vec<PresetEndpoint>) -> Self {
        self.config.preset_endpoints = presets;
        self
    }

    /// Build the explorer configuration.
    pub fn build_config(self) -> ExplorerConfig {
        self.config
    }

    /// Build a session manager backed by a Tendermint connector and the
    /// configured storage.
    pub async fn build(self) -> anyhow::Result<SessionManager> {
        let storage: Arc<dyn KvStorage> = match &self.config.storage_path {
            Some(path) => SqliteStorage::new(path).await?,
            None => MemoryStorage::new(),
        };
        let connector = Arc::new(TendermintConnector::new(&self.config)?);
        self.build_with(connector, storage).await
    }

    /// Build a session manager over the given connector and storage.
    pub async fn build_with(
        self,
        connector: Arc<dyn RpcConnector>,
        storage: Arc<dyn KvStorage>,
    ) -> anyhow::Result<SessionManager> {
        storage.health_check().await?;
        let manager = SessionManager::new(connector, storage, &self.config);
        let known = manager.endpoints().seed_presets(&self.config.preset_endpoints).await?;
        info!("Explorer ready with {} known endpoints", known.len());
        Ok(manager)
    }
}

impl Default for ExplorerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
