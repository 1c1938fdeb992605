//! Configuration, connection state and error types for the explorer core.

use crate::types::ChainEvent;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the session and connection APIs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplorerError {
    /// Connect input was empty after trimming.
    #[error("RPC address must not be empty")]
    EmptyEndpoint,
    /// The liveness pre-check against the endpoint failed.
    #[error("cannot connect to {url}: endpoint failed validation")]
    Validation { url: String },
    /// The endpoint passed validation but the transport could not be opened.
    #[error("cannot connect to {url}: {reason}")]
    Connection { url: String, reason: String },
    /// A request against an open session failed.
    #[error("query failed: {0}")]
    Query(String),
    /// A payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
    /// No session is currently open.
    #[error("not connected")]
    NotConnected,
    /// A newer connect request replaced this one before it finished.
    #[error("connect to {url} was superseded by a newer request")]
    Superseded { url: String },
    /// The endpoint store could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ExplorerError {
    /// True for failures that leave the application in the connection error state.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, ExplorerError::Validation { .. } | ExplorerError::Connection { .. })
    }
}

/// Lifecycle of the single application session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No session and no subscriptions.
    #[default]
    Disconnected,
    /// Validation and open are in flight for `url`.
    Connecting { url: String },
    /// A session is open against `url` and both feeds are subscribed.
    Connected { url: String },
    /// The last connect attempt failed. No session is held.
    Error { url: String, message: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    /// Endpoint the state refers to, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            ConnectionState::Disconnected => None,
            ConnectionState::Connecting { url }
            | ConnectionState::Connected { url }
            | ConnectionState::Error { url, .. } => Some(url),
        }
    }
}

/// Change notifications published by the live feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    BlockAdded { height: u64 },
    TxAdded { hash: String },
    /// Buffers were cleared for a new session.
    Reset,
}

/// Which event stream a subscription follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewBlock,
    Tx,
}

impl EventKind {
    /// Tendermint subscription query for this stream.
    pub fn query(&self) -> &'static str {
        match self {
            EventKind::NewBlock => "tm.event='NewBlock'",
            EventKind::Tx => "tm.event='Tx'",
        }
    }
}

/// Named quick-connect endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetEndpoint {
    pub name: String,
    pub rpc: String,
}

impl PresetEndpoint {
    pub fn new(name: &str, rpc: &str) -> Self {
        Self {
            name: name.to_string(),
            rpc: rpc.to_string(),
        }
    }
}

/// Explorer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Maximum entries retained in each feed buffer
    pub feed_capacity: usize,
    /// Liveness check timeout in milliseconds
    pub validate_timeout_ms: u64,
    /// Transport open timeout in milliseconds
    pub open_timeout_ms: u64,
    /// Per-request timeout on an open session in milliseconds
    pub request_timeout_ms: u64,
    /// Capacity of each subscription event channel
    pub event_channel_capacity: usize,
    /// SQLite file for the endpoint store; in-memory when unset
    pub storage_path: Option<String>,
    /// Quick-connect endpoints merged into the known endpoint list
    pub preset_endpoints: Vec<PresetEndpoint>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            feed_capacity: 20,
            validate_timeout_ms: 5_000,
            open_timeout_ms: 10_000,
            request_timeout_ms: 15_000,
            event_channel_capacity: 256,
            storage_path: None,
            preset_endpoints: vec![
                PresetEndpoint::new("Paxi Mainnet", "https://mainnet-rpc.paxinet.io"),
                PresetEndpoint::new("Paxi Testnet", "https://testnet-rpc.paxinet.io"),
                PresetEndpoint::new("Local Testnet", "http://127.0.0.1:26657"),
            ],
        }
    }
}

impl ExplorerConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn validate_timeout(&self) -> Duration {
        Duration::from_millis(self.validate_timeout_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Endpoint used when nothing has been recorded yet.
    pub fn fallback_endpoint(&self) -> Option<&str> {
        self.preset_endpoints.first().map(|p| p.rpc.as_str())
    }
}

// --- Communication channels for live events ---

/// Channel carrying events from a transport to a feed consumer.
pub type ChainEventSender = tokio::sync::mpsc::Sender<ChainEvent>;
pub type ChainEventReceiver = tokio::sync::mpsc::Receiver<ChainEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ExplorerConfig::default();
        assert_eq!(config.feed_capacity, 20);
        assert_eq!(config.validate_timeout(), Duration::from_secs(5));
        assert_eq!(config.fallback_endpoint(), Some("https://mainnet-rpc.paxinet.io"));
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: ExplorerConfig =
            serde_json::from_str(r#"{"feed_capacity": 5, "storage_path": "/tmp/x.db"}"#).unwrap();
        assert_eq!(config.feed_capacity, 5);
        assert_eq!(config.storage_path.as_deref(), Some("/tmp/x.db"));
        assert_eq!(config.open_timeout_ms, 10_000);
        assert_eq!(config.preset_endpoints.len(), 3);
    }

    #[test]
    fn test_connection_state_url() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Disconnected.url(), None);
        let state = ConnectionState::Connected { url: "http://a".to_string() };
        assert!(state.is_connected());
        assert_eq!(state.url(), Some("http://a"));
    }

    #[test]
    fn test_connect_failure_classification() {
        assert!(ExplorerError::Validation { url: "x".into() }.is_connect_failure());
        assert!(ExplorerError::Connection { url: "x".into(), reason: "y".into() }.is_connect_failure());
        assert!(!ExplorerError::Query("boom".into()).is_connect_failure());
    }
}
