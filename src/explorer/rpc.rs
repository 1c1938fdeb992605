//! RPC transport abstraction.
//!
//! `RpcConnector` creates transports for an endpoint URL and can probe an
//! endpoint without opening a session. `RpcTransport` is one live connection
//! to a node. Events for subscriptions are pushed by the transport onto
//! channels, so everything above this layer can be exercised without a
//! network by substituting a scripted connector.

use crate::explorer::types::{ChainEventReceiver, EventKind, ExplorerConfig};
use crate::explorer::wire;
use crate::explorer::ws_client::WsTransport;
use crate::types::{AbciQueryResponse, BlockFeedEntry, IndexedTx, NodeStatus, TxSearchPage};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// A live connection to a chain node.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Endpoint this transport is connected to.
    fn endpoint(&self) -> &str;

    async fn status(&self) -> Result<NodeStatus>;

    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<AbciQueryResponse>;

    /// Block at `height`, or the latest block when `None`.
    async fn block(&self, height: Option<u64>) -> Result<BlockFeedEntry>;

    /// Transaction by uppercase or lowercase hex hash.
    async fn tx(&self, hash: &str) -> Result<IndexedTx>;

    /// Paged transaction search, newest first. `page` is 1-based.
    async fn tx_search(&self, query: &str, page: u32, per_page: u32) -> Result<TxSearchPage>;

    /// Starts an event subscription. Events are delivered in node order.
    async fn subscribe(&self, kind: EventKind) -> Result<ChainEventReceiver>;

    /// Releases the connection. Idempotent.
    async fn close(&self);
}

/// Factory for transports.
#[async_trait]
pub trait RpcConnector: Send + Sync {
    /// Lightweight liveness check: fetches node status without opening a session.
    async fn probe_status(&self, url: &str) -> Result<NodeStatus>;

    /// Opens a live transport to `url`.
    async fn open(&self, url: &str) -> Result<Arc<dyn RpcTransport>>;
}

/// Converts an http(s) RPC address into the node's websocket address.
pub fn websocket_url(url: &str) -> Result<String> {
    let base = url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(anyhow!("Unsupported RPC address scheme: {}", url));
    };

    if ws.ends_with("/websocket") {
        Ok(ws)
    } else {
        Ok(format!("{}/websocket", ws))
    }
}

/// Connector for Tendermint/CometBFT nodes: HTTP JSON-RPC for probes,
/// websocket JSON-RPC for sessions.
pub struct TendermintConnector {
    http_client: Client,
    request_timeout: Duration,
    event_channel_capacity: usize,
}

impl TendermintConnector {
    pub fn new(config: &ExplorerConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.validate_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            request_timeout: config.request_timeout(),
            event_channel_capacity: config.event_channel_capacity.max(1),
        })
    }
}

#[async_trait]
impl RpcConnector for TendermintConnector {
    #[instrument(skip(self), fields(endpoint = %url))]
    async fn probe_status(&self, url: &str) -> Result<NodeStatus> {
        let body = wire::request(0, "status", serde_json::json!({}));
        let response = self
            .http_client
            .post(url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .context("Status request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Status request returned HTTP {}", response.status()));
        }

        let envelope: wire::JsonRpcResponse = response
            .json()
            .await
            .context("Status response is not JSON-RPC")?;
        let result = envelope.into_result().map_err(|e| anyhow!("Status query failed: {}", e))?;
        let status = wire::parse_status(result)?;

        debug!("Probed {}: chain {} at height {}", url, status.chain_id, status.latest_block_height);
        Ok(status)
    }

    #[instrument(skip(self), fields(endpoint = %url))]
    async fn open(&self, url: &str) -> Result<Arc<dyn RpcTransport>> {
        let transport = WsTransport::connect(url, self.request_timeout, self.event_channel_capacity).await?;
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url() {
        assert_eq!(
            websocket_url("https://mainnet-rpc.paxinet.io").unwrap(),
            "wss://mainnet-rpc.paxinet.io/websocket"
        );
        assert_eq!(
            websocket_url("http://localhost:26657/").unwrap(),
            "ws://localhost:26657/websocket"
        );
        assert_eq!(
            websocket_url("ws://localhost:26657/websocket").unwrap(),
            "ws://localhost:26657/websocket"
        );
        assert!(websocket_url("localhost:26657").is_err());
    }

    #[tokio::test]
    async fn test_probe_unreachable_endpoint_errors() {
        let connector = TendermintConnector::new(&ExplorerConfig::default()).unwrap();
        assert!(connector.probe_status("http://127.0.0.1:1").await.is_err());
    }
}
