//! Websocket JSON-RPC transport for Tendermint/CometBFT nodes.
//!
//! One reader task routes incoming frames: responses are matched to pending
//! requests by id, subscription events are forwarded to the subscriber's
//! channel (the node tags events with the id of the subscribe request). One
//! writer task owns the sink. Closing the transport cancels both tasks and
//! drops every subscription sender, which ends the subscribers' streams.

use crate::explorer::rpc::{websocket_url, RpcTransport};
use crate::explorer::types::{ChainEventReceiver, ChainEventSender, EventKind};
use crate::explorer::wire::{self, JsonRpcResponse};
use crate::types::{AbciQueryResponse, BlockFeedEntry, ChainEvent, IndexedTx, NodeStatus, TxSearchPage};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, String>>>;

struct Routes {
    pending: Mutex<PendingMap>,
    subscriptions: Mutex<HashMap<u64, (EventKind, ChainEventSender)>>,
    outgoing: mpsc::UnboundedSender<WsMessage>,
}

impl Routes {
    fn new(outgoing: mpsc::UnboundedSender<WsMessage>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            outgoing,
        }
    }

    /// Never blocks on a subscriber: a full channel loses the event, a closed
    /// one loses the route.
    async fn dispatch(&self, text: &str) {
        let response: JsonRpcResponse = match serde_json::from_str(text) {
            Ok(r) => r,
            Err(e) => {
                warn!("Ignoring malformed frame: {}", e);
                return;
            }
        };
        let Some(id) = response.numeric_id() else {
            debug!("Ignoring frame without numeric id");
            return;
        };

        if let Some(waiter) = self.pending.lock().await.remove(&id) {
            let _ = waiter.send(response.into_result());
            return;
        }

        let route = self.subscriptions.lock().await.get(&id).map(|(kind, tx)| (*kind, tx.clone()));
        let Some((kind, sender)) = route else {
            debug!("No route for frame with id {}", id);
            return;
        };

        let data = match response.into_result() {
            Ok(result) => result.get("data").and_then(|d| d.get("value")).cloned(),
            Err(e) => {
                warn!("Subscription {} reported an error: {}", id, e);
                None
            }
        };
        let Some(value) = data else {
            return;
        };

        let event = match kind {
            EventKind::NewBlock => wire::parse_new_block_event(value).map(ChainEvent::NewBlock),
            EventKind::Tx => wire::parse_tx_event(value).map(ChainEvent::Tx),
        };
        match event {
            Ok(event) => match sender.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Subscriber for {:?} is lagging, dropping event", kind),
                Err(TrySendError::Closed(_)) => self.drop_route(id, kind).await,
            },
            Err(e) => warn!("Dropping undecodable {:?} event: {:#}", kind, e),
        }
    }

    /// Removes route `id` and unsubscribes from the node once no route of the
    /// same kind is left.
    async fn drop_route(&self, id: u64, kind: EventKind) {
        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions.remove(&id);
        let still_wanted = subscriptions.values().any(|(k, _)| *k == kind);
        drop(subscriptions);

        debug!("Subscriber for {:?} went away, dropping route {}", kind, id);
        if !still_wanted {
            let body = wire::request(id, "unsubscribe", json!({ "query": kind.query() }));
            if self.outgoing.send(WsMessage::Text(body.into())).is_err() {
                debug!("Writer already stopped, skipping unsubscribe for {}", kind.query());
            }
        }
    }

    async fn fail_all(&self, reason: &str) {
        for (_, waiter) in self.pending.lock().await.drain() {
            let _ = waiter.send(Err(reason.to_string()));
        }
        self.subscriptions.lock().await.clear();
    }
}

/// Websocket transport to one node.
pub struct WsTransport {
    endpoint: String,
    outgoing: mpsc::UnboundedSender<WsMessage>,
    routes: Arc<Routes>,
    next_id: AtomicU64,
    request_timeout: Duration,
    event_channel_capacity: usize,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl WsTransport {
    /// Connects to the websocket endpoint derived from `url`.
    #[instrument(skip(request_timeout, event_channel_capacity), fields(endpoint = %url))]
    pub async fn connect(url: &str, request_timeout: Duration, event_channel_capacity: usize) -> Result<Arc<Self>> {
        let ws_url = websocket_url(url)?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .with_context(|| format!("Failed to open websocket {}", ws_url))?;
        let (mut write, mut read) = ws_stream.split();

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<WsMessage>();
        let routes = Arc::new(Routes::new(outgoing.clone()));
        let shutdown = CancellationToken::new();

        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                    msg = outgoing_rx.recv() => match msg {
                        Some(msg) => {
                            if let Err(e) = write.send(msg).await {
                                warn!("Websocket write failed: {}", e);
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        });

        let reader_routes = routes.clone();
        let reader_shutdown = shutdown.clone();
        let reader_endpoint = url.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_shutdown.cancelled() => break,
                    msg = read.next() => match msg {
                        Some(Ok(WsMessage::Text(text))) => reader_routes.dispatch(text.as_str()).await,
                        Some(Ok(WsMessage::Close(_))) | None => {
                            info!("Websocket to {} closed by remote", reader_endpoint);
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("Websocket read error from {}: {}", reader_endpoint, e);
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
            reader_routes.fail_all("connection closed").await;
            reader_shutdown.cancel();
        });

        info!("Websocket session opened to {}", ws_url);
        Ok(Arc::new(Self {
            endpoint: url.to_string(),
            outgoing,
            routes,
            next_id: AtomicU64::new(1),
            request_timeout,
            event_channel_capacity,
            shutdown,
            closed: AtomicBool::new(false),
        }))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.call_with_id(id, method, params).await
    }

    async fn call_with_id(&self, id: u64, method: &str, params: Value) -> Result<Value> {
        if self.shutdown.is_cancelled() {
            return Err(anyhow!("Connection to {} is closed", self.endpoint));
        }

        let (tx, rx) = oneshot::channel();
        self.routes.pending.lock().await.insert(id, tx);

        let body = wire::request(id, method, params);
        if self.outgoing.send(WsMessage::Text(body.into())).is_err() {
            self.routes.pending.lock().await.remove(&id);
            return Err(anyhow!("Connection to {} is closed", self.endpoint));
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(anyhow!("{} failed: {}", method, message)),
            Ok(Err(_)) => Err(anyhow!("Connection closed while waiting for {}", method)),
            Err(_) => {
                self.routes.pending.lock().await.remove(&id);
                Err(anyhow!("{} timed out after {:?}", method, self.request_timeout))
            }
        }
    }
}

#[async_trait]
impl RpcTransport for WsTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn status(&self) -> Result<NodeStatus> {
        let result = self.call("status", json!({})).await?;
        wire::parse_status(result)
    }

    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<AbciQueryResponse> {
        let params = json!({
            "path": path,
            "data": hex::encode(data),
            "height": "0",
            "prove": false,
        });
        let result = self.call("abci_query", params).await?;
        wire::parse_abci_query(result)
    }

    async fn block(&self, height: Option<u64>) -> Result<BlockFeedEntry> {
        let params = match height {
            Some(h) => json!({ "height": h.to_string() }),
            None => json!({}),
        };
        let result = self.call("block", params).await?;
        wire::parse_block(result)
    }

    async fn tx(&self, hash: &str) -> Result<IndexedTx> {
        let bytes = hex::decode(hash).with_context(|| format!("Invalid transaction hash {}", hash))?;
        let params = json!({
            "hash": general_purpose::STANDARD.encode(bytes),
            "prove": false,
        });
        let result = self.call("tx", params).await?;
        wire::parse_indexed_tx(result)
    }

    async fn tx_search(&self, query: &str, page: u32, per_page: u32) -> Result<TxSearchPage> {
        let params = json!({
            "query": query,
            "prove": false,
            "page": page.max(1).to_string(),
            "per_page": per_page.max(1).to_string(),
            "order_by": "desc",
        });
        let result = self.call("tx_search", params).await?;
        wire::parse_tx_search(result)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn subscribe(&self, kind: EventKind) -> Result<ChainEventReceiver> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.event_channel_capacity);
        self.routes.subscriptions.lock().await.insert(id, (kind, tx));

        if let Err(e) = self.call_with_id(id, "subscribe", json!({ "query": kind.query() })).await {
            self.routes.subscriptions.lock().await.remove(&id);
            return Err(e.context(format!("Subscribe to {} failed", kind.query())));
        }

        debug!("Subscribed to {} with id {}", kind.query(), id);
        Ok(rx)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        self.routes.fail_all("connection closed").await;
        info!("Websocket session to {} closed", self.endpoint);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> (Routes, mpsc::UnboundedReceiver<WsMessage>) {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        (Routes::new(outgoing), outgoing_rx)
    }

    async fn route(routes: &Routes, id: u64, kind: EventKind, capacity: usize) -> ChainEventReceiver {
        let (tx, rx) = mpsc::channel(capacity);
        routes.subscriptions.lock().await.insert(id, (kind, tx));
        rx
    }

    fn new_block_frame(id: u64, height: u64) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "query": "tm.event='NewBlock'",
                "data": {
                    "type": "tendermint/event/NewBlock",
                    "value": {
                        "block": {
                            "header": {
                                "chain_id": "paxi-mainnet",
                                "height": height.to_string(),
                                "time": "2024-05-01T12:00:00Z",
                                "app_hash": "deadbeef"
                            },
                            "data": { "txs": [general_purpose::STANDARD.encode(b"tx-one")] }
                        },
                        "result_finalize_block": {}
                    }
                },
                "events": { "tm.event": ["NewBlock"] }
            }
        })
        .to_string()
    }

    fn tx_frame(id: u64) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "query": "tm.event='Tx'",
                "data": {
                    "type": "tendermint/event/Tx",
                    "value": {
                        "TxResult": {
                            "height": "55",
                            "index": 2,
                            "tx": general_purpose::STANDARD.encode(b"raw"),
                            "result": { "code": 0, "log": "", "gas_wanted": "200", "gas_used": "150" }
                        }
                    }
                },
                "events": { "tm.event": ["Tx"] }
            }
        })
        .to_string()
    }

    fn sent_text(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> Option<Value> {
        match rx.try_recv().ok()? {
            WsMessage::Text(text) => serde_json::from_str(text.as_str()).ok(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_response_is_routed_to_pending_waiter_by_id() {
        let (routes, _outgoing) = routes();
        let (tx_one, rx_one) = oneshot::channel();
        let (tx_two, mut rx_two) = oneshot::channel();
        routes.pending.lock().await.insert(1, tx_one);
        routes.pending.lock().await.insert(2, tx_two);

        routes
            .dispatch(r#"{"jsonrpc":"2.0","id":1,"result":{"node_info":{"network":"paxi-mainnet"}}}"#)
            .await;

        let value = rx_one.await.unwrap().unwrap();
        assert_eq!(value["node_info"]["network"], "paxi-mainnet");
        assert!(rx_two.try_recv().is_err());
        assert!(routes.pending.lock().await.contains_key(&2));
    }

    #[tokio::test]
    async fn test_error_response_fails_waiter() {
        let (routes, _outgoing) = routes();
        let (tx, rx) = oneshot::channel();
        routes.pending.lock().await.insert(7, tx);

        routes
            .dispatch(r#"{"jsonrpc":"2.0","id":"7","error":{"code":-32603,"message":"Internal error","data":"tx not found"}}"#)
            .await;

        let message = rx.await.unwrap().unwrap_err();
        assert!(message.contains("tx not found"));
    }

    #[tokio::test]
    async fn test_events_are_forwarded_to_matching_subscription() {
        let (routes, _outgoing) = routes();
        let mut blocks = route(&routes, 3, EventKind::NewBlock, 8).await;
        let mut txs = route(&routes, 4, EventKind::Tx, 8).await;

        routes.dispatch(&new_block_frame(3, 100)).await;
        routes.dispatch(&tx_frame(4)).await;

        match blocks.try_recv().unwrap() {
            ChainEvent::NewBlock(block) => {
                assert_eq!(block.height, 100);
                assert_eq!(block.chain_id, "paxi-mainnet");
            }
            other => panic!("expected a block, got {:?}", other),
        }
        match txs.try_recv().unwrap() {
            ChainEvent::Tx(tx) => {
                assert_eq!(tx.height, 55);
                assert_eq!(tx.tx, b"raw".to_vec());
            }
            other => panic!("expected a tx, got {:?}", other),
        }
        assert!(blocks.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frames_without_route_or_payload_are_ignored() {
        let (routes, _outgoing) = routes();
        let mut blocks = route(&routes, 3, EventKind::NewBlock, 8).await;

        routes.dispatch("not json").await;
        routes.dispatch(r#"{"jsonrpc":"2.0","id":3,"result":{}}"#).await;
        routes.dispatch(&new_block_frame(99, 100)).await;

        assert!(blocks.try_recv().is_err());
        assert_eq!(routes.subscriptions.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_full_subscriber_loses_event_but_keeps_route() {
        let (routes, mut outgoing) = routes();
        let mut blocks = route(&routes, 3, EventKind::NewBlock, 1).await;

        routes.dispatch(&new_block_frame(3, 1)).await;
        routes.dispatch(&new_block_frame(3, 2)).await;

        assert!(matches!(blocks.try_recv().unwrap(), ChainEvent::NewBlock(b) if b.height == 1));
        assert!(blocks.try_recv().is_err());
        assert!(routes.subscriptions.lock().await.contains_key(&3));
        assert!(sent_text(&mut outgoing).is_none());

        routes.dispatch(&new_block_frame(3, 3)).await;
        assert!(matches!(blocks.try_recv().unwrap(), ChainEvent::NewBlock(b) if b.height == 3));
    }

    #[tokio::test]
    async fn test_dropped_receiver_removes_route_and_unsubscribes() {
        let (routes, mut outgoing) = routes();
        let first = route(&routes, 3, EventKind::NewBlock, 8).await;
        let second = route(&routes, 5, EventKind::NewBlock, 8).await;

        drop(first);
        routes.dispatch(&new_block_frame(3, 10)).await;
        assert!(!routes.subscriptions.lock().await.contains_key(&3));
        // another NewBlock route is still live
        assert!(sent_text(&mut outgoing).is_none());

        drop(second);
        routes.dispatch(&new_block_frame(5, 11)).await;
        assert!(routes.subscriptions.lock().await.is_empty());

        let request = sent_text(&mut outgoing).unwrap();
        assert_eq!(request["method"], "unsubscribe");
        assert_eq!(request["params"]["query"], "tm.event='NewBlock'");
    }

    #[tokio::test]
    async fn test_fail_all_fails_waiters_and_ends_streams() {
        let (routes, _outgoing) = routes();
        let (tx, rx) = oneshot::channel();
        routes.pending.lock().await.insert(1, tx);
        let mut blocks = route(&routes, 2, EventKind::NewBlock, 8).await;

        routes.fail_all("connection closed").await;

        assert_eq!(rx.await.unwrap(), Err("connection closed".to_string()));
        assert!(routes.pending.lock().await.is_empty());
        assert!(routes.subscriptions.lock().await.is_empty());
        assert!(blocks.recv().await.is_none());
    }
}
