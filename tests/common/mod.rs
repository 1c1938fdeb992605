//! Scripted connector and transport for driving the explorer without a network.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use paxi_explorer::explorer::decode::{Coin, MsgSend, ProtoAny, TxBody, TxRaw, MSG_SEND};
use paxi_explorer::explorer::{
    ChainEventReceiver, ChainEventSender, EventKind, KvStorage, MemoryStorage, RpcConnector, RpcTransport,
};
use paxi_explorer::types::{
    AbciQueryResponse, BlockFeedEntry, ChainEvent, IndexedTx, NodeStatus, TxEvent, TxSearchPage,
};
use prost::Message;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct Behavior {
    probe_fails: bool,
    open_fails: bool,
    subscribe_fails: bool,
    probe_delay: Option<Duration>,
    open_delay: Option<Duration>,
}

#[derive(Default)]
pub struct MockConnector {
    behaviors: Mutex<HashMap<String, Behavior>>,
    transports: Mutex<HashMap<String, Vec<Arc<MockTransport>>>>,
    abci_responses: Mutex<HashMap<String, AbciQueryResponse>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn update(&self, url: &str, f: impl FnOnce(&mut Behavior)) {
        let mut behaviors = self.behaviors.lock().unwrap();
        f(behaviors.entry(url.to_string()).or_default());
    }

    fn behavior(&self, url: &str) -> Behavior {
        self.behaviors.lock().unwrap().get(url).cloned().unwrap_or_default()
    }

    pub fn fail_probe(&self, url: &str) {
        self.update(url, |b| b.probe_fails = true);
    }

    pub fn fail_open(&self, url: &str) {
        self.update(url, |b| b.open_fails = true);
    }

    pub fn fail_subscribe(&self, url: &str) {
        self.update(url, |b| b.subscribe_fails = true);
    }

    pub fn delay_probe(&self, url: &str, delay: Duration) {
        self.update(url, |b| b.probe_delay = Some(delay));
    }

    pub fn delay_open(&self, url: &str, delay: Duration) {
        self.update(url, |b| b.open_delay = Some(delay));
    }

    pub fn set_abci_response(&self, path: &str, response: AbciQueryResponse) {
        self.abci_responses.lock().unwrap().insert(path.to_string(), response);
    }

    /// Most recently opened transport for `url`.
    pub fn transport(&self, url: &str) -> Option<Arc<MockTransport>> {
        self.transports.lock().unwrap().get(url).and_then(|list| list.last().cloned())
    }

    pub fn open_count(&self, url: &str) -> usize {
        self.transports.lock().unwrap().get(url).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait]
impl RpcConnector for MockConnector {
    async fn probe_status(&self, url: &str) -> Result<NodeStatus> {
        let behavior = self.behavior(url);
        if let Some(delay) = behavior.probe_delay {
            tokio::time::sleep(delay).await;
        }
        if behavior.probe_fails {
            return Err(anyhow!("connection refused"));
        }
        Ok(node_status(100))
    }

    async fn open(&self, url: &str) -> Result<Arc<dyn RpcTransport>> {
        let behavior = self.behavior(url);
        if let Some(delay) = behavior.open_delay {
            tokio::time::sleep(delay).await;
        }
        if behavior.open_fails {
            return Err(anyhow!("websocket handshake rejected"));
        }
        let transport = Arc::new(MockTransport {
            url: url.to_string(),
            subscribers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            subscribe_fails: behavior.subscribe_fails,
            abci_responses: self.abci_responses.lock().unwrap().clone(),
        });
        self.transports
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(transport.clone());
        Ok(transport)
    }
}

/// Transport whose events are pushed by the test. Senders stay alive after
/// `close`, so a pushed event models a straggler still in flight.
pub struct MockTransport {
    url: String,
    subscribers: Mutex<Vec<(EventKind, ChainEventSender)>>,
    closed: AtomicBool,
    subscribe_fails: bool,
    abci_responses: HashMap<String, AbciQueryResponse>,
}

impl MockTransport {
    async fn push(&self, kind: EventKind, event: ChainEvent) -> usize {
        let senders: Vec<ChainEventSender> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, tx)| tx.clone())
            .collect();
        let mut delivered = 0;
        for sender in senders {
            if sender.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Delivers a block to every live new-block subscriber.
    pub async fn push_block(&self, block: BlockFeedEntry) -> usize {
        self.push(EventKind::NewBlock, ChainEvent::NewBlock(block)).await
    }

    /// Delivers a transaction to every live tx subscriber.
    pub async fn push_tx(&self, tx: TxEvent) -> usize {
        self.push(EventKind::Tx, ChainEvent::Tx(tx)).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn status(&self) -> Result<NodeStatus> {
        if self.is_closed() {
            return Err(anyhow!("transport closed"));
        }
        Ok(node_status(100))
    }

    async fn abci_query(&self, path: &str, _data: &[u8]) -> Result<AbciQueryResponse> {
        self.abci_responses
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no handler for {}", path))
    }

    async fn block(&self, height: Option<u64>) -> Result<BlockFeedEntry> {
        Ok(block(height.unwrap_or(100)))
    }

    async fn tx(&self, hash: &str) -> Result<IndexedTx> {
        Err(anyhow!("tx {} not found", hash))
    }

    async fn tx_search(&self, _query: &str, _page: u32, _per_page: u32) -> Result<TxSearchPage> {
        Ok(TxSearchPage {
            txs: Vec::new(),
            total_count: 0,
        })
    }

    async fn subscribe(&self, kind: EventKind) -> Result<ChainEventReceiver> {
        if self.subscribe_fails {
            return Err(anyhow!("subscription limit reached"));
        }
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().unwrap().push((kind, tx));
        Ok(rx)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory storage whose writes take `delay` to land.
pub struct SlowStorage {
    inner: Arc<MemoryStorage>,
    delay: Duration,
}

impl SlowStorage {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStorage::new(),
            delay,
        })
    }
}

#[async_trait]
impl KvStorage for SlowStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

pub fn node_status(height: u64) -> NodeStatus {
    NodeStatus {
        chain_id: "paxi-mainnet".to_string(),
        moniker: "mock-node".to_string(),
        version: "0.38.0".to_string(),
        latest_block_height: height,
        latest_block_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        latest_block_hash: "AA".repeat(32),
        catching_up: false,
    }
}

pub fn block(height: u64) -> BlockFeedEntry {
    BlockFeedEntry {
        height,
        chain_id: "paxi-mainnet".to_string(),
        time: Utc.timestamp_opt(1_700_000_000 + height as i64, 0).unwrap(),
        app_hash: "BB".repeat(32),
        txs: Vec::new(),
    }
}

/// Encoded `TxRaw` carrying one bank send with the given memo.
pub fn raw_send_tx(memo: &str) -> Vec<u8> {
    let send = MsgSend {
        from_address: "paxi1sender".to_string(),
        to_address: "paxi1receiver".to_string(),
        amount: vec![Coin {
            denom: "upaxi".to_string(),
            amount: "1000".to_string(),
        }],
    };
    let body = TxBody {
        messages: vec![ProtoAny {
            type_url: MSG_SEND.to_string(),
            value: send.encode_to_vec(),
        }],
        memo: memo.to_string(),
        timeout_height: 0,
    };
    TxRaw {
        body_bytes: body.encode_to_vec(),
        auth_info_bytes: Vec::new(),
        signatures: vec![vec![1, 2, 3]],
    }
    .encode_to_vec()
}

pub fn tx_event(height: u64, raw: Vec<u8>) -> TxEvent {
    TxEvent {
        height,
        index: 0,
        tx: raw,
        code: 0,
        log: String::new(),
    }
}

/// Polls `check` until it returns true or two seconds elapse.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Lets spawned consumers drain their channels.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
