//! Live feed - bounded newest-first buffers of blocks and transactions.
//!
//! Each subscription runs one consumer task that drains the session's event
//! channel and applies the insertion rule under the feed lock. Every apply
//! re-checks the subscription's cancellation token and the feed epoch while
//! holding the lock, so an event from a superseded session can never land
//! after the buffers were reset for a new one.

use crate::explorer::decode::{decode_tx_body, tx_hash};
use crate::explorer::session::SessionClient;
use crate::explorer::types::{ChainEventReceiver, EventKind, ExplorerError, FeedUpdate};
use crate::types::{BlockFeedEntry, ChainEvent, TxEvent, TxFeedEntry};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Newest-first buffer holding at most `capacity` entries. Existing entries
/// are never reordered: inserts prepend, then the tail is truncated.
#[derive(Debug, Clone)]
pub struct FeedBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> FeedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn head(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Snapshot, newest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn push_front(&mut self, entry: T) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }
}

impl FeedBuffer<BlockFeedEntry> {
    /// Accepts the block only if it is strictly above the current head.
    pub fn insert_block(&mut self, entry: BlockFeedEntry) -> bool {
        if let Some(head) = self.head() {
            if entry.height <= head.height {
                return false;
            }
        }
        self.push_front(entry);
        true
    }
}

impl FeedBuffer<TxFeedEntry> {
    /// Accepts the transaction only if its hash is not already buffered.
    pub fn insert_tx(&mut self, entry: TxFeedEntry) -> bool {
        if self.entries.iter().any(|existing| existing.hash == entry.hash) {
            return false;
        }
        self.push_front(entry);
        true
    }
}

/// Cancellable handle for one feed subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    kind: EventKind,
    token: CancellationToken,
}

impl SubscriptionHandle {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            token: CancellationToken::new(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Stops buffer mutation from this subscription. Buffered entries stay.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

struct FeedState {
    epoch: u64,
    blocks: FeedBuffer<BlockFeedEntry>,
    txs: FeedBuffer<TxFeedEntry>,
}

/// Shared block and transaction buffers for the active session.
pub struct LiveFeed {
    state: RwLock<FeedState>,
    updates: broadcast::Sender<FeedUpdate>,
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Arc::new(Self {
            state: RwLock::new(FeedState {
                epoch: 0,
                blocks: FeedBuffer::new(capacity),
                txs: FeedBuffer::new(capacity),
            }),
            updates,
        })
    }

    /// Buffered blocks, newest first.
    pub async fn blocks(&self) -> Vec<BlockFeedEntry> {
        self.state.read().await.blocks.to_vec()
    }

    /// Buffered transactions, newest first.
    pub async fn txs(&self) -> Vec<TxFeedEntry> {
        self.state.read().await.txs.to_vec()
    }

    pub async fn latest_block(&self) -> Option<BlockFeedEntry> {
        self.state.read().await.blocks.head().cloned()
    }

    pub async fn epoch(&self) -> u64 {
        self.state.read().await.epoch
    }

    /// Change notifications. Lagging receivers miss updates, not entries:
    /// the buffers remain the source of truth.
    pub fn updates(&self) -> broadcast::Receiver<FeedUpdate> {
        self.updates.subscribe()
    }

    /// Clears both buffers and starts a new epoch. Consumers bound to an
    /// older epoch stop mutating the buffers.
    pub async fn reset(&self) -> u64 {
        let mut state = self.state.write().await;
        state.epoch += 1;
        state.blocks.clear();
        state.txs.clear();
        let _ = self.updates.send(FeedUpdate::Reset);
        debug!("Feed reset, epoch {}", state.epoch);
        state.epoch
    }

    /// Subscribes the block buffer to `session`'s new-block events.
    pub async fn subscribe_blocks(self: &Arc<Self>, session: &SessionClient) -> Result<SubscriptionHandle, ExplorerError> {
        self.subscribe(session, EventKind::NewBlock).await
    }

    /// Subscribes the transaction buffer to `session`'s transaction events.
    pub async fn subscribe_txs(self: &Arc<Self>, session: &SessionClient) -> Result<SubscriptionHandle, ExplorerError> {
        self.subscribe(session, EventKind::Tx).await
    }

    async fn subscribe(self: &Arc<Self>, session: &SessionClient, kind: EventKind) -> Result<SubscriptionHandle, ExplorerError> {
        let epoch = self.epoch().await;
        let events = session.subscribe_events(kind).await?;
        let handle = SubscriptionHandle::new(kind);
        session.track(handle.clone());
        spawn_consumer(self.clone(), epoch, handle.token(), events);
        debug!("Feed subscribed to {:?} on {} (epoch {})", kind, session.url(), epoch);
        Ok(handle)
    }

    pub(crate) async fn apply_block(&self, epoch: u64, token: &CancellationToken, entry: BlockFeedEntry) -> bool {
        let mut state = self.state.write().await;
        if token.is_cancelled() || state.epoch != epoch {
            debug!("Dropping stale block {} (epoch {})", entry.height, epoch);
            return false;
        }
        let height = entry.height;
        if !state.blocks.insert_block(entry) {
            debug!("Dropping out-of-order block {}", height);
            return false;
        }
        let _ = self.updates.send(FeedUpdate::BlockAdded { height });
        true
    }

    pub(crate) async fn apply_tx(&self, epoch: u64, token: &CancellationToken, entry: TxFeedEntry) -> bool {
        let mut state = self.state.write().await;
        if token.is_cancelled() || state.epoch != epoch {
            debug!("Dropping stale tx {} (epoch {})", entry.hash, epoch);
            return false;
        }
        let hash = entry.hash.clone();
        if !state.txs.insert_tx(entry) {
            debug!("Dropping duplicate tx {}", hash);
            return false;
        }
        let _ = self.updates.send(FeedUpdate::TxAdded { hash });
        true
    }
}

/// Builds a feed entry from a raw transaction event. Undecodable bodies are
/// kept with `body: None` so ordering and dedup are unaffected.
pub fn tx_feed_entry(event: TxEvent) -> TxFeedEntry {
    let hash = tx_hash(&event.tx);
    let body = match decode_tx_body(&event.tx) {
        Ok(body) => Some(body),
        Err(e) => {
            warn!("Failed to decode tx {} at height {}: {}", hash, event.height, e);
            None
        }
    };
    TxFeedEntry {
        hash,
        height: event.height,
        body,
        code: event.code,
        observed_at: Utc::now(),
    }
}

fn spawn_consumer(feed: Arc<LiveFeed>, epoch: u64, token: CancellationToken, mut events: ChainEventReceiver) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Some(ChainEvent::NewBlock(block)) => {
                        feed.apply_block(epoch, &token, block).await;
                    }
                    Some(ChainEvent::Tx(tx)) => {
                        let entry = tx_feed_entry(tx);
                        feed.apply_tx(epoch, &token, entry).await;
                    }
                    None => break,
                }
            }
        }
        debug!("Feed consumer exiting (epoch {})", epoch);
    });
}
