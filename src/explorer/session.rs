//! Session client - the single live connection to a chain RPC endpoint.

use crate::explorer::feed::SubscriptionHandle;
use crate::explorer::rpc::{RpcConnector, RpcTransport};
use crate::explorer::types::{ChainEventReceiver, EventKind, ExplorerError};
use crate::types::{AbciQueryResponse, BlockFeedEntry, IndexedTx, NodeStatus, TxSearchPage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// An open session. Queries fail per call with `Query` and never tear the
/// session down. `close` cancels every subscription bound to the session
/// before releasing the transport.
pub struct SessionClient {
    url: String,
    transport: Arc<dyn RpcTransport>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("url", &self.url)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Opens a transport to `url` within `open_timeout`.
    #[instrument(skip(connector, open_timeout), fields(endpoint = %url))]
    pub async fn open(
        connector: &dyn RpcConnector,
        url: &str,
        open_timeout: Duration,
    ) -> Result<Arc<Self>, ExplorerError> {
        let transport = match timeout(open_timeout, connector.open(url)).await {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                warn!("Failed to open session to {}: {:#}", url, e);
                return Err(ExplorerError::Connection {
                    url: url.to_string(),
                    reason: format!("{:#}", e),
                });
            }
            Err(_) => {
                warn!("Opening session to {} timed out after {:?}", url, open_timeout);
                return Err(ExplorerError::Connection {
                    url: url.to_string(),
                    reason: format!("timed out after {:?}", open_timeout),
                });
            }
        };

        info!("Session opened to {}", url);
        Ok(Arc::new(Self {
            url: url.to_string(),
            transport,
            subscriptions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ExplorerError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ExplorerError::NotConnected)
        }
    }

    pub async fn status(&self) -> Result<NodeStatus, ExplorerError> {
        self.ensure_open()?;
        self.transport.status().await.map_err(query_error)
    }

    /// Block at `height`, or the latest block.
    pub async fn block(&self, height: Option<u64>) -> Result<BlockFeedEntry, ExplorerError> {
        self.ensure_open()?;
        self.transport.block(height).await.map_err(query_error)
    }

    pub async fn tx(&self, hash: &str) -> Result<IndexedTx, ExplorerError> {
        self.ensure_open()?;
        self.transport.tx(hash.trim()).await.map_err(query_error)
    }

    pub async fn tx_search(&self, query: &str, page: u32, per_page: u32) -> Result<TxSearchPage, ExplorerError> {
        self.ensure_open()?;
        self.transport
            .tx_search(query, page, per_page)
            .await
            .map_err(query_error)
    }

    pub async fn abci_query(&self, path: &str, data: &[u8]) -> Result<AbciQueryResponse, ExplorerError> {
        self.ensure_open()?;
        self.transport.abci_query(path, data).await.map_err(query_error)
    }

    /// Raw event stream for `kind`. Feeds wrap this in a consumer task.
    pub async fn subscribe_events(&self, kind: EventKind) -> Result<ChainEventReceiver, ExplorerError> {
        self.ensure_open()?;
        self.transport.subscribe(kind).await.map_err(query_error)
    }

    /// Binds `handle` to this session so that `close` cancels it. A handle
    /// tracked after close is cancelled immediately.
    pub fn track(&self, handle: SubscriptionHandle) {
        let mut subs = self.subscriptions.lock().unwrap_or_else(|p| p.into_inner());
        if self.closed.load(Ordering::SeqCst) {
            handle.cancel();
            return;
        }
        subs.retain(|h| !h.is_cancelled());
        subs.push(handle);
    }

    /// Number of live subscriptions bound to this session.
    pub fn subscription_count(&self) -> usize {
        let subs = self.subscriptions.lock().unwrap_or_else(|p| p.into_inner());
        subs.iter().filter(|h| !h.is_cancelled()).count()
    }

    /// Cancels bound subscriptions, then releases the transport. Idempotent.
    pub async fn close(&self) {
        let handles = {
            let mut subs = self.subscriptions.lock().unwrap_or_else(|p| p.into_inner());
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *subs)
        };
        for handle in &handles {
            handle.cancel();
        }
        self.transport.close().await;
        info!("Session to {} closed ({} subscriptions cancelled)", self.url, handles.len());
    }
}

fn query_error(e: anyhow::Error) -> ExplorerError {
    ExplorerError::Query(format!("{:#}", e))
}
