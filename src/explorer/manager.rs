//! Session manager - owner of the one active session and its lifecycle.
//!
//! Connect requests are sequenced: each request takes a new sequence number
//! and only the latest one may attach a session or change state. A request
//! that loses the race closes whatever it opened and reports `Superseded`.

use crate::explorer::endpoint_store::{normalize_endpoint, EndpointStore};
use crate::explorer::feed::LiveFeed;
use crate::explorer::rpc::RpcConnector;
use crate::explorer::session::SessionClient;
use crate::explorer::storage::KvStorage;
use crate::explorer::types::{ConnectionState, ExplorerConfig, ExplorerError};
use crate::explorer::validator::ConnectionValidator;
use crate::types::NodeStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{info, instrument, warn};

pub struct SessionManager {
    connector: Arc<dyn RpcConnector>,
    validator: ConnectionValidator,
    endpoints: EndpointStore,
    feed: Arc<LiveFeed>,
    open_timeout: Duration,
    seq: AtomicU64,
    session: Mutex<Option<Arc<SessionClient>>>,
    state: watch::Sender<ConnectionState>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn RpcConnector>, storage: Arc<dyn KvStorage>, config: &ExplorerConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            validator: ConnectionValidator::new(connector.clone(), config.validate_timeout()),
            connector,
            endpoints: EndpointStore::new(storage),
            feed: LiveFeed::new(config.feed_capacity),
            open_timeout: config.open_timeout(),
            seq: AtomicU64::new(0),
            session: Mutex::new(None),
            state,
        }
    }

    /// Validates, opens and attaches a session to `url`. When a session is
    /// already open this is a switch: the old session is closed first.
    #[instrument(skip(self))]
    pub async fn connect(&self, url: &str) -> Result<Arc<SessionClient>, ExplorerError> {
        let url = normalize_endpoint(url);
        if url.is_empty() {
            return Err(ExplorerError::EmptyEndpoint);
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = self.session.lock().await.take();
        if let Some(old) = previous {
            info!("Closing session to {} before connecting to {}", old.url(), url);
            old.close().await;
        }
        self.set_state_if_current(seq, ConnectionState::Connecting { url: url.clone() });

        if !self.validator.validate(&url).await {
            return Err(self.fail(seq, ExplorerError::Validation { url }));
        }
        if !self.is_current(seq) {
            return Err(ExplorerError::Superseded { url });
        }

        let session = match SessionClient::open(self.connector.as_ref(), &url, self.open_timeout).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(seq, e)),
        };

        let mut slot = self.session.lock().await;
        if !self.is_current(seq) {
            drop(slot);
            return Err(self.discard(session, url).await);
        }

        self.feed.reset().await;
        if let Err(e) = self.attach_feeds(&session).await {
            session.close().await;
            let reason = e.to_string();
            return Err(self.fail(seq, ExplorerError::Connection { url, reason }));
        }
        if !self.is_current(seq) {
            drop(slot);
            return Err(self.discard(session, url).await);
        }

        let snapshot = match self.endpoints.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Failed to read endpoint state before commit: {}", e);
                None
            }
        };
        if let Err(e) = self.endpoints.commit_connection(&url).await {
            warn!("Failed to persist connection to {}: {}", url, e);
        }
        if !self.is_current(seq) {
            if let Some(snapshot) = snapshot {
                if let Err(e) = self.endpoints.restore(&snapshot).await {
                    warn!("Failed to roll back endpoint state for {}: {}", url, e);
                }
            }
            drop(slot);
            return Err(self.discard(session, url).await);
        }

        *slot = Some(session.clone());
        self.set_state_if_current(seq, ConnectionState::Connected { url: url.clone() });
        info!("Connected to {}", url);
        Ok(session)
    }

    /// Replaces the active session with one for `url`.
    pub async fn switch_endpoint(&self, url: &str) -> Result<Arc<SessionClient>, ExplorerError> {
        self.connect(url).await
    }

    /// Connects to the last used endpoint, or `fallback` when none is recorded.
    pub async fn connect_startup(&self, fallback: Option<&str>) -> Result<Option<Arc<SessionClient>>, ExplorerError> {
        match self.endpoints.startup_endpoint(fallback).await? {
            Some(url) => self.connect(&url).await.map(Some),
            None => Ok(None),
        }
    }

    /// Closes the active session and cancels its subscriptions. Persisted
    /// endpoints are kept. Any in-flight connect is superseded.
    pub async fn disconnect(&self) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.session.lock().await.take();
        if let Some(session) = previous {
            session.close().await;
            info!("Disconnected from {}", session.url());
        }
        self.set_state_if_current(seq, ConnectionState::Disconnected);
    }

    /// Disconnects and erases all persisted endpoint state.
    pub async fn disconnect_all(&self) -> Result<(), ExplorerError> {
        self.disconnect().await;
        self.endpoints.clear_all().await
    }

    pub async fn session(&self) -> Option<Arc<SessionClient>> {
        self.session.lock().await.clone()
    }

    /// Status of the node behind the active session.
    pub async fn status(&self) -> Result<NodeStatus, ExplorerError> {
        let session = self.session().await.ok_or(ExplorerError::NotConnected)?;
        session.status().await
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn feed(&self) -> Arc<LiveFeed> {
        self.feed.clone()
    }

    pub fn endpoints(&self) -> &EndpointStore {
        &self.endpoints
    }

    pub fn validator(&self) -> &ConnectionValidator {
        &self.validator
    }

    async fn discard(&self, session: Arc<SessionClient>, url: String) -> ExplorerError {
        session.close().await;
        info!("Connect to {} superseded, discarding session", url);
        ExplorerError::Superseded { url }
    }

    async fn attach_feeds(&self, session: &SessionClient) -> Result<(), ExplorerError> {
        self.feed.subscribe_blocks(session).await?;
        self.feed.subscribe_txs(session).await?;
        Ok(())
    }

    fn is_current(&self, seq: u64) -> bool {
        self.seq.load(Ordering::SeqCst) == seq
    }

    fn set_state_if_current(&self, seq: u64, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_current(seq) || *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    /// Moves to the error state if `seq` is still the latest request.
    fn fail(&self, seq: u64, err: ExplorerError) -> ExplorerError {
        let url = match &err {
            ExplorerError::Validation { url } | ExplorerError::Connection { url, .. } => url.clone(),
            _ => String::new(),
        };
        if !self.is_current(seq) {
            return ExplorerError::Superseded { url };
        }
        warn!("Connect to {} failed: {}", url, err);
        self.set_state_if_current(
            seq,
            ConnectionState::Error {
                url,
                message: err.to_string(),
            },
        );
        err
    }
}
