//! Endpoint store - persisted list of known RPC endpoints.
//!
//! Keeps an ordered, deduplicated list of endpoint URLs (most recently used
//! first) plus the last endpoint that was successfully connected. Every
//! mutation is written through to the underlying `KvStorage` before the call
//! returns.

use crate::explorer::storage::KvStorage;
use crate::explorer::types::{ExplorerError, PresetEndpoint};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Storage key for the last successfully used endpoint.
pub const LS_RPC_ADDRESS: &str = "rpc_address";
/// Storage key for the JSON-encoded list of known endpoints.
pub const LS_RPC_ADDRESS_LIST: &str = "rpc_address_list";

/// Normalizes an endpoint URL: trims surrounding whitespace and strips a
/// single trailing slash. Case is preserved.
pub fn normalize_endpoint(url: &str) -> String {
    let trimmed = url.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

/// Persisted endpoint state captured before a tentative commit.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSnapshot {
    pub known: Vec<String>,
    pub last_used: Option<String>,
}

/// Read-modify-write mutations are serialized through `write_lock`.
pub struct EndpointStore {
    storage: Arc<dyn KvStorage>,
    write_lock: Mutex<()>,
}

impl EndpointStore {
    pub fn new(storage: Arc<dyn KvStorage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Known endpoints, most recently used first. Empty if none recorded.
    pub async fn known_endpoints(&self) -> Result<Vec<String>, ExplorerError> {
        let raw = self
            .storage
            .get(LS_RPC_ADDRESS_LIST)
            .await
            .map_err(|e| ExplorerError::Storage(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(list) => Ok(dedup_preserving_order(
                list.iter().map(|u| normalize_endpoint(u)).filter(|u| !u.is_empty()).collect(),
            )),
            Err(e) => {
                warn!("Stored endpoint list is malformed, treating as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Records `url` at the head of the list, removing any other occurrence.
    /// Returns the normalized URL.
    pub async fn record_endpoint(&self, url: &str) -> Result<String, ExplorerError> {
        let _guard = self.write_lock.lock().await;
        self.record_locked(url).await
    }

    async fn record_locked(&self, url: &str) -> Result<String, ExplorerError> {
        let url = normalize_endpoint(url);
        if url.is_empty() {
            return Err(ExplorerError::EmptyEndpoint);
        }

        let mut list = self.known_endpoints().await?;
        list.retain(|existing| existing != &url);
        list.insert(0, url.clone());
        self.persist_list(&list).await?;

        debug!("Recorded endpoint {} ({} known)", url, list.len());
        Ok(url)
    }

    /// Most recently committed successful connection, if any.
    pub async fn last_used_endpoint(&self) -> Result<Option<String>, ExplorerError> {
        let value = self
            .storage
            .get(LS_RPC_ADDRESS)
            .await
            .map_err(|e| ExplorerError::Storage(e.to_string()))?;
        Ok(value.map(|v| normalize_endpoint(&v)).filter(|v| !v.is_empty()))
    }

    /// Records `url` and marks it as the last used endpoint.
    pub async fn commit_connection(&self, url: &str) -> Result<String, ExplorerError> {
        let _guard = self.write_lock.lock().await;
        let url = self.record_locked(url).await?;
        self.storage
            .set(LS_RPC_ADDRESS, &url)
            .await
            .map_err(|e| ExplorerError::Storage(e.to_string()))?;
        Ok(url)
    }

    /// Current persisted state, for undoing a commit that lost a race.
    pub async fn snapshot(&self) -> Result<EndpointSnapshot, ExplorerError> {
        let _guard = self.write_lock.lock().await;
        Ok(EndpointSnapshot {
            known: self.known_endpoints().await?,
            last_used: self.last_used_endpoint().await?,
        })
    }

    /// Writes `snapshot` back as the persisted state.
    pub async fn restore(&self, snapshot: &EndpointSnapshot) -> Result<(), ExplorerError> {
        let _guard = self.write_lock.lock().await;
        self.persist_list(&snapshot.known).await?;
        let result = match &snapshot.last_used {
            Some(url) => self.storage.set(LS_RPC_ADDRESS, url).await,
            None => self.storage.remove(LS_RPC_ADDRESS).await,
        };
        result.map_err(|e| ExplorerError::Storage(e.to_string()))?;
        debug!("Restored endpoint state ({} known)", snapshot.known.len());
        Ok(())
    }

    /// Removes `url` from the known list. No-op if absent.
    pub async fn remove_endpoint(&self, url: &str) -> Result<(), ExplorerError> {
        let _guard = self.write_lock.lock().await;
        let url = normalize_endpoint(url);
        let mut list = self.known_endpoints().await?;
        let Some(pos) = list.iter().position(|existing| existing == &url) else {
            return Ok(());
        };
        list.remove(pos);
        self.persist_list(&list).await?;
        debug!("Removed endpoint {}", url);
        Ok(())
    }

    /// Erases all persisted endpoint state.
    pub async fn clear_all(&self) -> Result<(), ExplorerError> {
        let _guard = self.write_lock.lock().await;
        for key in [LS_RPC_ADDRESS, LS_RPC_ADDRESS_LIST] {
            self.storage
                .remove(key)
                .await
                .map_err(|e| ExplorerError::Storage(e.to_string()))?;
        }
        debug!("Cleared persisted endpoint state");
        Ok(())
    }

    /// Appends preset endpoints that are not yet known. Existing order is kept.
    pub async fn seed_presets(&self, presets: &[PresetEndpoint]) -> Result<Vec<String>, ExplorerError> {
        let _guard = self.write_lock.lock().await;
        let mut list = self.known_endpoints().await?;
        list.extend(presets.iter().map(|p| normalize_endpoint(&p.rpc)).filter(|u| !u.is_empty()));
        let list = dedup_preserving_order(list);
        self.persist_list(&list).await?;
        Ok(list)
    }

    /// Endpoint to connect to at startup: the last used one, else `fallback`.
    pub async fn startup_endpoint(&self, fallback: Option<&str>) -> Result<Option<String>, ExplorerError> {
        match self.last_used_endpoint().await? {
            Some(url) => Ok(Some(url)),
            None => Ok(fallback.map(normalize_endpoint).filter(|u| !u.is_empty())),
        }
    }

    async fn persist_list(&self, list: &[String]) -> Result<(), ExplorerError> {
        let encoded = serde_json::to_string(list).map_err(|e| ExplorerError::Storage(e.to_string()))?;
        self.storage
            .set(LS_RPC_ADDRESS_LIST, &encoded)
            .await
            .map_err(|e| ExplorerError::Storage(e.to_string()))
    }
}
