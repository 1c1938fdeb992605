//! Connection validator - liveness pre-check for candidate endpoints.

use crate::explorer::endpoint_store::normalize_endpoint;
use crate::explorer::rpc::RpcConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Checks whether a URL answers a status query with a well-formed payload
/// within a bounded time. Touches neither the endpoint store nor the session.
pub struct ConnectionValidator {
    connector: Arc<dyn RpcConnector>,
    timeout: Duration,
}

impl ConnectionValidator {
    pub fn new(connector: Arc<dyn RpcConnector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True only for a timely, well-formed status response. Never errors.
    #[instrument(skip(self))]
    pub async fn validate(&self, url: &str) -> bool {
        let url = normalize_endpoint(url);
        if url.is_empty() {
            return false;
        }

        match timeout(self.timeout, self.connector.probe_status(&url)).await {
            Ok(Ok(status)) => {
                debug!(
                    "{} is live: chain {} at height {}",
                    url, status.chain_id, status.latest_block_height
                );
                true
            }
            Ok(Err(e)) => {
                warn!("Validation of {} failed: {:#}", url, e);
                false
            }
            Err(_) => {
                warn!("Validation of {} timed out after {:?}", url, self.timeout);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::rpc::TendermintConnector;
    use crate::explorer::types::ExplorerConfig;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_not_valid() {
        let connector = Arc::new(TendermintConnector::new(&ExplorerConfig::default()).unwrap());
        let validator = ConnectionValidator::new(connector, Duration::from_secs(2));
        assert!(!validator.validate("http://127.0.0.1:1").await);
    }

    #[tokio::test]
    async fn test_empty_or_malformed_url_is_not_valid() {
        let connector = Arc::new(TendermintConnector::new(&ExplorerConfig::default()).unwrap());
        let validator = ConnectionValidator::new(connector, Duration::from_secs(2));
        assert!(!validator.validate("   ").await);
        assert!(!validator.validate("not a url").await);
    }
}
