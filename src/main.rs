//! Main entry point for the paxi-explorer live feed demo
//!
//! Connects to an RPC endpoint and logs node status plus every new block and
//! transaction for a short while.

use anyhow::Result;
use paxi_explorer::explorer::{short_type_name, ExplorerBuilder, ExplorerConfig, FeedUpdate};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};

const DEMO_DURATION: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting paxi-explorer live feed demo");

    let config = match std::env::var("EXPLORER_CONFIG") {
        Ok(path) => ExplorerConfig::from_json_file(path)?,
        Err(_) => ExplorerConfig::default(),
    };
    let fallback = config.fallback_endpoint().map(str::to_string);
    let manager = ExplorerBuilder::from_config(config).build().await?;

    let session = match std::env::args().nth(1) {
        Some(url) => manager.connect(&url).await?,
        None => match manager.connect_startup(fallback.as_deref()).await? {
            Some(session) => session,
            None => {
                warn!("No endpoint given and none recorded");
                return Ok(());
            }
        },
    };

    let status = session.status().await?;
    info!(
        "Connected to {} ({}): chain {} at height {}, catching up: {}",
        session.url(),
        status.moniker,
        status.chain_id,
        status.latest_block_height,
        status.catching_up
    );

    let feed = manager.feed();
    let mut updates = feed.updates();
    let deadline = tokio::time::sleep(DEMO_DURATION);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            update = updates.recv() => match update {
                Ok(FeedUpdate::BlockAdded { height }) => {
                    if let Some(block) = feed.latest_block().await.filter(|b| b.height == height) {
                        info!("Block {} at {} with {} txs", block.height, block.time, block.txs.len());
                    }
                }
                Ok(FeedUpdate::TxAdded { hash }) => {
                    if let Some(tx) = feed.txs().await.into_iter().find(|t| t.hash == hash) {
                        let types: Vec<&str> = tx
                            .body
                            .as_ref()
                            .map(|b| b.messages.iter().map(|m| short_type_name(&m.type_url)).collect())
                            .unwrap_or_default();
                        info!(
                            "Tx {} at height {} ({}): {:?}",
                            tx.hash,
                            tx.height,
                            if tx.is_success() { "success" } else { "failed" },
                            types
                        );
                    }
                }
                Ok(FeedUpdate::Reset) => info!("Feed reset"),
                Err(RecvError::Lagged(n)) => warn!("Missed {} feed updates", n),
                Err(RecvError::Closed) => break,
            }
        }
    }

    info!(
        "Demo completed: {} blocks and {} txs buffered",
        feed.blocks().await.len(),
        feed.txs().await.len()
    );
    manager.disconnect().await;

    Ok(())
}
