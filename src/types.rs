//! Core types and data structures shared by the explorer components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A block observed on the chain, as kept in the block feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockFeedEntry {
    /// Block height (strictly increasing for accepted feed entries)
    pub height: u64,
    /// Chain id from the block header
    pub chain_id: String,
    /// Block timestamp from the header
    pub time: DateTime<Utc>,
    /// Application hash, uppercase hex
    pub app_hash: String,
    /// Raw encoded transactions contained in the block
    pub txs: Vec<Vec<u8>>,
}

impl BlockFeedEntry {
    /// Content-addressed hashes of the block's transactions, in block order.
    pub fn tx_hashes(&self) -> Vec<String> {
        self.txs.iter().map(|raw| crate::explorer::decode::tx_hash(raw)).collect()
    }
}

/// A raw transaction event as delivered by the node.
#[derive(Debug, Clone, PartialEq)]
pub struct TxEvent {
    pub height: u64,
    pub index: u32,
    /// Raw encoded transaction bytes
    pub tx: Vec<u8>,
    /// ABCI result code (0 = success)
    pub code: u32,
    pub log: String,
}

/// Events pushed by a live transport onto subscription channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEvent {
    NewBlock(BlockFeedEntry),
    Tx(TxEvent),
}

/// A decoded protocol message: type URL plus structured payload.
///
/// `data` is `None` when the type URL is not in the known catalog or the
/// payload bytes could not be decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMsg {
    pub type_url: String,
    pub data: Option<serde_json::Value>,
}

/// Decoded body of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTxBody {
    pub memo: String,
    pub messages: Vec<DecodedMsg>,
}

/// A transaction observed on the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxFeedEntry {
    /// Uppercase hex SHA-256 of the raw transaction bytes
    pub hash: String,
    pub height: u64,
    /// Decoded body, or `None` if the raw bytes could not be decoded
    pub body: Option<DecodedTxBody>,
    /// ABCI result code (0 = success)
    pub code: u32,
    /// When this process observed the event
    pub observed_at: DateTime<Utc>,
}

impl TxFeedEntry {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Snapshot of a node's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub chain_id: String,
    pub moniker: String,
    pub version: String,
    pub latest_block_height: u64,
    pub latest_block_time: DateTime<Utc>,
    pub latest_block_hash: String,
    pub catching_up: bool,
}

/// A transaction fetched from the node's index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedTx {
    pub hash: String,
    pub height: u64,
    pub index: u32,
    pub code: u32,
    pub log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub body: Option<DecodedTxBody>,
}

/// One page of a transaction search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxSearchPage {
    pub txs: Vec<IndexedTx>,
    pub total_count: u64,
}

/// Result of an ABCI query passthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbciQueryResponse {
    pub code: u32,
    pub log: String,
    pub height: u64,
    pub value: Vec<u8>,
}

impl AbciQueryResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}
