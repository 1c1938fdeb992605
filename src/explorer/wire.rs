//! Tendermint JSON-RPC wire format.
//!
//! Serde models for the subset of node responses the explorer consumes, and
//! conversions into the crate's domain types. Integers arrive either as JSON
//! numbers or as decimal strings depending on the field, so every numeric
//! field goes through a lenient deserializer.

use crate::explorer::decode::{decode_tx_body, tx_hash};
use crate::types::{AbciQueryResponse, BlockFeedEntry, IndexedTx, NodeStatus, TxEvent, TxSearchPage};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
#[serde(untagged)]
enum FlexNum {
    Str(String),
    Unsigned(u64),
    Signed(i64),
}

fn de_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match FlexNum::deserialize(d)? {
        FlexNum::Str(s) => s.parse().map_err(de::Error::custom),
        FlexNum::Unsigned(n) => Ok(n),
        FlexNum::Signed(n) => u64::try_from(n).map_err(de::Error::custom),
    }
}

fn de_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match FlexNum::deserialize(d)? {
        FlexNum::Str(s) => s.parse().map_err(de::Error::custom),
        FlexNum::Unsigned(n) => i64::try_from(n).map_err(de::Error::custom),
        FlexNum::Signed(n) => Ok(n),
    }
}

fn de_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let n = de_u64(d)?;
    u32::try_from(n).map_err(de::Error::custom)
}

fn de_null_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Builds a JSON-RPC 2.0 request body.
pub fn request(id: u64, method: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Numeric request id, if the response carries one.
    pub fn numeric_id(&self) -> Option<u64> {
        match &self.id {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Result payload, or the node's error message.
    pub fn into_result(self) -> Result<Value, String> {
        if let Some(err) = self.error {
            let detail = match err.data {
                Some(Value::String(s)) => format!(" ({})", s),
                Some(other) => format!(" ({})", other),
                None => String::new(),
            };
            return Err(format!("{} [{}]{}", err.message, err.code, detail));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

// --- status ---

#[derive(Debug, Deserialize)]
struct StatusResult {
    node_info: NodeInfo,
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    network: String,
    #[serde(default)]
    moniker: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    #[serde(default)]
    latest_block_hash: String,
    #[serde(deserialize_with = "de_u64")]
    latest_block_height: u64,
    latest_block_time: DateTime<Utc>,
    #[serde(default)]
    catching_up: bool,
}

pub fn parse_status(result: Value) -> Result<NodeStatus> {
    let status: StatusResult = serde_json::from_value(result).context("Malformed status payload")?;
    if status.node_info.network.is_empty() {
        return Err(anyhow!("Status payload has an empty chain id"));
    }
    Ok(NodeStatus {
        chain_id: status.node_info.network,
        moniker: status.node_info.moniker,
        version: status.node_info.version,
        latest_block_height: status.sync_info.latest_block_height,
        latest_block_time: status.sync_info.latest_block_time,
        latest_block_hash: status.sync_info.latest_block_hash,
        catching_up: status.sync_info.catching_up,
    })
}

// --- blocks ---

#[derive(Debug, Deserialize)]
struct RawHeader {
    chain_id: String,
    #[serde(deserialize_with = "de_u64")]
    height: u64,
    time: DateTime<Utc>,
    #[serde(default)]
    app_hash: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    header: RawHeader,
    #[serde(default)]
    data: RawData,
}

#[derive(Debug, Deserialize)]
struct BlockContainer {
    block: RawBlock,
}

fn into_block_entry(block: RawBlock) -> Result<BlockFeedEntry> {
    let txs = block
        .data
        .txs
        .unwrap_or_default()
        .iter()
        .map(|b64| general_purpose::STANDARD.decode(b64))
        .collect::<Result<Vec<_>, _>>()
        .context("Block contains a transaction that is not valid base64")?;

    Ok(BlockFeedEntry {
        height: block.header.height,
        chain_id: block.header.chain_id,
        time: block.header.time,
        app_hash: block.header.app_hash.to_uppercase(),
        txs,
    })
}

/// Parses the `block` method result.
pub fn parse_block(result: Value) -> Result<BlockFeedEntry> {
    let container: BlockContainer = serde_json::from_value(result).context("Malformed block payload")?;
    into_block_entry(container.block)
}

/// Parses the `value` of a `tendermint/event/NewBlock` event.
pub fn parse_new_block_event(value: Value) -> Result<BlockFeedEntry> {
    let container: BlockContainer =
        serde_json::from_value(value).context("Malformed NewBlock event")?;
    into_block_entry(container.block)
}

// --- transactions ---

#[derive(Debug, Default, Deserialize)]
struct RawExecResult {
    #[serde(default)]
    code: u32,
    #[serde(default, deserialize_with = "de_null_string")]
    log: String,
    #[serde(default, deserialize_with = "de_i64")]
    gas_wanted: i64,
    #[serde(default, deserialize_with = "de_i64")]
    gas_used: i64,
}

#[derive(Debug, Deserialize)]
struct RawTxResult {
    #[serde(deserialize_with = "de_u64")]
    height: u64,
    #[serde(default, deserialize_with = "de_u32")]
    index: u32,
    tx: String,
    #[serde(default)]
    result: RawExecResult,
}

#[derive(Debug, Deserialize)]
struct TxEventValue {
    #[serde(rename = "TxResult")]
    tx_result: RawTxResult,
}

/// Parses the `value` of a `tendermint/event/Tx` event.
pub fn parse_tx_event(value: Value) -> Result<TxEvent> {
    let event: TxEventValue = serde_json::from_value(value).context("Malformed Tx event")?;
    let raw = event.tx_result;
    let tx = general_purpose::STANDARD
        .decode(&raw.tx)
        .context("Tx event carries invalid base64")?;
    Ok(TxEvent {
        height: raw.height,
        index: raw.index,
        tx,
        code: raw.result.code,
        log: raw.result.log,
    })
}

#[derive(Debug, Deserialize)]
struct RawIndexedTx {
    #[serde(default)]
    hash: String,
    #[serde(deserialize_with = "de_u64")]
    height: u64,
    #[serde(default, deserialize_with = "de_u32")]
    index: u32,
    #[serde(default)]
    tx_result: RawExecResult,
    tx: String,
}

fn into_indexed_tx(raw: RawIndexedTx) -> Result<IndexedTx> {
    let bytes = general_purpose::STANDARD
        .decode(&raw.tx)
        .context("Indexed tx carries invalid base64")?;
    let hash = if raw.hash.is_empty() { tx_hash(&bytes) } else { raw.hash.to_uppercase() };
    Ok(IndexedTx {
        hash,
        height: raw.height,
        index: raw.index,
        code: raw.tx_result.code,
        log: raw.tx_result.log,
        gas_wanted: raw.tx_result.gas_wanted,
        gas_used: raw.tx_result.gas_used,
        body: decode_tx_body(&bytes).ok(),
    })
}

/// Parses the `tx` method result.
pub fn parse_indexed_tx(result: Value) -> Result<IndexedTx> {
    let raw: RawIndexedTx = serde_json::from_value(result).context("Malformed tx payload")?;
    into_indexed_tx(raw)
}

#[derive(Debug, Deserialize)]
struct RawTxSearch {
    #[serde(default)]
    txs: Vec<RawIndexedTx>,
    #[serde(default, deserialize_with = "de_u64")]
    total_count: u64,
}

/// Parses the `tx_search` method result.
pub fn parse_tx_search(result: Value) -> Result<TxSearchPage> {
    let raw: RawTxSearch = serde_json::from_value(result).context("Malformed tx_search payload")?;
    let txs = raw.txs.into_iter().map(into_indexed_tx).collect::<Result<Vec<_>>>()?;
    Ok(TxSearchPage {
        txs,
        total_count: raw.total_count,
    })
}

// --- abci ---

#[derive(Debug, Deserialize)]
struct RawAbciResponse {
    #[serde(default)]
    code: u32,
    #[serde(default, deserialize_with = "de_null_string")]
    log: String,
    #[serde(default, deserialize_with = "de_u64")]
    height: u64,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AbciQueryResult {
    response: RawAbciResponse,
}

/// Parses the `abci_query` method result.
pub fn parse_abci_query(result: Value) -> Result<AbciQueryResponse> {
    let raw: AbciQueryResult = serde_json::from_value(result).context("Malformed abci_query payload")?;
    let value = match raw.response.value {
        Some(b64) => general_purpose::STANDARD
            .decode(b64)
            .context("abci_query value is not valid base64")?,
        None => Vec::new(),
    };
    Ok(AbciQueryResponse {
        code: raw.response.code,
        log: raw.response.log,
        height: raw.response.height,
        value,
    })
}
