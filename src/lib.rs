//! paxi-explorer - connection management and live feeds for a Cosmos-SDK chain explorer
//!
//! This crate owns the RPC endpoint lifecycle (persisted endpoint list,
//! liveness validation, one active session) and keeps bounded, newest-first
//! buffers of blocks and transactions fed by the node's websocket events.

pub mod types;
pub mod explorer;

// Re-export main types for convenience
pub use types::{BlockFeedEntry, ChainEvent, DecodedMsg, DecodedTxBody, NodeStatus, TxEvent, TxFeedEntry};
pub use explorer::{ConnectionState, ExplorerBuilder, ExplorerConfig, ExplorerError, SessionManager};
