//! Error types for the editor

use crate::transactions::{ResourceKey, TransactionId};
use crate::reusable::ReusableRef;
use folio_blocks::{BlockId, CodecError};
use thiserror::Error;

/// Local state errors.
///
/// Operations that raise these leave state untouched. The container only
/// surfaces them to callers in strict mode.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Block not found: {0}")]
    UnknownBlock(BlockId),

    #[error("Parent block not found: {0}")]
    UnknownParent(BlockId),

    #[error("Block already exists: {0}")]
    DuplicateBlock(BlockId),

    #[error("Invalid block type name {name:?} on {id}")]
    InvalidBlockType { id: BlockId, name: String },

    #[error("Selection endpoints {start} and {end} do not share a parent")]
    CrossParentSelection { start: BlockId, end: BlockId },

    #[error("Moving {0} would create a cycle")]
    WouldCreateCycle(BlockId),

    #[error("Blocks are not contiguous siblings")]
    NotContiguous,

    #[error("Reusable block not found: {0}")]
    UnknownReusable(ReusableRef),

    #[error("Block order corrupted: {0}")]
    OrderCorrupted(String),
}

/// Errors from the per-resource transaction table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("{resource} already has transaction {txn} in flight")]
    InFlight {
        resource: ResourceKey,
        txn: TransactionId,
    },

    #[error("Transaction not pending: {0}")]
    Unknown(TransactionId),
}

/// Errors loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Asynchronous effects require a Tokio runtime")]
    NoRuntime,
}
