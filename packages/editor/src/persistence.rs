//! Persistence service boundary.
//!
//! The engine never talks to a transport directly; hosts implement
//! [`PersistenceService`] over whatever backend they use. Calls are treated
//! as idempotent by id and are never retried by the engine.

use crate::document::{Post, PostEdits};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error code meaning "the service gave no usable message"
pub const UNKNOWN_ERROR_CODE: &str = "unknown_error";

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistenceError {
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Transport failure: {message}")]
    Transport { message: String },
}

impl PersistenceError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        PersistenceError::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        PersistenceError::Transport {
            message: message.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::service(UNKNOWN_ERROR_CODE, "An unknown error occurred.")
    }

    /// The service's own message, if it is meaningful to show to a user
    pub fn user_message(&self) -> Option<&str> {
        match self {
            PersistenceError::Service { code, message }
                if code != UNKNOWN_ERROR_CODE && !message.is_empty() =>
            {
                Some(message)
            }
            _ => None,
        }
    }
}

/// Kind of resource targeted by a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Post,
    ReusableBlock,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Post => f.write_str("post"),
            ResourceKind::ReusableBlock => f.write_str("reusable_block"),
        }
    }
}

/// Create-or-update request for a reusable block. A missing id creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReusablePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedReusable {
    pub id: u64,
}

/// A reusable block as stored by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReusable {
    pub id: u64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub trashed: bool,
}

#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Apply `edits` to document `id`, returning the canonical document
    async fn update_document(&self, id: u64, edits: PostEdits) -> Result<Post, PersistenceError>;

    async fn delete_resource(&self, kind: ResourceKind, id: u64) -> Result<(), PersistenceError>;

    async fn create_or_update_reusable(
        &self,
        payload: ReusablePayload,
    ) -> Result<SavedReusable, PersistenceError>;

    /// Fetch one reusable block, or all of them when `id` is `None`
    async fn fetch_reusable_blocks(
        &self,
        id: Option<u64>,
    ) -> Result<Vec<StoredReusable>, PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_ignores_unknown_code() {
        assert_eq!(PersistenceError::unknown().user_message(), None);
        assert_eq!(
            PersistenceError::service("rest_forbidden", "Not allowed").user_message(),
            Some("Not allowed")
        );
        assert_eq!(
            PersistenceError::transport("reset").user_message(),
            None
        );
    }
}
