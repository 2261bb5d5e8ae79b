//! # Notices
//!
//! User-visible status records. The engine never renders them: they are
//! kept in state for the UI and forwarded to an optional [`NoticeSink`].
//!
//! Each persistence concern owns a fixed notice id, so a new outcome
//! replaces the previous one instead of stacking.

use crate::document::{Post, PostEdits, PostStatus};
use crate::persistence::PersistenceError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SAVE_POST_NOTICE_ID: &str = "SAVE_POST_NOTICE_ID";
pub const TRASH_POST_NOTICE_ID: &str = "TRASH_POST_NOTICE_ID";
pub const SAVE_REUSABLE_BLOCK_NOTICE_ID: &str = "SAVE_REUSABLE_BLOCK_NOTICE_ID";
pub const DELETE_REUSABLE_BLOCK_NOTICE_ID: &str = "DELETE_REUSABLE_BLOCK_NOTICE_ID";

const FALLBACK_ERROR: &str = "An unknown error occurred.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeStatus {
    Success,
    Error,
    Warning,
    Info,
}

/// Link shown alongside a notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeAction {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: String,
    pub status: NoticeStatus,
    pub message: String,
    pub dismissible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NoticeAction>,
}

impl Notice {
    pub fn new(status: NoticeStatus, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status,
            message: message.into(),
            dismissible: true,
            action: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeStatus::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeStatus::Error, message)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_action(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.action = Some(NoticeAction {
            label: label.into(),
            url: url.into(),
        });
        self
    }
}

/// Receives notices as they are created and removed
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: &Notice);

    fn dismiss(&self, _id: &str) {}
}

/// Notice for a successful save, given the post before and after.
///
/// Saving something that stays unpublished is silent.
pub fn post_saved_notice(previous: &Post, post: &Post) -> Option<Notice> {
    let was_published = previous.status.is_published();
    let is_published = post.status.is_published();

    let (message, show_link) = match (was_published, is_published) {
        (false, false) => return None,
        (true, false) => ("Post reverted to draft.", false),
        (false, true) => match post.status {
            PostStatus::Private => ("Post published privately!", true),
            PostStatus::Future => ("Post scheduled!", true),
            _ => ("Post published!", true),
        },
        (true, true) => ("Post updated!", true),
    };

    let mut notice = Notice::success(message).with_id(SAVE_POST_NOTICE_ID);
    if show_link {
        if let Some(link) = &post.link {
            notice = notice.with_action("View post", link.clone());
        }
    }
    Some(notice)
}

/// Notice for a failed save. Publishing an unpublished post gets a
/// publish-specific message.
pub fn post_save_failed_notice(post: &Post, edits: &PostEdits) -> Notice {
    let message = match edits.status {
        Some(PostStatus::Publish | PostStatus::Private) if !post.status.is_published() => {
            "Publishing failed"
        }
        Some(PostStatus::Future) if !post.status.is_published() => "Scheduling failed",
        _ => "Updating failed",
    };
    Notice::error(message).with_id(SAVE_POST_NOTICE_ID)
}

pub fn trash_failed_notice(error: &PersistenceError) -> Notice {
    let message = error.user_message().unwrap_or("Trashing failed");
    Notice::error(message).with_id(TRASH_POST_NOTICE_ID)
}

pub fn reusable_saved_notice() -> Notice {
    Notice::success("Block updated.").with_id(SAVE_REUSABLE_BLOCK_NOTICE_ID)
}

pub fn reusable_save_failed_notice(error: &PersistenceError) -> Notice {
    let message = error.user_message().unwrap_or(FALLBACK_ERROR);
    Notice::error(message).with_id(SAVE_REUSABLE_BLOCK_NOTICE_ID)
}

pub fn reusable_deleted_notice() -> Notice {
    Notice::success("Block deleted.").with_id(DELETE_REUSABLE_BLOCK_NOTICE_ID)
}

pub fn reusable_delete_failed_notice(error: &PersistenceError) -> Notice {
    let message = error.user_message().unwrap_or(FALLBACK_ERROR);
    Notice::error(message).with_id(DELETE_REUSABLE_BLOCK_NOTICE_ID)
}

pub fn reusable_fetch_failed_notice(error: &PersistenceError) -> Notice {
    Notice::error(error.user_message().unwrap_or(FALLBACK_ERROR))
}
