//! # Document Model
//!
//! The persisted post, the user's unsaved edits to it, and the
//! [`DocumentState`] snapshot tracked by history.

use crate::tree::BlockTree;
use chrono::{DateTime, Utc};
use folio_blocks::{Attributes, BlockNode, BlockTypeRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostStatus {
    AutoDraft,
    Draft,
    Pending,
    Private,
    Publish,
    Future,
    Trash,
}

impl PostStatus {
    /// Statuses that count as published for save notices
    pub fn is_published(self) -> bool {
        matches!(
            self,
            PostStatus::Publish | PostStatus::Private | PostStatus::Future
        )
    }
}

/// The canonical post as last returned by the persistence service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub status: PostStatus,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub excerpt: String,

    /// Serialized block markup
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(id: u64, status: PostStatus) -> Self {
        Self {
            id,
            status,
            title: String::new(),
            excerpt: String::new(),
            content: String::new(),
            link: None,
            date: None,
        }
    }

    /// Published or private, or scheduled for a date already past
    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            PostStatus::Publish | PostStatus::Private => true,
            PostStatus::Future => self.date.is_some_and(|date| date < now),
            _ => false,
        }
    }

    pub fn with_edits(&self, edits: &PostEdits) -> Post {
        let mut post = self.clone();
        if let Some(title) = &edits.title {
            post.title = title.clone();
        }
        if let Some(excerpt) = &edits.excerpt {
            post.excerpt = excerpt.clone();
        }
        if let Some(status) = edits.status {
            post.status = status;
        }
        if let Some(content) = &edits.content {
            post.content = content.clone();
        }
        post
    }
}

/// Unsaved post-level edits. `None` means unedited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostEdits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,

    /// Explicit content override; takes precedence over serialized blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PostEdits {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn status(status: PostStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Names of the edited fields, in a fixed order
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if self.title.is_some() {
            keys.push("title".to_string());
        }
        if self.excerpt.is_some() {
            keys.push("excerpt".to_string());
        }
        if self.status.is_some() {
            keys.push("status".to_string());
        }
        if self.content.is_some() {
            keys.push("content".to_string());
        }
        keys
    }

    /// Overlay `other` on top of these edits
    pub fn merged(&self, other: &PostEdits) -> PostEdits {
        PostEdits {
            title: other.title.clone().or_else(|| self.title.clone()),
            excerpt: other.excerpt.clone().or_else(|| self.excerpt.clone()),
            status: other.status.or(self.status),
            content: other.content.clone().or_else(|| self.content.clone()),
        }
    }

    /// Drop edits whose value already matches `post`
    pub fn without_saved(&self, post: &Post) -> PostEdits {
        PostEdits {
            title: self.title.clone().filter(|title| *title != post.title),
            excerpt: self.excerpt.clone().filter(|excerpt| *excerpt != post.excerpt),
            status: self.status.filter(|status| *status != post.status),
            content: self.content.clone().filter(|content| *content != post.content),
        }
    }

    /// Drop edits whose value matches the same field in `sent`
    pub fn without_sent(&self, sent: &PostEdits) -> PostEdits {
        PostEdits {
            title: self.title.clone().filter(|v| sent.title.as_ref() != Some(v)),
            excerpt: self.excerpt.clone().filter(|v| sent.excerpt.as_ref() != Some(v)),
            status: self.status.filter(|v| sent.status != Some(*v)),
            content: self.content.clone().filter(|v| sent.content.as_ref() != Some(v)),
        }
    }
}

/// The part of editor state that history tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentState {
    pub tree: BlockTree,
    pub edits: Arc<PostEdits>,
}

impl DocumentState {
    pub fn new(tree: BlockTree) -> Self {
        Self {
            tree,
            edits: Arc::new(PostEdits::default()),
        }
    }

    pub fn with_tree(&self, tree: BlockTree) -> Self {
        Self {
            tree,
            edits: Arc::clone(&self.edits),
        }
    }

    pub fn with_edits(&self, edits: PostEdits) -> Self {
        Self {
            tree: self.tree.clone(),
            edits: Arc::new(edits),
        }
    }
}

/// A block template used to seed empty documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBlock {
    pub name: String,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default, rename = "innerBlocks")]
    pub inner_blocks: Vec<TemplateBlock>,
}

impl TemplateBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            inner_blocks: Vec::new(),
        }
    }

    /// Create a block with registry defaults overlaid by template attributes
    pub fn instantiate(&self, registry: &dyn BlockTypeRegistry) -> BlockNode {
        registry
            .create_block(&self.name, self.attributes.clone())
            .with_inner_blocks(
                self.inner_blocks
                    .iter()
                    .map(|inner| inner.instantiate(registry))
                    .collect(),
            )
    }
}
