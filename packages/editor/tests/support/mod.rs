//! Shared fixtures for editor integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use folio_blocks::{BlockNode, BlockType, CommentCodec, ContentCodec, InMemoryRegistry};
use folio_editor::{
    Editor, EditorConfig, Notice, NoticeSink, PersistenceError, PersistenceService, Post,
    PostEdits, PostStatus, ResourceKind, ReusablePayload, SavedReusable, StoredReusable,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A persistence call as seen by the service
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UpdateDocument { id: u64, edits: PostEdits },
    DeleteResource { kind: ResourceKind, id: u64 },
    SaveReusable(ReusablePayload),
    FetchReusable(Option<u64>),
}

/// In-memory service. Succeeds unless a failure has been queued for the
/// next call of that kind.
#[derive(Default)]
pub struct ScriptedPersistence {
    posts: Mutex<HashMap<u64, Post>>,
    stored_reusable: Mutex<Vec<StoredReusable>>,
    next_reusable_id: AtomicU64,
    update_failures: Mutex<VecDeque<PersistenceError>>,
    delete_failures: Mutex<VecDeque<PersistenceError>>,
    save_reusable_failures: Mutex<VecDeque<PersistenceError>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedPersistence {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_reusable_id: AtomicU64::new(100),
            ..Self::default()
        })
    }

    pub fn with_post(self: Arc<Self>, post: Post) -> Arc<Self> {
        self.posts.lock().unwrap().insert(post.id, post);
        self
    }

    pub fn with_stored_reusable(self: Arc<Self>, stored: StoredReusable) -> Arc<Self> {
        self.stored_reusable.lock().unwrap().push(stored);
        self
    }

    pub fn fail_next_update(&self, error: PersistenceError) {
        self.update_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_delete(&self, error: PersistenceError) {
        self.delete_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_reusable_save(&self, error: PersistenceError) {
        self.save_reusable_failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn post(&self, id: u64) -> Option<Post> {
        self.posts.lock().unwrap().get(&id).cloned()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PersistenceService for ScriptedPersistence {
    async fn update_document(&self, id: u64, edits: PostEdits) -> Result<Post, PersistenceError> {
        self.log(Call::UpdateDocument {
            id,
            edits: edits.clone(),
        });
        if let Some(error) = self.update_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let mut posts = self.posts.lock().unwrap();
        let stored = posts
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Post::new(id, PostStatus::AutoDraft));
        let updated = stored.with_edits(&edits);
        posts.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_resource(&self, kind: ResourceKind, id: u64) -> Result<(), PersistenceError> {
        self.log(Call::DeleteResource { kind, id });
        match self.delete_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn create_or_update_reusable(
        &self,
        payload: ReusablePayload,
    ) -> Result<SavedReusable, PersistenceError> {
        self.log(Call::SaveReusable(payload.clone()));
        if let Some(error) = self.save_reusable_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let id = payload
            .id
            .unwrap_or_else(|| self.next_reusable_id.fetch_add(1, Ordering::SeqCst));
        Ok(SavedReusable { id })
    }

    async fn fetch_reusable_blocks(
        &self,
        id: Option<u64>,
    ) -> Result<Vec<StoredReusable>, PersistenceError> {
        self.log(Call::FetchReusable(id));
        let stored = self.stored_reusable.lock().unwrap();
        Ok(stored
            .iter()
            .filter(|entry| id.map_or(true, |id| entry.id == id))
            .cloned()
            .collect())
    }
}

/// Collects every notice forwarded by the editor
#[derive(Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl NoticeSink for RecordingSink {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

pub fn registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry
        .register(BlockType::new("core/paragraph"))
        .unwrap();
    registry.register(BlockType::new("core/heading")).unwrap();
    registry.register(BlockType::new("core/block")).unwrap();
    registry
}

pub fn editor(service: Arc<ScriptedPersistence>) -> Editor {
    editor_with(EditorConfig::default(), service)
}

pub fn editor_with(config: EditorConfig, service: Arc<ScriptedPersistence>) -> Editor {
    Editor::new(
        config,
        Arc::new(registry()),
        Arc::new(CommentCodec::new()),
        service,
    )
}

pub fn paragraph(id: &str, content: &str) -> BlockNode {
    BlockNode::with_id(id, "core/paragraph").with_attribute("content", content)
}

/// A post whose content is the serialized `blocks`
pub fn post_with(id: u64, status: PostStatus, blocks: &[BlockNode]) -> Post {
    let mut post = Post::new(id, status);
    post.title = "Hello".to_string();
    post.content = CommentCodec::new().serialize(blocks);
    post
}
