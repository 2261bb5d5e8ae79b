//! # Folio Editor
//!
//! State engine for editing a post made of nested blocks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ host: UI, pointer, clipboard, timers        │
//! └─────────────────────────────────────────────┘
//!                     ↓ Intent
//! ┌─────────────────────────────────────────────┐
//! │ editor: single-writer container             │
//! │  - reduce intents into EditorState          │
//! │  - undo/redo history of post content        │
//! │  - optimistic transactions with revert      │
//! │  - plan follow-ups and persistence effects  │
//! └─────────────────────────────────────────────┘
//!                     ↓ Effect
//! ┌─────────────────────────────────────────────┐
//! │ persistence: remote documents, reusables    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Intents are the only writers**: every change, local or remote,
//!    goes through [`Editor::dispatch`]
//! 2. **Structural sharing**: unchanged parts of the tree are shared between
//!    history entries
//! 3. **Optimistic persistence**: local state moves first; a failed request
//!    reverts exactly what its transaction did
//! 4. **Derived views**: selectors compute, they never store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_blocks::{CommentCodec, InMemoryRegistry};
//! use folio_editor::{Editor, EditorConfig, Intent, selectors};
//!
//! let mut editor = Editor::new(
//!     EditorConfig::default(),
//!     Arc::new(InMemoryRegistry::new()),
//!     Arc::new(CommentCodec::new()),
//!     Arc::new(my_service),
//! );
//!
//! editor.dispatch(Intent::SetupEditor { post, template: vec![] })?;
//! editor.dispatch(Intent::AppendDefaultBlock)?;
//! editor.dispatch(Intent::RequestPostUpdate)?;
//! editor.settle().await?;
//!
//! assert!(!selectors::is_edited_post_dirty(editor.state()));
//! ```

mod autosave;
mod clipboard;
mod config;
mod document;
mod editor;
mod effects;
mod errors;
mod geometry;
mod history;
mod intent;
mod notices;
mod persistence;
mod reducer;
mod reusable;
mod selection;
pub mod selectors;
mod transactions;
mod tree;

pub use autosave::AutosaveTimer;
pub use clipboard::{Clipboard, ClipboardEvent, ClipboardPayload};
pub use config::{EditorConfig, DEFAULT_BLOCK_TYPE, REFERENCE_BLOCK_TYPE};
pub use document::{DocumentState, Post, PostEdits, PostStatus, TemplateBlock};
pub use editor::{Editor, Listener, SubscriptionId};
pub use effects::{perform, Effect, Plan, Planner};
pub use errors::{ConfigError, EditorError, StateError, TransactionError};
pub use geometry::{DragSelection, DragStep, GeometryMap, GeometryProvider, PointerThrottle};
pub use history::{ChangeKey, History};
pub use intent::Intent;
pub use notices::{
    Notice, NoticeAction, NoticeSink, NoticeStatus, DELETE_REUSABLE_BLOCK_NOTICE_ID,
    SAVE_POST_NOTICE_ID, SAVE_REUSABLE_BLOCK_NOTICE_ID, TRASH_POST_NOTICE_ID,
};
pub use persistence::{
    PersistenceError, PersistenceService, ResourceKind, ReusablePayload, SavedReusable,
    StoredReusable, UNKNOWN_ERROR_CODE,
};
pub use reducer::{reduce, ContentState, EditorState, Snapshot};
pub use reusable::{ReusableBlock, ReusableBlocks, ReusableRef};
pub use selection::{CaretPosition, Selection, SelectionMode};
pub use selectors::SelectorCache;
pub use transactions::{
    Operation, PendingTransaction, Phase, ResourceKey, TransactionId, TransactionIds,
    TransactionPhase, TransactionTable,
};
pub use tree::{BlockTree, ParentKey};
