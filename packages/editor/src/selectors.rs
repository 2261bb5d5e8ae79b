//! # Derived Views
//!
//! Read-only queries over [`EditorState`] for the UI layer.
//!
//! Plain functions recompute on every call. [`SelectorCache`] memoizes the
//! expensive ones, keyed on exactly the `Arc`-shared substructures they read:
//! the block and order tables for tree views, the selection endpoints for
//! selection views. An unrelated change (a notice, a post edit) never
//! invalidates a tree view.

use crate::document::{Post, PostStatus};
use crate::reducer::EditorState;
use crate::notices::Notice;
use crate::reusable::{ReusableBlock, ReusableRef};
use crate::transactions::{Operation, ResourceKey};
use crate::tree::ParentKey;
use chrono::Utc;
use folio_blocks::{AttrValue, Block, BlockId, BlockNode, ContentCodec};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

// ---- Blocks -----------------------------------------------------------------

pub fn get_block<'a>(state: &'a EditorState, id: &BlockId) -> Option<&'a Block> {
    state.tree().get(id)
}

/// Nested blocks under `parent` (root when `None`)
pub fn get_blocks(state: &EditorState, parent: Option<&BlockId>) -> Vec<BlockNode> {
    state.tree().to_nodes(&ParentKey::from(parent.cloned()))
}

pub fn get_block_count(state: &EditorState, parent: Option<&BlockId>) -> usize {
    get_block_order(state, parent).len()
}

pub fn get_block_order<'a>(state: &'a EditorState, parent: Option<&BlockId>) -> &'a [BlockId] {
    state.tree().order(&ParentKey::from(parent.cloned()))
}

/// Parent of `id`; `None` for root-level and unknown blocks
pub fn get_block_root_id(state: &EditorState, id: &BlockId) -> Option<BlockId> {
    state
        .tree()
        .parent_of(id)
        .and_then(|parent| parent.block_id().cloned())
}

pub fn get_previous_block_id<'a>(state: &'a EditorState, id: &BlockId) -> Option<&'a BlockId> {
    state.tree().previous_sibling(id)
}

pub fn get_next_block_id<'a>(state: &'a EditorState, id: &BlockId) -> Option<&'a BlockId> {
    state.tree().next_sibling(id)
}

// ---- Selection ----------------------------------------------------------------

pub fn get_selected_block_id(state: &EditorState) -> Option<&BlockId> {
    state.selection.single()
}

pub fn get_selected_block(state: &EditorState) -> Option<&Block> {
    get_selected_block_id(state).and_then(|id| state.tree().get(id))
}

/// Inclusive id range between the selection endpoints, in document order
/// regardless of which endpoint is the start
pub fn get_multi_selected_ids(state: &EditorState) -> Vec<BlockId> {
    let (Some(start), Some(end)) = (&state.selection.start, &state.selection.end) else {
        return Vec::new();
    };
    if start == end {
        return Vec::new();
    }
    multi_selected_range(state, start, end)
}

fn multi_selected_range(state: &EditorState, start: &BlockId, end: &BlockId) -> Vec<BlockId> {
    let tree = state.tree();
    let (Some((start_parent, start_index)), Some((end_parent, end_index))) =
        (tree.position(start), tree.position(end))
    else {
        return Vec::new();
    };
    if start_parent != end_parent {
        return Vec::new();
    }

    let (low, high) = if start_index <= end_index {
        (start_index, end_index)
    } else {
        (end_index, start_index)
    };
    tree.order(&start_parent)[low..=high].to_vec()
}

pub fn get_multi_selected_blocks<'a>(state: &'a EditorState) -> Vec<&'a Block> {
    get_multi_selected_ids(state)
        .iter()
        .filter_map(|id| state.tree().get(id))
        .collect()
}

pub fn get_first_multi_selected_id(state: &EditorState) -> Option<BlockId> {
    get_multi_selected_ids(state).into_iter().next()
}

pub fn get_last_multi_selected_id(state: &EditorState) -> Option<BlockId> {
    get_multi_selected_ids(state).pop()
}

pub fn is_block_selected(state: &EditorState, id: &BlockId) -> bool {
    state.selection.single() == Some(id)
}

pub fn is_block_multi_selected(state: &EditorState, id: &BlockId) -> bool {
    get_multi_selected_ids(state).contains(id)
}

pub fn is_multi_selecting(state: &EditorState) -> bool {
    state.selection.is_multi_selecting
}

pub fn is_selection_enabled(state: &EditorState) -> bool {
    state.selection.is_enabled
}

// ---- Post ---------------------------------------------------------------------

pub fn get_current_post(state: &EditorState) -> &Post {
    &state.content.post
}

/// Serialized content: the explicit override if there is one, otherwise
/// the current tree through the codec
pub fn get_edited_post_content(state: &EditorState, codec: &dyn ContentCodec) -> String {
    match &state.content.present().edits.content {
        Some(content) => content.clone(),
        None => codec.serialize(&state.tree().to_nodes(&ParentKey::Root)),
    }
}

/// Edited value of a post field, falling back to the persisted post
pub fn get_edited_post_attribute(state: &EditorState, name: &str) -> Option<AttrValue> {
    let edits = &state.content.present().edits;
    let post = &state.content.post;
    let value = match name {
        "title" => AttrValue::from(edits.title.as_deref().unwrap_or(&post.title)),
        "excerpt" => AttrValue::from(edits.excerpt.as_deref().unwrap_or(&post.excerpt)),
        "content" => AttrValue::from(edits.content.as_deref().unwrap_or(&post.content)),
        "status" => serde_json::to_value(edits.status.unwrap_or(post.status)).ok()?,
        _ => return None,
    };
    Some(value)
}

pub fn get_edited_post_status(state: &EditorState) -> PostStatus {
    state
        .content
        .present()
        .edits
        .status
        .unwrap_or(state.content.post.status)
}

pub fn is_edited_post_dirty(state: &EditorState) -> bool {
    state.content.is_dirty()
}

pub fn is_edited_post_new(state: &EditorState) -> bool {
    state.content.post.status == PostStatus::AutoDraft
}

/// A post with no title, excerpt or content cannot be saved
pub fn is_edited_post_saveable(state: &EditorState) -> bool {
    let edits = &state.content.present().edits;
    let post = &state.content.post;
    let has_content = match &edits.content {
        Some(content) => !content.is_empty(),
        None => !state.tree().is_empty(),
    };

    !edits.title.as_deref().unwrap_or(&post.title).is_empty()
        || !edits.excerpt.as_deref().unwrap_or(&post.excerpt).is_empty()
        || has_content
}

pub fn is_current_post_published(state: &EditorState) -> bool {
    state.content.post.is_published_at(Utc::now())
}

pub fn is_saving_post(state: &EditorState) -> bool {
    state
        .transactions
        .pending_for(&ResourceKey::CurrentPost)
        .is_some_and(|txn| txn.operation == Operation::SavePost)
}

pub fn is_trashing_post(state: &EditorState) -> bool {
    state
        .transactions
        .pending_for(&ResourceKey::CurrentPost)
        .is_some_and(|txn| txn.operation == Operation::TrashPost)
}

pub fn can_undo(state: &EditorState) -> bool {
    state.content.history.can_undo()
}

pub fn can_redo(state: &EditorState) -> bool {
    state.content.history.can_redo()
}

// ---- Reusable blocks and notices ------------------------------------------------

pub fn get_reusable_block<'a>(state: &'a EditorState, id: &ReusableRef) -> Option<&'a ReusableBlock> {
    state.content.reusable.get(id)
}

pub fn get_reusable_blocks(state: &EditorState) -> Vec<&ReusableBlock> {
    state.content.reusable.iter().collect()
}

pub fn is_saving_reusable_block(state: &EditorState, id: &ReusableRef) -> bool {
    state.content.reusable.is_saving(id)
}

pub fn is_fetching_reusable_block(state: &EditorState, id: Option<u64>) -> bool {
    state.content.reusable.is_fetching(id)
}

pub fn get_notices(state: &EditorState) -> &[Notice] {
    &state.notices
}

// ---- Memoization ------------------------------------------------------------------

type BlocksTable = Arc<HashMap<BlockId, Block>>;
type OrderTable = Arc<HashMap<ParentKey, Vec<BlockId>>>;

/// Cache key for tree-derived views: the exact tables read
#[derive(Clone)]
struct TreeKey {
    blocks: BlocksTable,
    order: OrderTable,
}

impl TreeKey {
    fn of(state: &EditorState) -> Self {
        let tree = state.tree();
        Self {
            blocks: Arc::clone(tree.blocks_table()),
            order: Arc::clone(tree.order_table()),
        }
    }

    fn matches(&self, state: &EditorState) -> bool {
        let tree = state.tree();
        Arc::ptr_eq(&self.blocks, tree.blocks_table()) && Arc::ptr_eq(&self.order, tree.order_table())
    }
}

/// Memoized views for one consumer.
///
/// Not shared across threads: each UI consumer owns its cache.
#[derive(Default)]
pub struct SelectorCache {
    blocks: RefCell<Option<(TreeKey, Arc<Vec<BlockNode>>)>>,
    multi_selected: RefCell<Option<(TreeKey, Option<BlockId>, Option<BlockId>, Arc<Vec<BlockId>>)>>,
    content: RefCell<Option<(TreeKey, Option<String>, Arc<String>)>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl SelectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root-level nested blocks
    pub fn blocks(&self, state: &EditorState) -> Arc<Vec<BlockNode>> {
        if let Some((key, value)) = self.blocks.borrow().as_ref() {
            if key.matches(state) {
                self.hit();
                return Arc::clone(value);
            }
        }
        self.miss();
        let value = Arc::new(get_blocks(state, None));
        *self.blocks.borrow_mut() = Some((TreeKey::of(state), Arc::clone(&value)));
        value
    }

    pub fn multi_selected_ids(&self, state: &EditorState) -> Arc<Vec<BlockId>> {
        let start = state.selection.start.clone();
        let end = state.selection.end.clone();
        if let Some((key, cached_start, cached_end, value)) = self.multi_selected.borrow().as_ref() {
            if key.matches(state) && *cached_start == start && *cached_end == end {
                self.hit();
                return Arc::clone(value);
            }
        }
        self.miss();
        let value = Arc::new(get_multi_selected_ids(state));
        *self.multi_selected.borrow_mut() =
            Some((TreeKey::of(state), start, end, Arc::clone(&value)));
        value
    }

    pub fn edited_post_content(&self, state: &EditorState, codec: &dyn ContentCodec) -> Arc<String> {
        let explicit = state.content.present().edits.content.clone();
        if let Some((key, cached_explicit, value)) = self.content.borrow().as_ref() {
            if key.matches(state) && *cached_explicit == explicit {
                self.hit();
                return Arc::clone(value);
            }
        }
        self.miss();
        let value = Arc::new(get_edited_post_content(state, codec));
        *self.content.borrow_mut() = Some((TreeKey::of(state), explicit, Arc::clone(&value)));
        value
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    pub fn clear(&self) {
        self.blocks.borrow_mut().take();
        self.multi_selected.borrow_mut().take();
        self.content.borrow_mut().take();
    }

    fn hit(&self) {
        self.hits.set(self.hits.get() + 1);
    }

    fn miss(&self) {
        self.misses.set(self.misses.get() + 1);
    }
}
