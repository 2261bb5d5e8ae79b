//! # Reducer
//!
//! Synchronous state transitions: `(state, intent) → state`.
//!
//! ## Design
//!
//! - [`reduce`] does transaction bookkeeping, then hands the intent to a
//!   pure apply step that matches every intent kind
//! - Content changes go through [`History`]; selection and notices live
//!   outside it
//! - A `BEGIN` intent snapshots [`ContentState`] and [`Selection`] before it
//!   is applied. Reverting restores that snapshot and replays every intent
//!   reduced since, minus the reverted transaction's own
//! - A commit or revert for a transaction that is no longer pending is
//!   rejected with `TransactionError::Unknown`, which is how late responses
//!   are rendered inert

use crate::config::EditorConfig;
use crate::document::{DocumentState, Post, PostStatus};
use crate::errors::{EditorError, StateError};
use crate::history::{ChangeKey, History};
use crate::intent::Intent;
use crate::notices::Notice;
use crate::reusable::{ReusableBlocks, ReusableRef};
use crate::selection::{check_multi_select, shift_select_range, CaretPosition, Selection};
use crate::transactions::{Phase, TransactionTable};
use crate::tree::{BlockTree, ParentKey};
use folio_blocks::BlockId;
use std::sync::Arc;
use tracing::{debug, trace};

/// Everything a revert can roll back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentState {
    pub history: History<DocumentState>,

    /// Document state as of the last save or setup
    pub saved: DocumentState,

    /// The post as last confirmed by the persistence service
    pub post: Arc<Post>,

    pub reusable: ReusableBlocks,
}

impl ContentState {
    pub fn new(post: Post, history_limit: usize) -> Self {
        Self {
            history: History::new(DocumentState::default(), history_limit),
            saved: DocumentState::default(),
            post: Arc::new(post),
            reusable: ReusableBlocks::default(),
        }
    }

    pub fn present(&self) -> &DocumentState {
        self.history.present()
    }

    pub fn tree(&self) -> &BlockTree {
        &self.history.present().tree
    }

    /// Recomputed on every call, never stored
    pub fn is_dirty(&self) -> bool {
        *self.history.present() != self.saved
    }

    /// Record `tree` as a new undo level. Unchanged trees are ignored.
    fn record_tree(&mut self, tree: BlockTree, key: Option<ChangeKey>) -> bool {
        if tree == *self.tree() {
            return false;
        }
        let next = self.present().with_tree(tree);
        self.history.record(next, key);
        true
    }

    /// Replace the present without an undo level, and mark it saved
    fn replace_saved(&mut self, present: DocumentState) {
        self.history.replace_present(present.clone());
        self.saved = present;
    }
}

/// State captured when a transaction begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content: ContentState,
    pub selection: Selection,
}

#[derive(Debug, Clone)]
pub struct EditorState {
    pub content: ContentState,
    pub selection: Selection,
    pub notices: Vec<Notice>,
    pub transactions: TransactionTable<Snapshot>,
}

impl EditorState {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            content: ContentState::new(Post::new(0, PostStatus::AutoDraft), config.history_limit),
            selection: Selection::default(),
            notices: Vec::new(),
            transactions: TransactionTable::new(),
        }
    }

    pub fn tree(&self) -> &BlockTree {
        self.content.tree()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            content: self.content.clone(),
            selection: self.selection.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.content = snapshot.content;
        self.selection = snapshot.selection;
    }
}

/// Reduce one intent into `state`.
///
/// On error, state is left as it was.
pub fn reduce(
    state: &mut EditorState,
    intent: &Intent,
    config: &EditorConfig,
) -> Result<(), EditorError> {
    trace!(intent = intent.name(), "reduce");

    match intent.transaction() {
        Some((txn, Phase::Begin { resource, operation })) => {
            state.transactions.check_available(&resource)?;
            let before = state.snapshot();
            apply(state, intent, config)?;
            state.transactions.record(intent);
            state.transactions.begin(txn, resource, operation, before)?;
            debug!(txn = %txn, ?operation, "transaction started");
        }
        Some((txn, Phase::Commit)) => {
            state.transactions.check_pending(txn)?;
            apply(state, intent, config)?;
            state.transactions.commit(txn)?;
            state.transactions.record(intent);
            debug!(txn = %txn, "transaction committed");
        }
        Some((txn, Phase::Revert)) => {
            let (before, log) = state.transactions.revert(txn)?.into_parts();
            state.restore(before);
            for logged in &log {
                replay(state, logged, config);
            }
            debug!(txn = %txn, replayed = log.len(), "transaction reverted");
        }
        None => {
            apply(state, intent, config)?;
            if intent.is_replayable() {
                state.transactions.record(intent);
            }
        }
    }
    Ok(())
}

/// Re-apply a logged intent after a revert
fn replay(state: &mut EditorState, intent: &Intent, config: &EditorConfig) {
    if let Some((txn, Phase::Begin { .. })) = intent.transaction() {
        let snapshot = state.snapshot();
        state.transactions.rebase(txn, snapshot);
    }
    if let Err(error) = apply(state, intent, config) {
        debug!(intent = intent.name(), %error, "replayed intent no longer applies");
    }
}

fn apply(state: &mut EditorState, intent: &Intent, config: &EditorConfig) -> Result<(), StateError> {
    let EditorState {
        content,
        selection,
        notices,
        ..
    } = state;

    match intent {
        // ---- Block tree ------------------------------------------------------
        Intent::ResetBlocks { blocks } => {
            let tree = BlockTree::from_nodes(blocks)?;
            let present = content.present().with_tree(tree);
            content.history.reset(present.clone());
            content.saved = present;
            selection.retain_existing(content.tree());
        }

        Intent::ReceiveBlocks { blocks } => {
            let was_clean = !content.is_dirty();
            let tree = content.tree().receive(blocks)?;
            let present = content.present().with_tree(tree);
            content.history.replace_present(present);
            if was_clean {
                content.saved = content.present().clone();
            } else if let Ok(saved) = content.saved.tree.receive(blocks) {
                content.saved = content.saved.with_tree(saved);
            }
        }

        Intent::InsertBlocks {
            blocks,
            parent,
            index,
        } => {
            let parent = ParentKey::from(parent.clone());
            let tree = content.tree().insert(blocks, &parent, *index)?;
            content.record_tree(tree, None);
            if let Some(first) = blocks.first() {
                selection.select(first.id().clone(), None);
            }
        }

        Intent::ReplaceBlocks { ids, blocks } => {
            let tree = content.tree().replace(ids, blocks)?;
            content.record_tree(tree, None);
            if ids.iter().any(|id| selection.touches(id)) {
                match blocks.last() {
                    Some(last) => selection.select(last.id().clone(), None),
                    None => selection.clear(),
                }
            }
            selection.retain_existing(content.tree());
        }

        Intent::RemoveBlocks {
            ids,
            select_previous,
        } => {
            let previous = ids
                .first()
                .and_then(|first| previous_surviving_sibling(content.tree(), first, ids));
            let tree = content.tree().remove(ids)?;
            content.record_tree(tree, None);

            if let (true, Some(previous)) = (*select_previous, previous) {
                selection.select(previous, Some(CaretPosition::End));
            } else if ids.iter().any(|id| selection.touches(id)) {
                selection.clear();
            }
            selection.retain_existing(content.tree());
        }

        Intent::UpdateBlockAttributes {
            id,
            attributes,
            coalesce,
        } => {
            let Some(tree) = content.tree().update_attributes(id, attributes)? else {
                return Ok(());
            };
            let key = coalesce.then(|| {
                let mut keys: Vec<String> = attributes.keys().cloned().collect();
                keys.sort();
                ChangeKey::Attributes {
                    block: id.to_string(),
                    keys,
                }
            });
            content.record_tree(tree, key);
        }

        Intent::MoveBlocksUp { ids } => {
            if let Some(tree) = content.tree().move_up(ids)? {
                content.record_tree(tree, None);
            }
        }

        Intent::MoveBlocksDown { ids } => {
            if let Some(tree) = content.tree().move_down(ids)? {
                content.record_tree(tree, None);
            }
        }

        // ---- Post and history ------------------------------------------------
        Intent::EditPost { edits, coalesce } => {
            let present = content.present();
            let merged = present.edits.merged(edits).without_saved(&content.post);
            if merged == *present.edits {
                return Ok(());
            }
            let next = present.with_edits(merged);
            let key = coalesce.then(|| ChangeKey::PostEdits { keys: edits.keys() });
            content.history.record(next, key);
        }

        Intent::ResetPost { post } => {
            let cleaned = content.present().edits.without_saved(post);
            let present = content.present().with_edits(cleaned);
            content.post = Arc::new(post.clone());
            content.replace_saved(present);
        }

        Intent::SetupNewPost { edits } => {
            let present = content
                .present()
                .with_edits(content.present().edits.merged(edits));
            content.history.replace_present(present);
            content.saved = content
                .saved
                .with_edits(content.saved.edits.merged(edits));
        }

        Intent::Undo => {
            if content.history.undo() {
                selection.retain_existing(content.tree());
            }
        }

        Intent::Redo => {
            if content.history.redo() {
                selection.retain_existing(content.tree());
            }
        }

        // ---- Selection -------------------------------------------------------
        Intent::SelectBlock { id, initial_caret } => {
            if !content.tree().contains(id) {
                return Err(StateError::UnknownBlock(id.clone()));
            }
            selection.select(id.clone(), *initial_caret);
        }

        Intent::ShiftSelect { id } => match shift_select_range(selection, content.tree(), id)? {
            Some((start, end)) => selection.select_range(start, end),
            None => selection.select(id.clone(), None),
        },

        Intent::ClearSelectedBlock => selection.clear(),

        Intent::StartMultiSelect => selection.is_multi_selecting = true,

        Intent::StopMultiSelect => selection.is_multi_selecting = false,

        Intent::MultiSelect { start, end } => {
            check_multi_select(content.tree(), start, end)?;
            selection.select_range(start.clone(), end.clone());
        }

        Intent::ToggleSelection { enabled } => selection.is_enabled = *enabled,

        // ---- Notices ---------------------------------------------------------
        Intent::CreateNotice { notice } => {
            match notices.iter_mut().find(|existing| existing.id == notice.id) {
                Some(existing) => *existing = notice.clone(),
                None => notices.push(notice.clone()),
            }
        }

        Intent::RemoveNotice { id } => notices.retain(|notice| notice.id != *id),

        // ---- Post persistence ------------------------------------------------
        Intent::UpdatePost { edits, .. } => {
            let cleaned = content.present().edits.without_sent(edits);
            let present = content.present().with_edits(cleaned);
            content.post = Arc::new(content.post.with_edits(edits));
            content.replace_saved(present);
        }

        Intent::RequestPostUpdateSuccess { post, .. } => {
            let present = content.present();
            let present = present.with_edits(present.edits.without_saved(post));
            content.history.replace_present(present);
            content.saved = content
                .saved
                .with_edits(content.saved.edits.without_saved(post));
            content.post = Arc::new(post.clone());
        }

        Intent::TrashPostSuccess { .. } => {
            Arc::make_mut(&mut content.post).status = PostStatus::Trash;
        }

        // ---- Reusable blocks -------------------------------------------------
        Intent::FetchReusableBlocks { id } => content.reusable.set_fetching(*id, true),

        Intent::ReceiveReusableBlocks { blocks } => {
            for block in blocks {
                content.reusable.upsert(block.clone());
            }
        }

        Intent::FetchReusableBlocksSuccess { id } | Intent::FetchReusableBlocksFailure { id, .. } => {
            content.reusable.set_fetching(*id, false);
        }

        Intent::UpdateReusableBlockTitle { id, title } => {
            let mut block = content
                .reusable
                .get(id)
                .cloned()
                .ok_or_else(|| StateError::UnknownReusable(id.clone()))?;
            block.title = title.clone();
            content.reusable.upsert(block);
        }

        Intent::SaveReusableBlockStarted { id, .. } => content.reusable.set_saving(id, true),

        Intent::SaveReusableBlockSuccess { id, updated_id, .. } => {
            content.reusable.set_saving(id, false);
            let updated = ReusableRef::Persisted(*updated_id);
            if *id != updated {
                content.reusable.swap_id(id, updated.clone());
                let reference_type = config.reference_block_type.as_str();
                content
                    .history
                    .map_all(|doc| rewrite_references(doc, id, &updated, reference_type));
                if let Some(saved) =
                    rewrite_references(&content.saved, id, &updated, reference_type)
                {
                    content.saved = saved;
                }
            }
        }

        Intent::RemoveReusableBlock { id, .. } => {
            content.reusable.remove(id);
            let referencing: Vec<BlockId> = content
                .tree()
                .blocks()
                .filter(|block| id.is_referenced_by(block, &config.reference_block_type))
                .map(|block| block.id.clone())
                .collect();
            if !referencing.is_empty() {
                let tree = content.tree().remove(&referencing)?;
                content.record_tree(tree, None);
                selection.retain_existing(content.tree());
            }
        }

        // Effect-only intents and transaction phases without a state change
        Intent::SetupEditor { .. }
        | Intent::MergeBlocks { .. }
        | Intent::AppendDefaultBlock
        | Intent::RequestPostUpdate
        | Intent::RequestPostUpdateFailure { .. }
        | Intent::TrashPost
        | Intent::TrashPostStarted { .. }
        | Intent::TrashPostFailure { .. }
        | Intent::Autosave
        | Intent::SaveReusableBlock { .. }
        | Intent::SaveReusableBlockFailure { .. }
        | Intent::DeleteReusableBlock { .. }
        | Intent::DeleteReusableBlockSuccess { .. }
        | Intent::DeleteReusableBlockFailure { .. }
        | Intent::ConvertBlockToStatic { .. }
        | Intent::ConvertBlockToReusable { .. }
        | Intent::AbandonTransaction { .. } => {}
    }
    Ok(())
}

/// Nearest preceding sibling of `id` that is not itself being removed
fn previous_surviving_sibling(tree: &BlockTree, id: &BlockId, removing: &[BlockId]) -> Option<BlockId> {
    let mut current = tree.previous_sibling(id)?;
    while removing.contains(current) {
        current = tree.previous_sibling(current)?;
    }
    Some(current.clone())
}

fn rewrite_references(
    doc: &DocumentState,
    from: &ReusableRef,
    to: &ReusableRef,
    reference_type: &str,
) -> Option<DocumentState> {
    doc.tree
        .map_attributes(|block| {
            from.is_referenced_by(block, reference_type).then(|| {
                let mut attributes = block.attributes.clone();
                attributes.insert("ref".to_string(), to.to_attribute());
                attributes
            })
        })
        .map(|tree| doc.with_tree(tree))
}
