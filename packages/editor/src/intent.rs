//! # Intents
//!
//! Every state change and every side effect starts as an [`Intent`]. The set
//! is closed: the reducer and the effect planner both match on it
//! exhaustively, so adding a variant forces both to handle it.
//!
//! Intents that take part in an optimistic transaction carry its
//! [`TransactionId`]; [`Intent::transaction`] reports which phase they drive.

use crate::document::{Post, PostEdits, TemplateBlock};
use crate::notices::Notice;
use crate::persistence::PersistenceError;
use crate::reusable::{ReusableBlock, ReusableRef};
use crate::selection::CaretPosition;
use crate::transactions::{Operation, Phase, ResourceKey, TransactionId};
use folio_blocks::{Attributes, BlockId, BlockNode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    // ---- Setup -----------------------------------------------------------
    /// Load a post: parse its content (or instantiate `template` when it has
    /// none) and reset blocks, history and dirty tracking
    SetupEditor {
        post: Post,
        #[serde(default)]
        template: Vec<TemplateBlock>,
    },

    /// Seed edits of a brand new post without flagging it dirty
    SetupNewPost { edits: PostEdits },

    // ---- Block tree ------------------------------------------------------
    /// Replace the whole tree and clear history
    ResetBlocks { blocks: Vec<BlockNode> },

    /// Upsert blocks without touching history or dirty tracking
    ReceiveBlocks { blocks: Vec<BlockNode> },

    InsertBlocks {
        blocks: Vec<BlockNode>,
        #[serde(default)]
        parent: Option<BlockId>,
        #[serde(default)]
        index: Option<usize>,
    },

    ReplaceBlocks {
        ids: Vec<BlockId>,
        blocks: Vec<BlockNode>,
    },

    RemoveBlocks {
        ids: Vec<BlockId>,
        #[serde(default)]
        select_previous: bool,
    },

    /// Set attributes on one block. With `coalesce`, consecutive updates of
    /// the same keys on the same block share one undo level.
    UpdateBlockAttributes {
        id: BlockId,
        attributes: Attributes,
        #[serde(default)]
        coalesce: bool,
    },

    MoveBlocksUp { ids: Vec<BlockId> },

    MoveBlocksDown { ids: Vec<BlockId> },

    /// Merge `second` into `first` using the registry's merge rule
    MergeBlocks { first: BlockId, second: BlockId },

    AppendDefaultBlock,

    // ---- Post and history ------------------------------------------------
    /// Edit post fields. `coalesce` batches like attribute updates.
    EditPost {
        edits: PostEdits,
        #[serde(default)]
        coalesce: bool,
    },

    /// Adopt `post` as the persisted post and mark the present as saved
    ResetPost { post: Post },

    Undo,

    Redo,

    // ---- Selection -------------------------------------------------------
    SelectBlock {
        id: BlockId,
        #[serde(default)]
        initial_caret: Option<CaretPosition>,
    },

    ShiftSelect { id: BlockId },

    ClearSelectedBlock,

    StartMultiSelect,

    StopMultiSelect,

    MultiSelect { start: BlockId, end: BlockId },

    ToggleSelection { enabled: bool },

    // ---- Notices ---------------------------------------------------------
    CreateNotice { notice: Notice },

    RemoveNotice { id: String },

    // ---- Post persistence ------------------------------------------------
    RequestPostUpdate,

    UpdatePost { edits: PostEdits, txn: TransactionId },

    RequestPostUpdateSuccess {
        previous: Post,
        post: Post,
        txn: TransactionId,
    },

    RequestPostUpdateFailure {
        error: PersistenceError,
        post: Post,
        edits: PostEdits,
        txn: TransactionId,
    },

    TrashPost,

    TrashPostStarted { txn: TransactionId },

    TrashPostSuccess { txn: TransactionId },

    TrashPostFailure {
        error: PersistenceError,
        txn: TransactionId,
    },

    Autosave,

    // ---- Reusable blocks -------------------------------------------------
    FetchReusableBlocks {
        #[serde(default)]
        id: Option<u64>,
    },

    ReceiveReusableBlocks { blocks: Vec<ReusableBlock> },

    FetchReusableBlocksSuccess {
        #[serde(default)]
        id: Option<u64>,
    },

    FetchReusableBlocksFailure {
        #[serde(default)]
        id: Option<u64>,
        error: PersistenceError,
    },

    UpdateReusableBlockTitle { id: ReusableRef, title: String },

    SaveReusableBlock { id: ReusableRef },

    SaveReusableBlockStarted { id: ReusableRef, txn: TransactionId },

    SaveReusableBlockSuccess {
        id: ReusableRef,
        updated_id: u64,
        txn: TransactionId,
    },

    SaveReusableBlockFailure {
        id: ReusableRef,
        error: PersistenceError,
        txn: TransactionId,
    },

    DeleteReusableBlock { id: ReusableRef },

    /// Optimistic half of a delete: drops the entry and every block that
    /// references it
    RemoveReusableBlock { id: ReusableRef, txn: TransactionId },

    DeleteReusableBlockSuccess { id: ReusableRef, txn: TransactionId },

    DeleteReusableBlockFailure {
        id: ReusableRef,
        error: PersistenceError,
        txn: TransactionId,
    },

    ConvertBlockToStatic { id: BlockId },

    ConvertBlockToReusable { id: BlockId },

    // ---- Transactions ----------------------------------------------------
    /// Retire a pending transaction without waiting for its response. The
    /// late response is then ignored as stale.
    AbandonTransaction { txn: TransactionId },
}

impl Intent {
    /// Transaction id and phase, for intents that drive a transaction
    pub fn transaction(&self) -> Option<(TransactionId, Phase)> {
        let begin = |resource: ResourceKey, operation: Operation| Phase::Begin {
            resource,
            operation,
        };

        match self {
            Intent::UpdatePost { txn, .. } => {
                Some((*txn, begin(ResourceKey::CurrentPost, Operation::SavePost)))
            }
            Intent::TrashPostStarted { txn } => {
                Some((*txn, begin(ResourceKey::CurrentPost, Operation::TrashPost)))
            }
            Intent::SaveReusableBlockStarted { id, txn } => Some((
                *txn,
                begin(ResourceKey::Reusable(id.clone()), Operation::SaveReusable),
            )),
            Intent::RemoveReusableBlock { id, txn } => Some((
                *txn,
                begin(ResourceKey::Reusable(id.clone()), Operation::DeleteReusable),
            )),

            Intent::RequestPostUpdateSuccess { txn, .. }
            | Intent::TrashPostSuccess { txn }
            | Intent::SaveReusableBlockSuccess { txn, .. }
            | Intent::DeleteReusableBlockSuccess { txn, .. }
            | Intent::AbandonTransaction { txn } => Some((*txn, Phase::Commit)),

            Intent::RequestPostUpdateFailure { txn, .. }
            | Intent::TrashPostFailure { txn, .. }
            | Intent::SaveReusableBlockFailure { txn, .. }
            | Intent::DeleteReusableBlockFailure { txn, .. } => Some((*txn, Phase::Revert)),

            _ => None,
        }
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction().map(|(txn, _)| txn)
    }

    /// Whether this intent must be replayed when an earlier transaction is
    /// reverted. Notices live outside the reverted state.
    pub fn is_replayable(&self) -> bool {
        !matches!(
            self,
            Intent::CreateNotice { .. } | Intent::RemoveNotice { .. }
        ) && !matches!(self.transaction(), Some((_, Phase::Revert)))
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Intent::SetupEditor { .. } => "SETUP_EDITOR",
            Intent::SetupNewPost { .. } => "SETUP_NEW_POST",
            Intent::ResetBlocks { .. } => "RESET_BLOCKS",
            Intent::ReceiveBlocks { .. } => "RECEIVE_BLOCKS",
            Intent::InsertBlocks { .. } => "INSERT_BLOCKS",
            Intent::ReplaceBlocks { .. } => "REPLACE_BLOCKS",
            Intent::RemoveBlocks { .. } => "REMOVE_BLOCKS",
            Intent::UpdateBlockAttributes { .. } => "UPDATE_BLOCK_ATTRIBUTES",
            Intent::MoveBlocksUp { .. } => "MOVE_BLOCKS_UP",
            Intent::MoveBlocksDown { .. } => "MOVE_BLOCKS_DOWN",
            Intent::MergeBlocks { .. } => "MERGE_BLOCKS",
            Intent::AppendDefaultBlock => "APPEND_DEFAULT_BLOCK",
            Intent::EditPost { .. } => "EDIT_POST",
            Intent::ResetPost { .. } => "RESET_POST",
            Intent::Undo => "UNDO",
            Intent::Redo => "REDO",
            Intent::SelectBlock { .. } => "SELECT_BLOCK",
            Intent::ShiftSelect { .. } => "SHIFT_SELECT",
            Intent::ClearSelectedBlock => "CLEAR_SELECTED_BLOCK",
            Intent::StartMultiSelect => "START_MULTI_SELECT",
            Intent::StopMultiSelect => "STOP_MULTI_SELECT",
            Intent::MultiSelect { .. } => "MULTI_SELECT",
            Intent::ToggleSelection { .. } => "TOGGLE_SELECTION",
            Intent::CreateNotice { .. } => "CREATE_NOTICE",
            Intent::RemoveNotice { .. } => "REMOVE_NOTICE",
            Intent::RequestPostUpdate => "REQUEST_POST_UPDATE",
            Intent::UpdatePost { .. } => "UPDATE_POST",
            Intent::RequestPostUpdateSuccess { .. } => "REQUEST_POST_UPDATE_SUCCESS",
            Intent::RequestPostUpdateFailure { .. } => "REQUEST_POST_UPDATE_FAILURE",
            Intent::TrashPost => "TRASH_POST",
            Intent::TrashPostStarted { .. } => "TRASH_POST_STARTED",
            Intent::TrashPostSuccess { .. } => "TRASH_POST_SUCCESS",
            Intent::TrashPostFailure { .. } => "TRASH_POST_FAILURE",
            Intent::Autosave => "AUTOSAVE",
            Intent::FetchReusableBlocks { .. } => "FETCH_REUSABLE_BLOCKS",
            Intent::ReceiveReusableBlocks { .. } => "RECEIVE_REUSABLE_BLOCKS",
            Intent::FetchReusableBlocksSuccess { .. } => "FETCH_REUSABLE_BLOCKS_SUCCESS",
            Intent::FetchReusableBlocksFailure { .. } => "FETCH_REUSABLE_BLOCKS_FAILURE",
            Intent::UpdateReusableBlockTitle { .. } => "UPDATE_REUSABLE_BLOCK_TITLE",
            Intent::SaveReusableBlock { .. } => "SAVE_REUSABLE_BLOCK",
            Intent::SaveReusableBlockStarted { .. } => "SAVE_REUSABLE_BLOCK_STARTED",
            Intent::SaveReusableBlockSuccess { .. } => "SAVE_REUSABLE_BLOCK_SUCCESS",
            Intent::SaveReusableBlockFailure { .. } => "SAVE_REUSABLE_BLOCK_FAILURE",
            Intent::DeleteReusableBlock { .. } => "DELETE_REUSABLE_BLOCK",
            Intent::RemoveReusableBlock { .. } => "REMOVE_REUSABLE_BLOCK",
            Intent::DeleteReusableBlockSuccess { .. } => "DELETE_REUSABLE_BLOCK_SUCCESS",
            Intent::DeleteReusableBlockFailure { .. } => "DELETE_REUSABLE_BLOCK_FAILURE",
            Intent::ConvertBlockToStatic { .. } => "CONVERT_BLOCK_TO_STATIC",
            Intent::ConvertBlockToReusable { .. } => "CONVERT_BLOCK_TO_REUSABLE",
            Intent::AbandonTransaction { .. } => "ABANDON_TRANSACTION",
        }
    }
}
