//! # Effect Pipeline
//!
//! Maps reduced intents to follow-up intents and persistence calls.
//!
//! ## Design
//!
//! - [`Planner::plan`] runs after an intent has been reduced and sees the
//!   resulting state. It is synchronous and matches every intent kind, so a
//!   new intent cannot silently skip its effects
//! - Follow-ups are queued behind the current intent; at most one
//!   asynchronous [`Effect`] is produced per intent
//! - [`perform`] executes an effect against the persistence service and
//!   returns the success or failure intents to feed back into the queue.
//!   It never retries
//! - Transaction ids are allocated here, when the `BEGIN` intent is built

use crate::config::EditorConfig;
use crate::document::{Post, PostEdits, PostStatus};
use crate::errors::{EditorError, StateError};
use crate::intent::Intent;
use crate::notices::{
    post_save_failed_notice, post_saved_notice, reusable_delete_failed_notice,
    reusable_deleted_notice, reusable_fetch_failed_notice, reusable_save_failed_notice,
    reusable_saved_notice, trash_failed_notice, DELETE_REUSABLE_BLOCK_NOTICE_ID,
    SAVE_POST_NOTICE_ID, TRASH_POST_NOTICE_ID,
};
use crate::persistence::{PersistenceService, ReusablePayload, ResourceKind, StoredReusable};
use crate::reducer::EditorState;
use crate::reusable::{ReusableBlock, ReusableRef};
use crate::selection::CaretPosition;
use crate::selectors;
use crate::transactions::{ResourceKey, TransactionId, TransactionIds};
use folio_blocks::{Attributes, BlockId, BlockNode, BlockTypeRegistry, ContentCodec};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const UNTITLED_REUSABLE_BLOCK: &str = "Untitled block";

/// Asynchronous work requested by an intent
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    UpdateDocument {
        txn: TransactionId,
        id: u64,
        previous: Post,
        edits: PostEdits,
    },
    TrashPost {
        txn: TransactionId,
        id: u64,
    },
    FetchReusable {
        id: Option<u64>,
    },
    SaveReusable {
        txn: TransactionId,
        id: ReusableRef,
        payload: ReusablePayload,
    },
    DeleteReusable {
        txn: TransactionId,
        id: ReusableRef,
        persisted_id: u64,
    },
}

/// What an intent asks for beyond its state change
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Plan {
    pub follow_ups: Vec<Intent>,
    pub task: Option<Effect>,
}

impl Plan {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn follow(follow_ups: Vec<Intent>) -> Self {
        Self {
            follow_ups,
            task: None,
        }
    }

    pub fn notice(notice: crate::notices::Notice) -> Self {
        Self::follow(vec![Intent::CreateNotice { notice }])
    }

    pub fn with_task(mut self, task: Effect) -> Self {
        self.task = Some(task);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.follow_ups.is_empty() && self.task.is_none()
    }
}

/// Effect planning context
pub struct Planner<'a> {
    pub config: &'a EditorConfig,
    pub registry: &'a dyn BlockTypeRegistry,
    pub codec: &'a dyn ContentCodec,
    pub ids: &'a mut TransactionIds,
}

impl Planner<'_> {
    pub fn plan(&mut self, state: &EditorState, intent: &Intent) -> Result<Plan, EditorError> {
        match intent {
            Intent::SetupEditor { post, template } => self.setup_editor(post, template),

            Intent::MergeBlocks { first, second } => self.merge_blocks(state, first, second),

            Intent::AppendDefaultBlock => {
                let block = self
                    .registry
                    .create_block(&self.config.default_block_type, Attributes::new());
                Ok(Plan::follow(vec![Intent::InsertBlocks {
                    blocks: vec![block],
                    parent: None,
                    index: None,
                }]))
            }

            Intent::RequestPostUpdate => self.request_post_update(state),

            Intent::RequestPostUpdateSuccess { previous, post, .. } => {
                Ok(post_saved_notice(previous, post).map_or_else(Plan::none, Plan::notice))
            }

            Intent::RequestPostUpdateFailure { post, edits, .. } => {
                Ok(Plan::notice(post_save_failed_notice(post, edits)))
            }

            Intent::TrashPost => {
                state
                    .transactions
                    .check_available(&ResourceKey::CurrentPost)?;
                let txn = self.ids.allocate();
                Ok(Plan::follow(vec![
                    Intent::RemoveNotice {
                        id: TRASH_POST_NOTICE_ID.to_string(),
                    },
                    Intent::TrashPostStarted { txn },
                ])
                .with_task(Effect::TrashPost {
                    txn,
                    id: state.content.post.id,
                }))
            }

            Intent::TrashPostFailure { error, .. } => Ok(Plan::notice(trash_failed_notice(error))),

            Intent::Autosave => Ok(self.autosave(state)),

            Intent::FetchReusableBlocks { id } => {
                Ok(Plan::none().with_task(Effect::FetchReusable { id: *id }))
            }

            Intent::FetchReusableBlocksFailure { error, .. } => {
                Ok(Plan::notice(reusable_fetch_failed_notice(error)))
            }

            Intent::SaveReusableBlock { id } => self.save_reusable_block(state, id),

            Intent::SaveReusableBlockSuccess { .. } => Ok(Plan::notice(reusable_saved_notice())),

            Intent::SaveReusableBlockFailure { error, .. } => {
                Ok(Plan::notice(reusable_save_failed_notice(error)))
            }

            Intent::DeleteReusableBlock { id } => self.delete_reusable_block(state, id),

            Intent::DeleteReusableBlockSuccess { .. } => {
                Ok(Plan::notice(reusable_deleted_notice()))
            }

            Intent::DeleteReusableBlockFailure { error, .. } => {
                Ok(Plan::notice(reusable_delete_failed_notice(error)))
            }

            Intent::ConvertBlockToStatic { id } => self.convert_to_static(state, id),

            Intent::ConvertBlockToReusable { id } => self.convert_to_reusable(state, id),

            Intent::SetupNewPost { .. }
            | Intent::ResetBlocks { .. }
            | Intent::ReceiveBlocks { .. }
            | Intent::InsertBlocks { .. }
            | Intent::ReplaceBlocks { .. }
            | Intent::RemoveBlocks { .. }
            | Intent::UpdateBlockAttributes { .. }
            | Intent::MoveBlocksUp { .. }
            | Intent::MoveBlocksDown { .. }
            | Intent::EditPost { .. }
            | Intent::ResetPost { .. }
            | Intent::Undo
            | Intent::Redo
            | Intent::SelectBlock { .. }
            | Intent::ShiftSelect { .. }
            | Intent::ClearSelectedBlock
            | Intent::StartMultiSelect
            | Intent::StopMultiSelect
            | Intent::MultiSelect { .. }
            | Intent::ToggleSelection { .. }
            | Intent::CreateNotice { .. }
            | Intent::RemoveNotice { .. }
            | Intent::UpdatePost { .. }
            | Intent::TrashPostStarted { .. }
            | Intent::TrashPostSuccess { .. }
            | Intent::ReceiveReusableBlocks { .. }
            | Intent::FetchReusableBlocksSuccess { .. }
            | Intent::UpdateReusableBlockTitle { .. }
            | Intent::SaveReusableBlockStarted { .. }
            | Intent::RemoveReusableBlock { .. }
            | Intent::AbandonTransaction { .. } => Ok(Plan::none()),
        }
    }

    fn setup_editor(
        &self,
        post: &Post,
        template: &[crate::document::TemplateBlock],
    ) -> Result<Plan, EditorError> {
        let blocks = if !post.content.is_empty() {
            self.codec.parse(&post.content)?
        } else {
            template
                .iter()
                .map(|block| block.instantiate(self.registry))
                .collect()
        };

        let mut follow_ups = vec![
            Intent::ResetPost { post: post.clone() },
            Intent::ResetBlocks { blocks },
        ];
        if post.status == PostStatus::AutoDraft {
            follow_ups.push(Intent::SetupNewPost {
                edits: PostEdits::title(post.title.clone()),
            });
        }
        Ok(Plan::follow(follow_ups))
    }

    fn merge_blocks(
        &self,
        state: &EditorState,
        first: &BlockId,
        second: &BlockId,
    ) -> Result<Plan, EditorError> {
        let tree = state.tree();
        let block_a = tree
            .get(first)
            .ok_or_else(|| StateError::UnknownBlock(first.clone()))?;
        let block_b = tree
            .get(second)
            .ok_or_else(|| StateError::UnknownBlock(second.clone()))?;

        let select_first = Intent::SelectBlock {
            id: first.clone(),
            initial_caret: None,
        };
        let Some(merge) = self
            .registry
            .get_type(&block_a.type_name)
            .and_then(|block_type| block_type.merge.clone())
        else {
            return Ok(Plan::follow(vec![select_first]));
        };

        let Some(converted) = self.registry.switch_to_type(block_b, &block_a.type_name) else {
            debug!(first = %first, second = %second, "no transform between block types");
            return Ok(Plan::follow(vec![select_first]));
        };
        let Some(index) = converted
            .iter()
            .position(|node| node.type_name() == block_a.type_name)
        else {
            return Ok(Plan::follow(vec![select_first]));
        };

        let patch = merge(&block_a.attributes, converted[index].attributes());
        let Some(merged) = tree.node(first) else {
            return Ok(Plan::none());
        };
        let mut replacement = vec![merged.with_attributes(patch)];
        replacement.extend(
            converted
                .into_iter()
                .enumerate()
                .filter(|(position, _)| *position != index)
                .map(|(_, node)| node),
        );

        Ok(Plan::follow(vec![
            Intent::ReplaceBlocks {
                ids: vec![first.clone(), second.clone()],
                blocks: replacement,
            },
            Intent::SelectBlock {
                id: first.clone(),
                initial_caret: Some(CaretPosition::End),
            },
        ]))
    }

    fn request_post_update(&mut self, state: &EditorState) -> Result<Plan, EditorError> {
        state
            .transactions
            .check_available(&ResourceKey::CurrentPost)?;

        let content = selectors::get_edited_post_content(state, self.codec);
        let edits = PostEdits {
            content: Some(content),
            ..(*state.content.present().edits).clone()
        };
        let txn = self.ids.allocate();
        let post = state.content.post.as_ref().clone();

        Ok(Plan::follow(vec![
            Intent::RemoveNotice {
                id: SAVE_POST_NOTICE_ID.to_string(),
            },
            Intent::UpdatePost {
                edits: edits.clone(),
                txn,
            },
        ])
        .with_task(Effect::UpdateDocument {
            txn,
            id: post.id,
            previous: post,
            edits,
        }))
    }

    fn autosave(&self, state: &EditorState) -> Plan {
        let is_new = selectors::is_edited_post_new(state);
        if !selectors::is_edited_post_saveable(state)
            || !(is_new || selectors::is_edited_post_dirty(state))
        {
            return Plan::none();
        }
        if selectors::is_current_post_published(state) {
            debug!("skipping autosave of a published post");
            return Plan::none();
        }
        if let Some(pending) = state.transactions.pending_for(&ResourceKey::CurrentPost) {
            debug!(txn = %pending.id, "skipping autosave while the post is in flight");
            return Plan::none();
        }

        let mut follow_ups = Vec::new();
        if is_new {
            follow_ups.push(Intent::EditPost {
                edits: PostEdits::status(PostStatus::Draft),
                coalesce: false,
            });
        }
        follow_ups.push(Intent::RequestPostUpdate);
        Plan::follow(follow_ups)
    }

    fn save_reusable_block(&mut self, state: &EditorState, id: &ReusableRef) -> Result<Plan, EditorError> {
        let reusable = state
            .content
            .reusable
            .get(id)
            .ok_or_else(|| StateError::UnknownReusable(id.clone()))?;
        state
            .transactions
            .check_available(&ResourceKey::Reusable(id.clone()))?;

        let node = BlockNode::new(reusable.type_name.clone()).with_attributes(reusable.attributes.clone());
        let payload = ReusablePayload {
            id: id.persisted_id(),
            title: reusable.title.clone(),
            content: self.codec.serialize(&[node]),
        };
        let txn = self.ids.allocate();

        Ok(Plan::follow(vec![Intent::SaveReusableBlockStarted {
            id: id.clone(),
            txn,
        }])
        .with_task(Effect::SaveReusable {
            txn,
            id: id.clone(),
            payload,
        }))
    }

    fn delete_reusable_block(&mut self, state: &EditorState, id: &ReusableRef) -> Result<Plan, EditorError> {
        let Some(persisted_id) = id.persisted_id() else {
            debug!(reusable = %id, "temporary reusable block has nothing to delete");
            return Ok(Plan::none());
        };
        if state.content.reusable.get(id).is_none() {
            return Err(StateError::UnknownReusable(id.clone()).into());
        }
        state
            .transactions
            .check_available(&ResourceKey::Reusable(id.clone()))?;
        let txn = self.ids.allocate();

        Ok(Plan::follow(vec![
            Intent::RemoveNotice {
                id: DELETE_REUSABLE_BLOCK_NOTICE_ID.to_string(),
            },
            Intent::RemoveReusableBlock {
                id: id.clone(),
                txn,
            },
        ])
        .with_task(Effect::DeleteReusable {
            txn,
            id: id.clone(),
            persisted_id,
        }))
    }

    fn convert_to_static(&self, state: &EditorState, id: &BlockId) -> Result<Plan, EditorError> {
        let block = state
            .tree()
            .get(id)
            .ok_or_else(|| StateError::UnknownBlock(id.clone()))?;
        let Some(reference) = block
            .attributes
            .get("ref")
            .and_then(ReusableRef::from_attribute)
            .filter(|_| block.type_name == self.config.reference_block_type)
        else {
            debug!(block_id = %id, "not a reusable reference");
            return Ok(Plan::none());
        };
        let reusable = state
            .content
            .reusable
            .get(&reference)
            .ok_or_else(|| StateError::UnknownReusable(reference.clone()))?;

        let replacement = self
            .registry
            .create_block(&reusable.type_name, reusable.attributes.clone());
        Ok(Plan::follow(vec![Intent::ReplaceBlocks {
            ids: vec![id.clone()],
            blocks: vec![replacement],
        }]))
    }

    fn convert_to_reusable(&self, state: &EditorState, id: &BlockId) -> Result<Plan, EditorError> {
        let block = state
            .tree()
            .get(id)
            .ok_or_else(|| StateError::UnknownBlock(id.clone()))?;

        let reference = ReusableRef::temporary();
        let reusable = ReusableBlock {
            id: reference.clone(),
            title: UNTITLED_REUSABLE_BLOCK.to_string(),
            type_name: block.type_name.clone(),
            attributes: block.attributes.clone(),
        };
        let reference_block = BlockNode::new(self.config.reference_block_type.clone())
            .with_attribute("ref", reference.to_attribute());

        Ok(Plan::follow(vec![
            Intent::ReceiveReusableBlocks {
                blocks: vec![reusable],
            },
            Intent::ReplaceBlocks {
                ids: vec![id.clone()],
                blocks: vec![reference_block],
            },
            Intent::SaveReusableBlock { id: reference },
        ]))
    }
}

/// Run `effect` and return the intents describing its outcome
#[instrument(skip(persistence, codec))]
pub async fn perform(
    persistence: Arc<dyn PersistenceService>,
    codec: Arc<dyn ContentCodec>,
    effect: Effect,
) -> Vec<Intent> {
    match effect {
        Effect::UpdateDocument {
            txn,
            id,
            previous,
            edits,
        } => match persistence.update_document(id, edits.clone()).await {
            Ok(post) => vec![Intent::RequestPostUpdateSuccess {
                previous,
                post,
                txn,
            }],
            Err(error) => {
                warn!(txn = %txn, %error, "post update failed");
                vec![Intent::RequestPostUpdateFailure {
                    error,
                    post: previous,
                    edits,
                    txn,
                }]
            }
        },

        Effect::TrashPost { txn, id } => {
            match persistence.delete_resource(ResourceKind::Post, id).await {
                Ok(()) => vec![Intent::TrashPostSuccess { txn }],
                Err(error) => {
                    warn!(txn = %txn, %error, "trashing post failed");
                    vec![Intent::TrashPostFailure { error, txn }]
                }
            }
        }

        Effect::FetchReusable { id } => match persistence.fetch_reusable_blocks(id).await {
            Ok(stored) => {
                let blocks = stored
                    .iter()
                    .filter(|entry| !entry.trashed)
                    .filter_map(|entry| decode_reusable(codec.as_ref(), entry))
                    .collect();
                vec![
                    Intent::ReceiveReusableBlocks { blocks },
                    Intent::FetchReusableBlocksSuccess { id },
                ]
            }
            Err(error) => {
                warn!(%error, "fetching reusable blocks failed");
                vec![Intent::FetchReusableBlocksFailure { id, error }]
            }
        },

        Effect::SaveReusable { txn, id, payload } => {
            match persistence.create_or_update_reusable(payload).await {
                Ok(saved) => vec![Intent::SaveReusableBlockSuccess {
                    id,
                    updated_id: saved.id,
                    txn,
                }],
                Err(error) => {
                    warn!(txn = %txn, reusable = %id, %error, "saving reusable block failed");
                    vec![Intent::SaveReusableBlockFailure { id, error, txn }]
                }
            }
        }

        Effect::DeleteReusable {
            txn,
            id,
            persisted_id,
        } => match persistence
            .delete_resource(ResourceKind::ReusableBlock, persisted_id)
            .await
        {
            Ok(()) => vec![Intent::DeleteReusableBlockSuccess { id, txn }],
            Err(error) => {
                warn!(txn = %txn, reusable = %id, %error, "deleting reusable block failed");
                vec![Intent::DeleteReusableBlockFailure { id, error, txn }]
            }
        },
    }
}

/// Parse a stored reusable block. Entries whose content does not parse to
/// at least one block are skipped.
fn decode_reusable(codec: &dyn ContentCodec, stored: &StoredReusable) -> Option<ReusableBlock> {
    let nodes = match codec.parse(&stored.content) {
        Ok(nodes) => nodes,
        Err(error) => {
            warn!(reusable = stored.id, %error, "skipping unparseable reusable block");
            return None;
        }
    };
    let node = nodes.into_iter().next()?;
    Some(ReusableBlock {
        id: ReusableRef::Persisted(stored.id),
        title: stored.title.clone(),
        type_name: node.type_name().to_string(),
        attributes: node.attributes().clone(),
    })
}
