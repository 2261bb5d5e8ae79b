//! End-to-end behavior of the editor container against a scripted
//! persistence service

mod support;

use folio_blocks::{BlockId, BlockNode};
use folio_editor::{
    selectors, CaretPosition, EditorConfig, EditorError, Intent, NoticeStatus, PersistenceError,
    PostEdits, PostStatus, ResourceKey, ResourceKind, ReusableBlock, ReusableRef, StoredReusable,
    TransactionError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::{editor, paragraph, post_with, Call, RecordingSink, ScriptedPersistence};

fn id(value: &str) -> BlockId {
    BlockId::from(value)
}

fn attrs(value: serde_json::Value) -> folio_blocks::Attributes {
    value.as_object().cloned().unwrap_or_default()
}

// ============================================================================
// Block tree and selection
// ============================================================================

#[test]
fn test_insert_at_index_zero_prepends() -> anyhow::Result<()> {
    let mut editor = editor(ScriptedPersistence::new());

    editor.dispatch(Intent::InsertBlocks {
        blocks: vec![paragraph("P", "")],
        parent: None,
        index: Some(0),
    })?;
    editor.dispatch(Intent::InsertBlocks {
        blocks: vec![BlockNode::with_id("H", "core/heading")],
        parent: None,
        index: Some(0),
    })?;

    assert_eq!(selectors::get_block_order(editor.state(), None), &[id("H"), id("P")]);
    assert_eq!(selectors::get_selected_block_id(editor.state()), Some(&id("H")));
    Ok(())
}

#[test]
fn test_removing_whole_selection_without_previous_sibling_clears() -> anyhow::Result<()> {
    let mut editor = editor(ScriptedPersistence::new());
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![BlockNode::with_id("H", "core/heading"), paragraph("P", "")],
    })?;

    editor.dispatch(Intent::SelectBlock {
        id: id("H"),
        initial_caret: None,
    })?;
    editor.dispatch(Intent::ShiftSelect { id: id("P") })?;
    let selected = selectors::get_multi_selected_ids(editor.state());
    assert_eq!(selected, vec![id("H"), id("P")]);

    editor.dispatch(Intent::RemoveBlocks {
        ids: selected,
        select_previous: true,
    })?;

    assert!(editor.state().tree().is_empty());
    assert!(editor.state().selection.is_empty());
    Ok(())
}

#[test]
fn test_removing_selection_moves_to_previous_sibling() -> anyhow::Result<()> {
    let mut editor = editor(ScriptedPersistence::new());
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![
            paragraph("X", "first"),
            BlockNode::with_id("H", "core/heading"),
            paragraph("P", ""),
        ],
    })?;

    editor.dispatch(Intent::SelectBlock {
        id: id("H"),
        initial_caret: None,
    })?;
    editor.dispatch(Intent::ShiftSelect { id: id("P") })?;
    editor.dispatch(Intent::RemoveBlocks {
        ids: selectors::get_multi_selected_ids(editor.state()),
        select_previous: true,
    })?;

    let state = editor.state();
    assert_eq!(selectors::get_block_order(state, None), &[id("X")]);
    assert_eq!(selectors::get_selected_block_id(state), Some(&id("X")));
    assert_eq!(state.selection.initial_caret, Some(CaretPosition::End));
    Ok(())
}

#[test]
fn test_attribute_update_dirties_and_undo_restores() -> anyhow::Result<()> {
    let mut editor = editor(ScriptedPersistence::new());
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("P", "")],
    })?;
    assert!(!selectors::is_edited_post_dirty(editor.state()));

    editor.dispatch(Intent::UpdateBlockAttributes {
        id: id("P"),
        attributes: attrs(json!({ "content": "hi" })),
        coalesce: false,
    })?;
    assert!(selectors::is_edited_post_dirty(editor.state()));
    assert!(selectors::can_undo(editor.state()));

    editor.dispatch(Intent::Undo)?;
    let state = editor.state();
    assert!(!selectors::is_edited_post_dirty(state));
    assert_eq!(
        selectors::get_block(state, &id("P")).and_then(|block| block.attribute_str("content")),
        Some("")
    );

    editor.dispatch(Intent::Redo)?;
    assert!(selectors::is_edited_post_dirty(editor.state()));
    Ok(())
}

#[test]
fn test_setup_parses_content_and_keeps_post_clean() -> anyhow::Result<()> {
    let mut editor = editor(ScriptedPersistence::new());
    let post = post_with(
        3,
        PostStatus::Draft,
        &[paragraph("a", "One"), paragraph("b", "Two")],
    );

    editor.dispatch(Intent::SetupEditor {
        post,
        template: Vec::new(),
    })?;

    let state = editor.state();
    assert_eq!(selectors::get_block_count(state, None), 2);
    assert!(!selectors::is_edited_post_dirty(state));
    assert!(!selectors::can_undo(state));
    assert_eq!(selectors::get_current_post(state).id, 3);
    Ok(())
}

// ============================================================================
// Post persistence
// ============================================================================

#[tokio::test]
async fn test_failed_save_restores_pre_save_state() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let sink = Arc::new(RecordingSink::default());
    let mut editor = editor(service.clone()).with_notice_sink(sink.clone());

    editor.dispatch(Intent::ResetPost {
        post: post_with(7, PostStatus::Draft, &[]),
    })?;
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("P", "")],
    })?;
    editor.dispatch(Intent::UpdateBlockAttributes {
        id: id("P"),
        attributes: attrs(json!({ "content": "draft text" })),
        coalesce: false,
    })?;
    let before = editor.state().snapshot();

    service.fail_next_update(PersistenceError::transport("connection reset"));
    editor.dispatch(Intent::RequestPostUpdate)?;
    assert!(selectors::is_saving_post(editor.state()));
    assert!(!selectors::is_edited_post_dirty(editor.state()));

    editor.settle().await?;

    assert_eq!(editor.state().snapshot(), before);
    assert!(selectors::is_edited_post_dirty(editor.state()));
    assert!(editor.state().transactions.is_empty());

    let errors: Vec<_> = sink
        .notices()
        .into_iter()
        .filter(|notice| notice.status == NoticeStatus::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Updating failed");
    assert_eq!(selectors::get_notices(editor.state()).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_edits_made_while_saving_survive_a_failure() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let mut editor = editor(service.clone());
    editor.dispatch(Intent::ResetPost {
        post: post_with(7, PostStatus::Draft, &[]),
    })?;
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("P", "")],
    })?;

    service.fail_next_update(PersistenceError::transport("timeout"));
    editor.dispatch(Intent::RequestPostUpdate)?;
    editor.dispatch(Intent::UpdateBlockAttributes {
        id: id("P"),
        attributes: attrs(json!({ "content": "typed during save" })),
        coalesce: false,
    })?;
    editor.settle().await?;

    let state = editor.state();
    assert_eq!(
        selectors::get_block(state, &id("P")).and_then(|block| block.attribute_str("content")),
        Some("typed during save")
    );
    assert!(selectors::is_edited_post_dirty(state));
    assert!(!selectors::is_saving_post(state));
    Ok(())
}

#[tokio::test]
async fn test_publishing_saves_and_announces() -> anyhow::Result<()> {
    let draft = post_with(7, PostStatus::Draft, &[]);
    let service = ScriptedPersistence::new().with_post(draft.clone());
    let mut editor = editor(service.clone());
    editor.dispatch(Intent::ResetPost { post: draft })?;
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("P", "Body")],
    })?;

    editor.dispatch(Intent::EditPost {
        edits: PostEdits::status(PostStatus::Publish),
        coalesce: false,
    })?;
    assert!(selectors::is_edited_post_dirty(editor.state()));
    editor.dispatch(Intent::RequestPostUpdate)?;
    editor.settle().await?;

    let state = editor.state();
    assert_eq!(selectors::get_current_post(state).status, PostStatus::Publish);
    assert!(!selectors::is_edited_post_dirty(state));
    assert!(selectors::is_current_post_published(state));
    assert!(state.transactions.pending_for(&ResourceKey::CurrentPost).is_none());

    let notices = selectors::get_notices(state);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].status, NoticeStatus::Success);
    assert_eq!(notices[0].message, "Post published!");

    let Some(Call::UpdateDocument { id: 7, edits }) = service.calls().into_iter().next() else {
        panic!("expected a document update, got {:?}", service.calls());
    };
    assert_eq!(edits.status, Some(PostStatus::Publish));
    assert!(edits.content.as_deref().is_some_and(|content| content.contains("Body")));
    Ok(())
}

#[tokio::test]
async fn test_second_save_while_in_flight_is_rejected() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let mut editor = editor(service.clone());
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("P", "Body")],
    })?;

    editor.dispatch(Intent::RequestPostUpdate)?;
    let second = editor.dispatch(Intent::RequestPostUpdate);
    assert!(matches!(
        second,
        Err(EditorError::Transaction(TransactionError::InFlight { .. }))
    ));

    editor.settle().await?;
    assert_eq!(service.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_trash_marks_post_trashed() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let mut editor = editor(service.clone());
    editor.dispatch(Intent::ResetPost {
        post: post_with(9, PostStatus::Draft, &[]),
    })?;

    editor.dispatch(Intent::TrashPost)?;
    assert!(selectors::is_trashing_post(editor.state()));
    editor.settle().await?;

    assert_eq!(
        selectors::get_current_post(editor.state()).status,
        PostStatus::Trash
    );
    assert_eq!(
        service.calls(),
        vec![Call::DeleteResource {
            kind: ResourceKind::Post,
            id: 9
        }]
    );
    Ok(())
}

#[tokio::test]
async fn test_trash_failure_uses_service_message() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let mut editor = editor(service.clone());
    editor.dispatch(Intent::ResetPost {
        post: post_with(9, PostStatus::Draft, &[]),
    })?;

    service.fail_next_delete(PersistenceError::service(
        "rest_cannot_delete",
        "Sorry, you are not allowed to delete this post.",
    ));
    editor.dispatch(Intent::TrashPost)?;
    editor.settle().await?;

    let state = editor.state();
    assert_eq!(selectors::get_current_post(state).status, PostStatus::Draft);
    assert_eq!(
        selectors::get_notices(state)[0].message,
        "Sorry, you are not allowed to delete this post."
    );
    Ok(())
}

#[tokio::test]
async fn test_teardown_drops_in_flight_work() -> anyhow::Result<()> {
    let mut editor = editor(ScriptedPersistence::new());
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("P", "Body")],
    })?;

    editor.dispatch(Intent::RequestPostUpdate)?;
    assert_eq!(editor.in_flight(), 1);

    editor.teardown();
    assert_eq!(editor.in_flight(), 0);
    editor.settle().await?;
    assert_eq!(editor.autosave_deadline(), None);
    Ok(())
}

// ============================================================================
// Autosave
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_autosave_saves_new_post_as_draft() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let mut editor = editor(service.clone());
    editor.dispatch(Intent::SetupEditor {
        post: folio_editor::Post::new(11, PostStatus::AutoDraft),
        template: Vec::new(),
    })?;
    assert_eq!(editor.autosave_deadline(), None);

    editor.dispatch(Intent::AppendDefaultBlock)?;
    let armed = editor.autosave_deadline();
    assert!(armed.is_some());

    assert!(editor.run_autosave().await?);
    editor.settle().await?;

    let state = editor.state();
    assert_eq!(selectors::get_current_post(state).status, PostStatus::Draft);
    assert!(!selectors::is_edited_post_dirty(state));
    assert_eq!(editor.autosave_deadline(), None);
    assert!(matches!(
        service.calls().as_slice(),
        [Call::UpdateDocument { id: 11, .. }]
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_autosave_deadline_restarts_on_change() -> anyhow::Result<()> {
    let mut editor = editor(ScriptedPersistence::new());
    editor.dispatch(Intent::ResetPost {
        post: post_with(4, PostStatus::Draft, &[]),
    })?;
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("P", "")],
    })?;
    editor.dispatch(Intent::UpdateBlockAttributes {
        id: id("P"),
        attributes: attrs(json!({ "content": "a" })),
        coalesce: true,
    })?;
    let first = editor.autosave_deadline().expect("armed after an edit");

    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(!editor.tick_autosave()?);
    editor.dispatch(Intent::UpdateBlockAttributes {
        id: id("P"),
        attributes: attrs(json!({ "content": "ab" })),
        coalesce: true,
    })?;
    let second = editor.autosave_deadline().expect("still armed");
    assert!(second > first);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_published_posts_are_not_autosaved() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let mut editor = editor(service.clone());
    editor.dispatch(Intent::ResetPost {
        post: post_with(5, PostStatus::Publish, &[]),
    })?;
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("P", "")],
    })?;
    editor.dispatch(Intent::UpdateBlockAttributes {
        id: id("P"),
        attributes: attrs(json!({ "content": "live edit" })),
        coalesce: false,
    })?;

    assert!(selectors::is_edited_post_dirty(editor.state()));
    assert_eq!(editor.autosave_deadline(), None);

    editor.dispatch(Intent::Autosave)?;
    editor.settle().await?;
    assert!(service.calls().is_empty());
    Ok(())
}

// ============================================================================
// Reusable blocks
// ============================================================================

#[tokio::test]
async fn test_deleting_temporary_reusable_is_a_no_op() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let sink = Arc::new(RecordingSink::default());
    let mut editor = editor(service.clone()).with_notice_sink(sink.clone());

    let temporary = ReusableRef::temporary();
    editor.dispatch(Intent::ReceiveReusableBlocks {
        blocks: vec![ReusableBlock {
            id: temporary.clone(),
            title: "Draft".to_string(),
            type_name: "core/paragraph".to_string(),
            attributes: attrs(json!({ "content": "x" })),
        }],
    })?;
    let before = editor.state().snapshot();

    editor.dispatch(Intent::DeleteReusableBlock { id: temporary })?;
    editor.settle().await?;

    assert_eq!(editor.state().snapshot(), before);
    assert!(service.calls().is_empty());
    assert!(sink.notices().is_empty());
    assert!(editor.state().notices.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_convert_to_reusable_persists_and_rewrites_reference() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let mut editor = editor(service.clone());
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![paragraph("a", "Shared text")],
    })?;

    editor.dispatch(Intent::ConvertBlockToReusable { id: id("a") })?;
    editor.settle().await?;

    let state = editor.state();
    let persisted = ReusableRef::Persisted(100);
    let reusable = selectors::get_reusable_block(state, &persisted).expect("saved under new id");
    assert_eq!(reusable.attributes["content"], json!("Shared text"));
    assert_eq!(selectors::get_reusable_blocks(state).len(), 1);

    let order = selectors::get_block_order(state, None);
    assert_eq!(order.len(), 1);
    let reference = selectors::get_block(state, &order[0]).expect("reference block");
    assert_eq!(reference.type_name, "core/block");
    assert_eq!(
        reference.attributes.get("ref").and_then(ReusableRef::from_attribute),
        Some(persisted)
    );

    assert_eq!(selectors::get_notices(state)[0].message, "Block updated.");
    let calls = service.calls();
    let [Call::SaveReusable(payload)] = calls.as_slice() else {
        panic!("expected one save, got {calls:?}");
    };
    assert_eq!(payload.id, None);
    assert_eq!(payload.title, "Untitled block");
    Ok(())
}

#[tokio::test]
async fn test_fetch_skips_trashed_reusable_blocks() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new()
        .with_stored_reusable(StoredReusable {
            id: 5,
            title: "Signature".to_string(),
            content: r#"<!-- fp:core/paragraph {"content":"Bye"} /-->"#.to_string(),
            trashed: false,
        })
        .with_stored_reusable(StoredReusable {
            id: 6,
            title: "Old".to_string(),
            content: r#"<!-- fp:core/paragraph {"content":"Gone"} /-->"#.to_string(),
            trashed: true,
        });
    let mut editor = editor(service);

    editor.dispatch(Intent::FetchReusableBlocks { id: None })?;
    assert!(selectors::is_fetching_reusable_block(editor.state(), None));
    editor.settle().await?;

    let state = editor.state();
    assert!(!selectors::is_fetching_reusable_block(state, None));
    let blocks = selectors::get_reusable_blocks(state);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, ReusableRef::Persisted(5));
    assert_eq!(blocks[0].title, "Signature");
    Ok(())
}

#[tokio::test]
async fn test_failed_reusable_delete_restores_references() -> anyhow::Result<()> {
    let service = ScriptedPersistence::new();
    let mut editor = editor(service.clone());
    let persisted = ReusableRef::Persisted(42);
    editor.dispatch(Intent::ReceiveReusableBlocks {
        blocks: vec![ReusableBlock {
            id: persisted.clone(),
            title: "Footer".to_string(),
            type_name: "core/paragraph".to_string(),
            attributes: attrs(json!({ "content": "(c)" })),
        }],
    })?;
    editor.dispatch(Intent::ResetBlocks {
        blocks: vec![
            paragraph("a", "Body"),
            BlockNode::with_id("r", "core/block").with_attribute("ref", 42),
        ],
    })?;

    service.fail_next_delete(PersistenceError::transport("offline"));
    editor.dispatch(Intent::DeleteReusableBlock {
        id: persisted.clone(),
    })?;
    assert!(!editor.state().tree().contains(&id("r")));
    assert!(selectors::get_reusable_block(editor.state(), &persisted).is_none());

    editor.settle().await?;

    let state = editor.state();
    assert!(state.tree().contains(&id("r")));
    assert!(selectors::get_reusable_block(state, &persisted).is_some());
    assert_eq!(selectors::get_notices(state)[0].status, NoticeStatus::Error);
    Ok(())
}

#[test]
fn test_local_errors_only_surface_in_strict_mode() {
    let unknown = || Intent::UpdateBlockAttributes {
        id: id("missing"),
        attributes: attrs(json!({ "content": "x" })),
        coalesce: false,
    };

    let mut lenient = editor(ScriptedPersistence::new());
    assert!(lenient.dispatch(unknown()).is_ok());
    assert!(!selectors::can_undo(lenient.state()));

    let mut strict =
        support::editor_with(EditorConfig::default().strict(), ScriptedPersistence::new());
    assert!(strict.dispatch(unknown()).is_err());
}
