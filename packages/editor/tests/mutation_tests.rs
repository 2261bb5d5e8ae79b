//! Reducer and planner behavior for individual intents

use folio_blocks::{BlockId, BlockNode, BlockType, CommentCodec, InMemoryRegistry};
use folio_editor::{
    reduce, selectors, CaretPosition, Editor, EditorConfig, EditorError, EditorState, Intent,
    PersistenceError, PersistenceService, Post, PostEdits, PostStatus, ResourceKind,
    ReusableBlock, ReusablePayload, ReusableRef, SavedReusable, StateError, StoredReusable,
    TransactionId,
};
use serde_json::json;
use std::sync::Arc;

struct Unreachable;

#[async_trait::async_trait]
impl PersistenceService for Unreachable {
    async fn update_document(&self, _id: u64, _edits: PostEdits) -> Result<Post, PersistenceError> {
        Err(PersistenceError::unknown())
    }

    async fn delete_resource(&self, _kind: ResourceKind, _id: u64) -> Result<(), PersistenceError> {
        Err(PersistenceError::unknown())
    }

    async fn create_or_update_reusable(
        &self,
        _payload: ReusablePayload,
    ) -> Result<SavedReusable, PersistenceError> {
        Err(PersistenceError::unknown())
    }

    async fn fetch_reusable_blocks(
        &self,
        _id: Option<u64>,
    ) -> Result<Vec<StoredReusable>, PersistenceError> {
        Err(PersistenceError::unknown())
    }
}

fn id(value: &str) -> BlockId {
    BlockId::from(value)
}

fn paragraph(id: &str, content: &str) -> BlockNode {
    BlockNode::with_id(id, "core/paragraph").with_attribute("content", content)
}

fn state_with(blocks: Vec<BlockNode>) -> (EditorState, EditorConfig) {
    let config = EditorConfig::default().strict();
    let mut state = EditorState::new(&config);
    reduce(&mut state, &Intent::ResetBlocks { blocks }, &config).unwrap();
    (state, config)
}

fn merging_registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry
        .register(BlockType::new("core/paragraph").with_merge(|a, b| {
            let text = |attrs: &folio_blocks::Attributes| {
                attrs
                    .get("content")
                    .and_then(|value| value.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let mut merged = folio_blocks::Attributes::new();
            merged.insert("content".into(), json!(text(a) + &text(b)));
            merged
        }))
        .unwrap();
    registry
}

#[test]
fn test_replace_moves_selection_to_last_replacement() {
    let (mut state, config) = state_with(vec![paragraph("a", "x"), paragraph("b", "y")]);
    reduce(
        &mut state,
        &Intent::SelectBlock {
            id: id("a"),
            initial_caret: None,
        },
        &config,
    )
    .unwrap();

    reduce(
        &mut state,
        &Intent::ReplaceBlocks {
            ids: vec![id("a")],
            blocks: vec![paragraph("a1", "x1"), paragraph("a2", "x2")],
        },
        &config,
    )
    .unwrap();

    assert_eq!(
        selectors::get_block_order(&state, None),
        &[id("a1"), id("a2"), id("b")]
    );
    assert_eq!(selectors::get_selected_block_id(&state), Some(&id("a2")));
}

#[test]
fn test_moving_non_contiguous_blocks_is_rejected() {
    let (mut state, config) =
        state_with(vec![paragraph("a", ""), paragraph("b", ""), paragraph("c", "")]);
    let before = state.tree().clone();

    let result = reduce(
        &mut state,
        &Intent::MoveBlocksDown {
            ids: vec![id("a"), id("c")],
        },
        &config,
    );

    assert!(matches!(
        result,
        Err(EditorError::State(StateError::NotContiguous))
    ));
    assert_eq!(state.tree(), &before);
}

#[test]
fn test_multi_select_across_parents_is_rejected() {
    let (mut state, config) = state_with(vec![
        paragraph("a", ""),
        BlockNode::with_id("g", "core/group").with_inner_blocks(vec![paragraph("c", "")]),
    ]);

    let result = reduce(
        &mut state,
        &Intent::MultiSelect {
            start: id("a"),
            end: id("c"),
        },
        &config,
    );

    assert!(matches!(
        result,
        Err(EditorError::State(StateError::CrossParentSelection { .. }))
    ));
    assert!(state.selection.is_empty());
}

#[test]
fn test_receive_on_clean_document_stays_clean() {
    let (mut state, config) = state_with(vec![paragraph("a", "old")]);

    reduce(
        &mut state,
        &Intent::ReceiveBlocks {
            blocks: vec![paragraph("a", "new"), paragraph("z", "")],
        },
        &config,
    )
    .unwrap();

    assert!(!state.content.is_dirty());
    assert!(!selectors::can_undo(&state));
    assert_eq!(selectors::get_block_count(&state, None), 2);
    assert_eq!(
        selectors::get_block(&state, &id("a")).and_then(|block| block.attribute_str("content")),
        Some("new")
    );
}

#[test]
fn test_editing_back_to_saved_value_is_clean() {
    let (mut state, config) = state_with(Vec::new());
    let mut post = Post::new(1, PostStatus::Draft);
    post.title = "Original".to_string();
    reduce(&mut state, &Intent::ResetPost { post }, &config).unwrap();

    reduce(
        &mut state,
        &Intent::EditPost {
            edits: PostEdits::title("Changed"),
            coalesce: false,
        },
        &config,
    )
    .unwrap();
    assert!(selectors::is_edited_post_dirty(&state));
    assert_eq!(
        selectors::get_edited_post_attribute(&state, "title"),
        Some(json!("Changed"))
    );

    reduce(
        &mut state,
        &Intent::EditPost {
            edits: PostEdits::title("Original"),
            coalesce: false,
        },
        &config,
    )
    .unwrap();
    assert!(!selectors::is_edited_post_dirty(&state));
}

#[test]
fn test_reusable_id_swap_rewrites_history() {
    let (mut state, config) = state_with(vec![paragraph("a", "")]);
    let temporary = ReusableRef::temporary();
    reduce(
        &mut state,
        &Intent::ReceiveReusableBlocks {
            blocks: vec![ReusableBlock {
                id: temporary.clone(),
                title: "Untitled block".to_string(),
                type_name: "core/paragraph".to_string(),
                attributes: Default::default(),
            }],
        },
        &config,
    )
    .unwrap();
    reduce(
        &mut state,
        &Intent::InsertBlocks {
            blocks: vec![BlockNode::with_id("r", "core/block")
                .with_attribute("ref", temporary.to_attribute())],
            parent: None,
            index: None,
        },
        &config,
    )
    .unwrap();
    reduce(
        &mut state,
        &Intent::UpdateBlockAttributes {
            id: id("a"),
            attributes: json!({ "content": "later" }).as_object().cloned().unwrap(),
            coalesce: false,
        },
        &config,
    )
    .unwrap();

    let txn = TransactionId(1);
    reduce(
        &mut state,
        &Intent::SaveReusableBlockStarted {
            id: temporary.clone(),
            txn,
        },
        &config,
    )
    .unwrap();
    assert!(selectors::is_saving_reusable_block(&state, &temporary));

    reduce(
        &mut state,
        &Intent::SaveReusableBlockSuccess {
            id: temporary.clone(),
            updated_id: 9,
            txn,
        },
        &config,
    )
    .unwrap();
    assert!(selectors::get_reusable_block(&state, &temporary).is_none());
    assert!(selectors::get_reusable_block(&state, &ReusableRef::Persisted(9)).is_some());

    // The undo level recorded before the swap references the new id too
    reduce(&mut state, &Intent::Undo, &config).unwrap();
    let reference = selectors::get_block(&state, &id("r")).unwrap();
    assert_eq!(
        reference.attributes.get("ref").and_then(ReusableRef::from_attribute),
        Some(ReusableRef::Persisted(9))
    );
}

#[test]
fn test_merge_combines_and_places_caret_at_end() {
    let mut editor = Editor::new(
        EditorConfig::default(),
        Arc::new(merging_registry()),
        Arc::new(CommentCodec::new()),
        Arc::new(Unreachable),
    );
    editor
        .dispatch(Intent::ResetBlocks {
            blocks: vec![paragraph("a", "Hello "), paragraph("b", "world")],
        })
        .unwrap();

    editor
        .dispatch(Intent::MergeBlocks {
            first: id("a"),
            second: id("b"),
        })
        .unwrap();

    let state = editor.state();
    assert_eq!(selectors::get_block_order(state, None), &[id("a")]);
    assert_eq!(
        selectors::get_block(state, &id("a")).and_then(|block| block.attribute_str("content")),
        Some("Hello world")
    );
    assert_eq!(selectors::get_selected_block_id(state), Some(&id("a")));
    assert_eq!(state.selection.initial_caret, Some(CaretPosition::End));
}

#[test]
fn test_convert_reference_back_to_static_block() {
    let mut editor = Editor::new(
        EditorConfig::default(),
        Arc::new(merging_registry()),
        Arc::new(CommentCodec::new()),
        Arc::new(Unreachable),
    );
    editor
        .dispatch(Intent::ReceiveReusableBlocks {
            blocks: vec![ReusableBlock {
                id: ReusableRef::Persisted(3),
                title: "Footer".to_string(),
                type_name: "core/paragraph".to_string(),
                attributes: json!({ "content": "(c) Folio" }).as_object().cloned().unwrap(),
            }],
        })
        .unwrap();
    editor
        .dispatch(Intent::ResetBlocks {
            blocks: vec![BlockNode::with_id("r", "core/block").with_attribute("ref", 3)],
        })
        .unwrap();

    editor
        .dispatch(Intent::ConvertBlockToStatic { id: id("r") })
        .unwrap();

    let state = editor.state();
    let order = selectors::get_block_order(state, None);
    assert_eq!(order.len(), 1);
    let block = selectors::get_block(state, &order[0]).unwrap();
    assert_eq!(block.type_name, "core/paragraph");
    assert_eq!(block.attribute_str("content"), Some("(c) Folio"));
    assert!(selectors::is_edited_post_dirty(state));
}

#[test]
fn test_merge_without_transform_falls_back_to_selection() {
    let mut editor = Editor::new(
        EditorConfig::default(),
        Arc::new(merging_registry()),
        Arc::new(CommentCodec::new()),
        Arc::new(Unreachable),
    );
    editor
        .dispatch(Intent::ResetBlocks {
            blocks: vec![paragraph("p", "text"), BlockNode::with_id("i", "core/image")],
        })
        .unwrap();
    editor
        .dispatch(Intent::SelectBlock {
            id: id("i"),
            initial_caret: None,
        })
        .unwrap();

    editor
        .dispatch(Intent::MergeBlocks {
            first: id("p"),
            second: id("i"),
        })
        .unwrap();

    let state = editor.state();
    assert_eq!(selectors::get_block_order(state, None), &[id("p"), id("i")]);
    assert_eq!(selectors::get_selected_block_id(state), Some(&id("p")));
}
