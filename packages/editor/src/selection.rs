//! # Selection Engine
//!
//! Single and range selection over block ids.
//!
//! ```text
//! Idle ──select──▶ Single ──drag──▶ MultiSelecting ──release──▶ MultiSelected
//!   ▲                 ▲                                              │
//!   └─────clear───────┴──────────────────click / escape──────────────┘
//! ```
//!
//! A range never crosses nesting levels: both endpoints must share a parent.

use crate::errors::StateError;
use crate::tree::BlockTree;
use folio_blocks::BlockId;
use serde::{Deserialize, Serialize};

/// Where the caret lands when a block gains focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaretPosition {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Idle,
    Single,
    MultiSelecting,
    MultiSelected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: Option<BlockId>,
    pub end: Option<BlockId>,
    pub is_multi_selecting: bool,
    pub is_enabled: bool,
    pub initial_caret: Option<CaretPosition>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            is_multi_selecting: false,
            is_enabled: true,
            initial_caret: None,
        }
    }
}

impl Selection {
    pub fn mode(&self) -> SelectionMode {
        if self.is_multi_selecting {
            return SelectionMode::MultiSelecting;
        }
        match (&self.start, &self.end) {
            (Some(start), Some(end)) if start == end => SelectionMode::Single,
            (Some(_), Some(_)) => SelectionMode::MultiSelected,
            _ => SelectionMode::Idle,
        }
    }

    /// The selected block when exactly one is selected
    pub fn single(&self) -> Option<&BlockId> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) if start == end => Some(start),
            _ => None,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!((&self.start, &self.end), (Some(start), Some(end)) if start != end)
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn touches(&self, id: &BlockId) -> bool {
        self.start.as_ref() == Some(id) || self.end.as_ref() == Some(id)
    }

    pub fn select(&mut self, id: BlockId, caret: Option<CaretPosition>) {
        self.start = Some(id.clone());
        self.end = Some(id);
        self.is_multi_selecting = false;
        self.initial_caret = caret;
    }

    pub fn select_range(&mut self, start: BlockId, end: BlockId) {
        self.start = Some(start);
        self.end = Some(end);
        self.initial_caret = None;
    }

    pub fn clear(&mut self) {
        self.start = None;
        self.end = None;
        self.is_multi_selecting = false;
        self.initial_caret = None;
    }

    /// Clear the selection if either endpoint no longer exists.
    ///
    /// Returns true when the selection changed.
    pub fn retain_existing(&mut self, tree: &BlockTree) -> bool {
        let missing = [&self.start, &self.end]
            .into_iter()
            .flatten()
            .any(|id| !tree.contains(id));
        if missing {
            self.clear();
        }
        missing
    }
}

/// Check that `start` and `end` can form a range
pub fn check_multi_select(
    tree: &BlockTree,
    start: &BlockId,
    end: &BlockId,
) -> Result<(), StateError> {
    let start_parent = tree
        .parent_of(start)
        .ok_or_else(|| StateError::UnknownBlock(start.clone()))?;
    let end_parent = tree
        .parent_of(end)
        .ok_or_else(|| StateError::UnknownBlock(end.clone()))?;

    if start_parent != end_parent {
        return Err(StateError::CrossParentSelection {
            start: start.clone(),
            end: end.clone(),
        });
    }
    Ok(())
}

/// Endpoints for a shift-click on `target`: extends from the current range
/// start (or single selection). `None` means select `target` alone.
pub fn shift_select_range(
    selection: &Selection,
    tree: &BlockTree,
    target: &BlockId,
) -> Result<Option<(BlockId, BlockId)>, StateError> {
    if !tree.contains(target) {
        return Err(StateError::UnknownBlock(target.clone()));
    }
    let Some(anchor) = selection.start.as_ref().filter(|id| tree.contains(id)) else {
        return Ok(None);
    };
    if anchor == target {
        return Ok(None);
    }
    check_multi_select(tree, anchor, target)?;
    Ok(Some((anchor.clone(), target.clone())))
}
