//! # Block Tree Store
//!
//! Normalized block storage: a table of blocks by id plus one ordered child
//! list per parent (the root counts as a virtual parent).
//!
//! ## Invariants
//!
//! - Every block has an order entry (possibly empty), and the root entry
//!   always exists.
//! - Every id in any order list exists in the block table and appears in
//!   exactly one list.
//! - Every block is reachable from the root, so the parent graph is a forest.
//!
//! All transitions are pure: they take `&self` and return a new tree. Both
//! tables sit behind `Arc`s, so unchanged trees share storage and snapshot
//! comparison short-circuits on pointer equality.

use crate::errors::StateError;
use folio_blocks::{is_valid_type_name, Attributes, Block, BlockId, BlockNode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

pub type TreeResult<T> = Result<T, StateError>;

/// Key of an order list: the root, or a parent block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentKey {
    Root,
    Block(BlockId),
}

impl ParentKey {
    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            ParentKey::Root => None,
            ParentKey::Block(id) => Some(id),
        }
    }
}

impl From<Option<BlockId>> for ParentKey {
    fn from(value: Option<BlockId>) -> Self {
        value.map_or(ParentKey::Root, ParentKey::Block)
    }
}

impl From<BlockId> for ParentKey {
    fn from(value: BlockId) -> Self {
        ParentKey::Block(value)
    }
}

impl fmt::Display for ParentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentKey::Root => f.write_str("<root>"),
            ParentKey::Block(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTree {
    blocks: Arc<HashMap<BlockId, Block>>,
    order: Arc<HashMap<ParentKey, Vec<BlockId>>>,
}

impl Default for BlockTree {
    fn default() -> Self {
        let mut order = HashMap::new();
        order.insert(ParentKey::Root, Vec::new());
        Self {
            blocks: Arc::new(HashMap::new()),
            order: Arc::new(order),
        }
    }
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: &[BlockNode]) -> TreeResult<Self> {
        Self::new().insert(nodes, &ParentKey::Root, None)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Ordered child ids of `parent` (empty for unknown parents)
    pub fn order(&self, parent: &ParentKey) -> &[BlockId] {
        self.order.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn root_order(&self) -> &[BlockId] {
        self.order(&ParentKey::Root)
    }

    pub(crate) fn blocks_table(&self) -> &Arc<HashMap<BlockId, Block>> {
        &self.blocks
    }

    pub(crate) fn order_table(&self) -> &Arc<HashMap<ParentKey, Vec<BlockId>>> {
        &self.order
    }

    /// Parent key and position of `id` within its parent's order list
    pub fn position(&self, id: &BlockId) -> Option<(ParentKey, usize)> {
        if !self.contains(id) {
            return None;
        }
        self.order.iter().find_map(|(parent, list)| {
            list.iter()
                .position(|candidate| candidate == id)
                .map(|index| (parent.clone(), index))
        })
    }

    pub fn parent_of(&self, id: &BlockId) -> Option<ParentKey> {
        self.position(id).map(|(parent, _)| parent)
    }

    pub fn previous_sibling(&self, id: &BlockId) -> Option<&BlockId> {
        let (parent, index) = self.position(id)?;
        index
            .checked_sub(1)
            .and_then(|previous| self.order(&parent).get(previous))
    }

    pub fn next_sibling(&self, id: &BlockId) -> Option<&BlockId> {
        let (parent, index) = self.position(id)?;
        self.order(&parent).get(index + 1)
    }

    /// All descendants of `id`, depth-first, excluding `id` itself
    pub fn descendants(&self, id: &BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack: Vec<&BlockId> = self
            .order(&ParentKey::Block(id.clone()))
            .iter()
            .rev()
            .collect();
        while let Some(next) = stack.pop() {
            out.push(next.clone());
            stack.extend(self.order(&ParentKey::Block(next.clone())).iter().rev());
        }
        out
    }

    /// Nested form of a single block
    pub fn node(&self, id: &BlockId) -> Option<BlockNode> {
        let block = self.get(id)?.clone();
        Some(
            BlockNode::from_block(block)
                .with_inner_blocks(self.to_nodes(&ParentKey::Block(id.clone()))),
        )
    }

    /// Nested form of every child of `parent`
    pub fn to_nodes(&self, parent: &ParentKey) -> Vec<BlockNode> {
        self.order(parent)
            .iter()
            .filter_map(|id| self.node(id))
            .collect()
    }

    /// Insert `nodes` (with their inner blocks) under `parent` at `index`,
    /// defaulting to the end of the list.
    pub fn insert(
        &self,
        nodes: &[BlockNode],
        parent: &ParentKey,
        index: Option<usize>,
    ) -> TreeResult<Self> {
        if let ParentKey::Block(id) = parent {
            if !self.contains(id) {
                return Err(StateError::UnknownParent(id.clone()));
            }
        }

        let mut next = self.clone();
        let blocks = Arc::make_mut(&mut next.blocks);
        let order = Arc::make_mut(&mut next.order);

        let mut top_level = Vec::with_capacity(nodes.len());
        for node in nodes {
            flatten_into(node, blocks, order)?;
            top_level.push(node.id().clone());
        }

        let siblings = order.entry(parent.clone()).or_default();
        let at = index.unwrap_or(siblings.len()).min(siblings.len());
        let tail = siblings.split_off(at);
        siblings.extend(top_level);
        siblings.extend(tail);

        Ok(next)
    }

    /// Remove `ids` and everything nested under them.
    ///
    /// Unknown ids are skipped; it is an error only if none are known.
    pub fn remove(&self, ids: &[BlockId]) -> TreeResult<Self> {
        if ids.is_empty() {
            return Ok(self.clone());
        }

        let targets = self.with_descendants(ids);
        if targets.is_empty() {
            return Err(StateError::UnknownBlock(ids[0].clone()));
        }

        let mut next = self.clone();
        let blocks = Arc::make_mut(&mut next.blocks);
        let order = Arc::make_mut(&mut next.order);

        for id in &targets {
            blocks.remove(id);
            order.remove(&ParentKey::Block(id.clone()));
        }
        for list in order.values_mut() {
            list.retain(|id| !targets.contains(id));
        }

        Ok(next)
    }

    /// Remove `ids` and splice `nodes` in where the first of them was
    pub fn replace(&self, ids: &[BlockId], nodes: &[BlockNode]) -> TreeResult<Self> {
        let Some(first) = ids.first() else {
            return Ok(self.clone());
        };
        let (parent, index) = self
            .position(first)
            .ok_or_else(|| StateError::UnknownBlock(first.clone()))?;

        let removing = self.with_descendants(ids);
        let at = self.order(&parent)[..index]
            .iter()
            .filter(|id| !removing.contains(*id))
            .count();

        self.remove(ids)?.insert(nodes, &parent, Some(at))
    }

    /// Shallow-merge `patch` into a block's attributes.
    ///
    /// Returns `Ok(None)` when every patched value is already present.
    pub fn update_attributes(&self, id: &BlockId, patch: &Attributes) -> TreeResult<Option<Self>> {
        let block = self
            .get(id)
            .ok_or_else(|| StateError::UnknownBlock(id.clone()))?;

        let changed = patch
            .iter()
            .any(|(key, value)| block.attributes.get(key) != Some(value));
        if !changed {
            return Ok(None);
        }

        let mut next = self.clone();
        if let Some(block) = Arc::make_mut(&mut next.blocks).get_mut(id) {
            for (key, value) in patch {
                block.attributes.insert(key.clone(), value.clone());
            }
        }
        Ok(Some(next))
    }

    /// Move a contiguous run of siblings one slot towards the start
    pub fn move_up(&self, ids: &[BlockId]) -> TreeResult<Option<Self>> {
        let Some((parent, start, len)) = self.contiguous_run(ids)? else {
            return Ok(None);
        };
        if start == 0 {
            return Ok(None);
        }

        let mut next = self.clone();
        if let Some(list) = Arc::make_mut(&mut next.order).get_mut(&parent) {
            list[start - 1..start + len].rotate_left(1);
        }
        Ok(Some(next))
    }

    /// Move a contiguous run of siblings one slot towards the end
    pub fn move_down(&self, ids: &[BlockId]) -> TreeResult<Option<Self>> {
        let Some((parent, start, len)) = self.contiguous_run(ids)? else {
            return Ok(None);
        };
        if start + len >= self.order(&parent).len() {
            return Ok(None);
        }

        let mut next = self.clone();
        if let Some(list) = Arc::make_mut(&mut next.order).get_mut(&parent) {
            list[start..=start + len].rotate_right(1);
        }
        Ok(Some(next))
    }

    /// Upsert blocks: known ids are replaced in place, new ones are
    /// appended to the root.
    pub fn receive(&self, nodes: &[BlockNode]) -> TreeResult<Self> {
        let mut next = self.clone();
        for node in nodes {
            next = if next.contains(node.id()) {
                next.replace(&[node.id().clone()], std::slice::from_ref(node))?
            } else {
                next.insert(std::slice::from_ref(node), &ParentKey::Root, None)?
            };
        }
        Ok(next)
    }

    /// Rewrite the attributes of every block for which `f` returns a
    /// replacement. Returns `None` if no block changed.
    pub fn map_attributes<F>(&self, mut f: F) -> Option<Self>
    where
        F: FnMut(&Block) -> Option<Attributes>,
    {
        let changes: Vec<(BlockId, Attributes)> = self
            .blocks
            .values()
            .filter_map(|block| f(block).map(|attrs| (block.id.clone(), attrs)))
            .collect();
        if changes.is_empty() {
            return None;
        }

        let mut next = self.clone();
        let blocks = Arc::make_mut(&mut next.blocks);
        for (id, attributes) in changes {
            if let Some(block) = blocks.get_mut(&id) {
                block.attributes = attributes;
            }
        }
        Some(next)
    }

    /// Verify the structural invariants listed in the module docs
    pub fn check_invariants(&self) -> TreeResult<()> {
        if !self.order.contains_key(&ParentKey::Root) {
            return Err(StateError::OrderCorrupted("missing root order list".into()));
        }

        let mut seen = HashSet::new();
        for (parent, list) in self.order.iter() {
            if let ParentKey::Block(id) = parent {
                if !self.blocks.contains_key(id) {
                    return Err(StateError::OrderCorrupted(format!(
                        "order list for missing block {id}"
                    )));
                }
            }
            for id in list {
                if !self.blocks.contains_key(id) {
                    return Err(StateError::UnknownBlock(id.clone()));
                }
                if !seen.insert(id) {
                    return Err(StateError::DuplicateBlock(id.clone()));
                }
            }
        }

        for id in self.blocks.keys() {
            if !self.order.contains_key(&ParentKey::Block(id.clone())) {
                return Err(StateError::OrderCorrupted(format!(
                    "block {id} has no order list"
                )));
            }
        }

        let mut reached = 0usize;
        let mut stack = vec![ParentKey::Root];
        while let Some(parent) = stack.pop() {
            for child in self.order(&parent) {
                reached += 1;
                if reached > self.blocks.len() {
                    return Err(StateError::WouldCreateCycle(child.clone()));
                }
                stack.push(ParentKey::Block(child.clone()));
            }
        }
        if reached != self.blocks.len() {
            return Err(StateError::OrderCorrupted(format!(
                "{} blocks unreachable from root",
                self.blocks.len() - reached
            )));
        }

        Ok(())
    }

    fn with_descendants(&self, ids: &[BlockId]) -> HashSet<BlockId> {
        let mut out = HashSet::new();
        for id in ids.iter().filter(|id| self.contains(id)) {
            out.insert(id.clone());
            out.extend(self.descendants(id));
        }
        out
    }

    /// Parent, start index and length of `ids` if they are adjacent
    /// siblings in order
    fn contiguous_run(&self, ids: &[BlockId]) -> TreeResult<Option<(ParentKey, usize, usize)>> {
        let Some(first) = ids.first() else {
            return Ok(None);
        };
        let (parent, start) = self
            .position(first)
            .ok_or_else(|| StateError::UnknownBlock(first.clone()))?;

        let siblings = self.order(&parent);
        for (offset, id) in ids.iter().enumerate() {
            if siblings.get(start + offset) != Some(id) {
                return Err(if self.contains(id) {
                    StateError::NotContiguous
                } else {
                    StateError::UnknownBlock(id.clone())
                });
            }
        }
        Ok(Some((parent, start, ids.len())))
    }
}

fn flatten_into(
    node: &BlockNode,
    blocks: &mut HashMap<BlockId, Block>,
    order: &mut HashMap<ParentKey, Vec<BlockId>>,
) -> TreeResult<()> {
    let id = node.id();
    if blocks.contains_key(id) {
        return Err(StateError::DuplicateBlock(id.clone()));
    }
    if !is_valid_type_name(node.type_name()) {
        return Err(StateError::InvalidBlockType {
            id: id.clone(),
            name: node.type_name().to_string(),
        });
    }
    blocks.insert(id.clone(), node.block.clone());
    order.insert(
        ParentKey::Block(id.clone()),
        node.inner_blocks.iter().map(|child| child.id().clone()).collect(),
    );
    for child in &node.inner_blocks {
        flatten_into(child, blocks, order)?;
    }
    Ok(())
}
