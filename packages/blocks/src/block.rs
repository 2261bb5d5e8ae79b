//! Core block types.
//!
//! A [`Block`] is a typed unit of document content with a flat attribute map.
//! [`BlockNode`] is the nested form used at the edges of the engine (codec
//! input/output, insert/replace payloads); inside the editor blocks are stored
//! normalized by id.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Attribute values are plain JSON values.
pub type AttrValue = serde_json::Value;

/// Attribute map. Ordered by key so serialization is deterministic.
pub type Attributes = serde_json::Map<String, AttrValue>;

/// Unique identifier of a block, generated client-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single block: id, type name and attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,

    #[serde(rename = "name")]
    pub type_name: String,

    #[serde(default)]
    pub attributes: Attributes,
}

impl Block {
    pub fn new(id: BlockId, type_name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            attributes,
        }
    }

    /// Look up a string attribute
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_str)
    }
}

/// A block together with its nested inner blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNode {
    #[serde(flatten)]
    pub block: Block,

    #[serde(default, rename = "innerBlocks")]
    pub inner_blocks: Vec<BlockNode>,
}

impl BlockNode {
    /// Create a node of the given type with a freshly generated id
    pub fn new(type_name: impl Into<String>) -> Self {
        Self::with_id(BlockId::generate(), type_name)
    }

    /// Create a node with an explicit id
    pub fn with_id(id: impl Into<BlockId>, type_name: impl Into<String>) -> Self {
        Self {
            block: Block::new(id.into(), type_name, Attributes::new()),
            inner_blocks: Vec::new(),
        }
    }

    pub fn from_block(block: Block) -> Self {
        Self {
            block,
            inner_blocks: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.block.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.block.attributes.extend(attributes);
        self
    }

    pub fn with_inner_blocks(mut self, inner_blocks: Vec<BlockNode>) -> Self {
        self.inner_blocks = inner_blocks;
        self
    }

    pub fn id(&self) -> &BlockId {
        &self.block.id
    }

    pub fn type_name(&self) -> &str {
        &self.block.type_name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.block.attributes
    }

    /// Compare two trees ignoring block ids.
    ///
    /// Ids are generated client-side and never serialized, so this is the
    /// equivalence the codec round-trip preserves.
    pub fn same_structure(&self, other: &BlockNode) -> bool {
        self.block.type_name == other.block.type_name
            && self.block.attributes == other.block.attributes
            && self.inner_blocks.len() == other.inner_blocks.len()
            && self
                .inner_blocks
                .iter()
                .zip(&other.inner_blocks)
                .all(|(a, b)| a.same_structure(b))
    }
}

/// Compare two block lists ignoring ids
pub fn same_structure(a: &[BlockNode], b: &[BlockNode]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_structure(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = BlockId::generate();
        let b = BlockId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_node_serialization_uses_editor_field_names() {
        let node = BlockNode::with_id("a", "core/paragraph").with_attribute("content", "hi");
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["id"], "a");
        assert_eq!(json["name"], "core/paragraph");
        assert_eq!(json["attributes"]["content"], "hi");
        assert!(json["innerBlocks"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_same_structure_ignores_ids() {
        let a = BlockNode::with_id("a", "core/list")
            .with_inner_blocks(vec![BlockNode::with_id("b", "core/list-item")]);
        let b = BlockNode::with_id("x", "core/list")
            .with_inner_blocks(vec![BlockNode::with_id("y", "core/list-item")]);
        let c = BlockNode::with_id("x", "core/list");

        assert!(a.same_structure(&b));
        assert!(!a.same_structure(&c));
    }
}
