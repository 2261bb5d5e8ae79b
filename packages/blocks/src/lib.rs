//! # Folio Blocks
//!
//! The block data model shared by every Folio crate, plus the two narrow
//! collaborators the editing engine depends on:
//!
//! - **Block type registry**: schema, default attributes, merge and transform
//!   rules per block type name.
//! - **Content codec**: converts a block tree to and from markup.
//!
//! ```rust,ignore
//! use folio_blocks::{BlockNode, CommentCodec, ContentCodec};
//!
//! let codec = CommentCodec::new();
//! let tree = vec![BlockNode::new("core/paragraph").with_attribute("content", "Hello")];
//! let markup = codec.serialize(&tree);
//! let parsed = codec.parse(&markup)?;
//! ```

pub mod block;
pub mod codec;
pub mod error;
pub mod registry;
pub mod result;
pub mod visitor;

pub use block::{same_structure, AttrValue, Attributes, Block, BlockId, BlockNode};
pub use codec::{CommentCodec, ContentCodec, FREEFORM_BLOCK_TYPE};
pub use error::{BlockError, CodecError};
pub use registry::{
    is_valid_type_name, AttributeKind, AttributeSchema, BlockType, BlockTypeRegistry,
    InMemoryRegistry, MergeFn, Transform, TransformFn,
};
pub use result::{BlockResult, CodecResult};
pub use visitor::{walk_node, walk_node_mut, Visitor, VisitorMut};
