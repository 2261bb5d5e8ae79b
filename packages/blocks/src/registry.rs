//! # Block Type Registry
//!
//! Given a type name, the registry answers: which attributes does the type
//! declare (and their defaults), can two blocks of the type be merged, and
//! which other types can be transformed into it.
//!
//! Blocks whose type is not registered are opaque to the engine: they are
//! preserved as-is but never take part in merges or transforms.

use crate::block::{AttrValue, Attributes, Block, BlockNode};
use crate::error::BlockError;
use crate::result::BlockResult;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Merge rule: given the attributes of the first and second block (already
/// transformed into the first block's type), return a patch for the first.
pub type MergeFn = Arc<dyn Fn(&Attributes, &Attributes) -> Attributes + Send + Sync>;

/// Transform rule: convert a block of another type into one or more blocks.
pub type TransformFn = Arc<dyn Fn(&Block) -> Vec<BlockNode> + Send + Sync>;

/// JSON kind an attribute is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl AttributeKind {
    fn accepts(self, value: &AttrValue) -> bool {
        match self {
            AttributeKind::String => value.is_string(),
            AttributeKind::Number => value.is_number(),
            AttributeKind::Boolean => value.is_boolean(),
            AttributeKind::Array => value.is_array(),
            AttributeKind::Object => value.is_object(),
            AttributeKind::Any => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::Number => "number",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Array => "array",
            AttributeKind::Object => "object",
            AttributeKind::Any => "any",
        }
    }
}

/// Declared attribute: kind plus optional default value
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSchema {
    pub kind: AttributeKind,
    pub default: Option<AttrValue>,
}

impl AttributeSchema {
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<AttrValue>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A transform from another block type into the owning type
#[derive(Clone)]
pub struct Transform {
    pub from: String,
    pub convert: TransformFn,
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").field("from", &self.from).finish()
    }
}

/// Registered block type
#[derive(Clone)]
pub struct BlockType {
    pub name: String,
    pub title: String,
    pub attributes: BTreeMap<String, AttributeSchema>,
    pub merge: Option<MergeFn>,
    pub transforms: Vec<Transform>,
}

impl fmt::Debug for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockType")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("attributes", &self.attributes)
            .field("mergeable", &self.merge.is_some())
            .field("transforms", &self.transforms)
            .finish()
    }
}

impl BlockType {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            attributes: BTreeMap::new(),
            merge: None,
            transforms: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, schema: AttributeSchema) -> Self {
        self.attributes.insert(name.into(), schema);
        self
    }

    pub fn with_merge<F>(mut self, merge: F) -> Self
    where
        F: Fn(&Attributes, &Attributes) -> Attributes + Send + Sync + 'static,
    {
        self.merge = Some(Arc::new(merge));
        self
    }

    /// Declare that blocks of type `from` can be converted into this type
    pub fn with_transform_from<F>(mut self, from: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&Block) -> Vec<BlockNode> + Send + Sync + 'static,
    {
        self.transforms.push(Transform {
            from: from.into(),
            convert: Arc::new(convert),
        });
        self
    }

    /// Default attribute values declared by the schema
    pub fn default_attributes(&self) -> Attributes {
        self.attributes
            .iter()
            .filter_map(|(name, schema)| {
                schema
                    .default
                    .as_ref()
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    /// Check declared attribute kinds. Undeclared attributes are allowed.
    pub fn validate(&self, attributes: &Attributes) -> BlockResult<()> {
        for (name, value) in attributes {
            if let Some(schema) = self.attributes.get(name) {
                if !value.is_null() && !schema.kind.accepts(value) {
                    return Err(BlockError::InvalidAttribute {
                        block_type: self.name.clone(),
                        attribute: name.clone(),
                        expected: schema.kind.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Lookup interface the editing engine depends on
pub trait BlockTypeRegistry: Send + Sync {
    fn get_type(&self, name: &str) -> Option<&BlockType>;

    fn is_known_type(&self, name: &str) -> bool {
        self.get_type(name).is_some()
    }

    /// Create a block of `name`, with registry defaults under `attributes`
    fn create_block(&self, name: &str, attributes: Attributes) -> BlockNode {
        let mut merged = self
            .get_type(name)
            .map(BlockType::default_attributes)
            .unwrap_or_default();
        merged.extend(attributes);
        BlockNode::new(name).with_attributes(merged)
    }

    /// Convert `block` into blocks of type `target`.
    ///
    /// Returns `None` when either type is unknown, when no transform exists,
    /// or when the transform yields no block of the target type.
    fn switch_to_type(&self, block: &Block, target: &str) -> Option<Vec<BlockNode>> {
        if !self.is_known_type(&block.type_name) {
            return None;
        }
        if block.type_name == target {
            return Some(vec![BlockNode::from_block(block.clone())]);
        }

        let target_type = self.get_type(target)?;
        let transform = target_type
            .transforms
            .iter()
            .find(|t| t.from == block.type_name)?;

        let converted = (transform.convert)(block);
        if converted.iter().any(|node| node.type_name() == target) {
            Some(converted)
        } else {
            None
        }
    }
}

/// Registry backed by a hash map, populated at startup
#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistry {
    types: HashMap<String, BlockType>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, block_type: BlockType) -> BlockResult<()> {
        if !is_valid_type_name(&block_type.name) {
            return Err(BlockError::InvalidName(block_type.name));
        }
        if self.types.contains_key(&block_type.name) {
            return Err(BlockError::AlreadyRegistered(block_type.name));
        }
        tracing::debug!(block_type = %block_type.name, "Registering block type");
        self.types.insert(block_type.name.clone(), block_type);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> BlockResult<BlockType> {
        self.types
            .remove(name)
            .ok_or_else(|| BlockError::UnknownType(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl BlockTypeRegistry for InMemoryRegistry {
    fn get_type(&self, name: &str) -> Option<&BlockType> {
        self.types.get(name)
    }
}

/// `namespace/name`, lowercase alphanumerics and dashes
pub fn is_valid_type_name(name: &str) -> bool {
    let mut parts = name.split('/');
    let valid_part = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    };
    match (parts.next(), parts.next(), parts.next()) {
        (Some(namespace), Some(local), None) => valid_part(namespace) && valid_part(local),
        _ => false,
    }
}
