//! Reusable blocks: named, independently persisted block fragments that
//! documents embed through reference blocks.

use folio_blocks::{AttrValue, Attributes, Block};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Id of a reusable block. Temporary ids are generated client-side and
/// have never been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReusableRef {
    Persisted(u64),
    Temporary(String),
}

impl ReusableRef {
    pub fn temporary() -> Self {
        ReusableRef::Temporary(format!("tmp-{}", Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, ReusableRef::Temporary(_))
    }

    pub fn persisted_id(&self) -> Option<u64> {
        match self {
            ReusableRef::Persisted(id) => Some(*id),
            ReusableRef::Temporary(_) => None,
        }
    }

    /// Read a `ref` attribute. Anything that is not an integer is temporary.
    pub fn from_attribute(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Number(number) => number.as_u64().map(ReusableRef::Persisted),
            AttrValue::String(text) => Some(
                text.parse::<u64>()
                    .map(ReusableRef::Persisted)
                    .unwrap_or_else(|_| ReusableRef::Temporary(text.clone())),
            ),
            _ => None,
        }
    }

    pub fn to_attribute(&self) -> AttrValue {
        match self {
            ReusableRef::Persisted(id) => AttrValue::from(*id),
            ReusableRef::Temporary(id) => AttrValue::from(id.as_str()),
        }
    }

    /// Does `block` reference this reusable block?
    pub fn is_referenced_by(&self, block: &Block, reference_type: &str) -> bool {
        block.type_name == reference_type
            && block
                .attributes
                .get("ref")
                .and_then(ReusableRef::from_attribute)
                .as_ref()
                == Some(self)
    }
}

impl fmt::Display for ReusableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReusableRef::Persisted(id) => write!(f, "{id}"),
            ReusableRef::Temporary(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReusableBlock {
    pub id: ReusableRef,
    pub title: String,
    pub type_name: String,
    pub attributes: Attributes,
}

impl ReusableBlock {
    pub fn is_temporary(&self) -> bool {
        self.id.is_temporary()
    }
}

/// Client-side table of reusable blocks plus request flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReusableBlocks {
    data: Arc<BTreeMap<ReusableRef, ReusableBlock>>,
    saving: BTreeSet<ReusableRef>,
    fetching: BTreeSet<Option<u64>>,
}

impl ReusableBlocks {
    pub fn get(&self, id: &ReusableRef) -> Option<&ReusableBlock> {
        self.data.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReusableBlock> {
        self.data.values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn upsert(&mut self, block: ReusableBlock) {
        Arc::make_mut(&mut self.data).insert(block.id.clone(), block);
    }

    pub fn remove(&mut self, id: &ReusableRef) -> Option<ReusableBlock> {
        if !self.data.contains_key(id) {
            return None;
        }
        Arc::make_mut(&mut self.data).remove(id)
    }

    /// Re-key an entry after the service assigned its canonical id
    pub fn swap_id(&mut self, from: &ReusableRef, to: ReusableRef) {
        if let Some(mut block) = self.remove(from) {
            block.id = to;
            self.upsert(block);
        }
    }

    pub fn is_saving(&self, id: &ReusableRef) -> bool {
        self.saving.contains(id)
    }

    pub fn set_saving(&mut self, id: &ReusableRef, saving: bool) {
        if saving {
            self.saving.insert(id.clone());
        } else {
            self.saving.remove(id);
        }
    }

    /// `None` is the whole-collection fetch
    pub fn is_fetching(&self, id: Option<u64>) -> bool {
        self.fetching.contains(&id)
    }

    pub fn set_fetching(&mut self, id: Option<u64>, fetching: bool) {
        if fetching {
            self.fetching.insert(id);
        } else {
            self.fetching.remove(&id);
        }
    }
}
