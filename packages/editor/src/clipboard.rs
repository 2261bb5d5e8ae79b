//! Copy and cut of selected blocks.

use folio_blocks::{Block, BlockNode, ContentCodec, Visitor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardEvent {
    Copy,
    Cut,
}

/// Both representations written for a copied selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardPayload {
    pub plain_text: String,
    pub markup: String,
}

impl ClipboardPayload {
    /// Serialize `blocks`. Plain text is the blocks' `content` attributes,
    /// falling back to the markup when none of them has text.
    pub fn from_blocks(codec: &dyn ContentCodec, blocks: &[BlockNode]) -> Self {
        let markup = codec.serialize(blocks);
        let mut texts = TextCollector(Vec::new());
        texts.visit_nodes(blocks);
        let plain_text = if texts.0.is_empty() {
            markup.clone()
        } else {
            texts.0.join("\n\n")
        };
        Self { plain_text, markup }
    }
}

/// Host clipboard
pub trait Clipboard {
    fn write(&mut self, event: ClipboardEvent, payload: ClipboardPayload);
}

/// Non-empty `content` attributes, depth-first
struct TextCollector(Vec<String>);

impl Visitor for TextCollector {
    fn visit_block(&mut self, block: &Block) {
        if let Some(text) = block.attribute_str("content").filter(|text| !text.is_empty()) {
            self.0.push(text.to_string());
        }
    }
}
