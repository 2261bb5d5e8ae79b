//! # Content Codec
//!
//! Converts between a block tree and its markup representation.
//!
//! The reference [`CommentCodec`] stores each block as an HTML comment
//! delimiter carrying the type name and JSON attributes:
//!
//! ```text
//! <!-- fp:core/paragraph {"content":"Hello"} /-->
//!
//! <!-- fp:core/group -->
//! <!-- fp:core/image {"url":"a.png"} /-->
//! <!-- /fp:core/group -->
//! ```
//!
//! Text outside any delimiter (including foreign comments) is preserved as
//! [`FREEFORM_BLOCK_TYPE`] blocks. Block ids are never serialized; parsing
//! always assigns fresh ids.

use crate::block::{Attributes, BlockNode};
use crate::error::CodecError;
use crate::registry::is_valid_type_name;
use crate::result::CodecResult;

/// Type name assigned to markup found outside block delimiters
pub const FREEFORM_BLOCK_TYPE: &str = "core/freeform";

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const PREFIX: &str = "fp:";
const BLOCK_SEPARATOR: &str = "\n\n";

/// Markup conversion interface
pub trait ContentCodec: Send + Sync {
    fn serialize(&self, blocks: &[BlockNode]) -> String;

    fn parse(&self, markup: &str) -> CodecResult<Vec<BlockNode>>;
}

/// Comment-delimited block markup
#[derive(Debug, Default, Clone, Copy)]
pub struct CommentCodec;

impl CommentCodec {
    pub fn new() -> Self {
        Self
    }

    fn serialize_node(&self, node: &BlockNode, out: &mut String) {
        if let Some(raw) = raw_freeform(node) {
            out.push_str(raw);
            return;
        }

        out.push_str(COMMENT_OPEN);
        out.push(' ');
        out.push_str(PREFIX);
        out.push_str(node.type_name());
        if !node.attributes().is_empty() {
            out.push(' ');
            out.push_str(&encode_attributes(node.attributes()));
        }

        if node.inner_blocks.is_empty() {
            out.push_str(" /");
            out.push_str(COMMENT_CLOSE);
            return;
        }

        out.push(' ');
        out.push_str(COMMENT_CLOSE);
        out.push('\n');
        self.serialize_list(&node.inner_blocks, out);
        out.push('\n');
        out.push_str(COMMENT_OPEN);
        out.push_str(" /");
        out.push_str(PREFIX);
        out.push_str(node.type_name());
        out.push(' ');
        out.push_str(COMMENT_CLOSE);
    }

    fn serialize_list(&self, nodes: &[BlockNode], out: &mut String) {
        for (index, node) in nodes.iter().enumerate() {
            if index > 0 {
                out.push_str(BLOCK_SEPARATOR);
            }
            self.serialize_node(node, out);
        }
    }
}

impl ContentCodec for CommentCodec {
    fn serialize(&self, blocks: &[BlockNode]) -> String {
        let mut out = String::new();
        self.serialize_list(blocks, &mut out);
        out
    }

    fn parse(&self, markup: &str) -> CodecResult<Vec<BlockNode>> {
        Parser::new(markup).parse()
    }
}

/// Freeform blocks with plain text content are written without delimiters
/// when the text survives re-parsing unchanged.
fn raw_freeform(node: &BlockNode) -> Option<&str> {
    if node.type_name() != FREEFORM_BLOCK_TYPE
        || !node.inner_blocks.is_empty()
        || node.attributes().len() != 1
    {
        return None;
    }
    let content = node.block.attribute_str("content")?;
    let survives = !content.is_empty()
        && content.trim() == content
        && !content.contains(COMMENT_OPEN)
        && !content.contains(BLOCK_SEPARATOR);
    survives.then_some(content)
}

/// JSON attributes with `--` escaped so they can never close the comment
fn encode_attributes(attributes: &Attributes) -> String {
    // Serializing a map of JSON values cannot fail
    let json = serde_json::to_string(attributes).unwrap_or_else(|_| "{}".to_string());
    json.replace("--", "\\u002d\\u002d")
}

enum Delimiter<'a> {
    Open {
        name: &'a str,
        attributes: Attributes,
        void: bool,
    },
    Close {
        name: &'a str,
    },
}

struct Frame<'a> {
    name: &'a str,
    attributes: Attributes,
    children: Vec<BlockNode>,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<Frame<'a>>,
    root: Vec<BlockNode>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            stack: Vec::new(),
            root: Vec::new(),
        }
    }

    fn parse(mut self) -> CodecResult<Vec<BlockNode>> {
        let src = self.src;
        while self.pos < src.len() {
            let rest = &src[self.pos..];
            let Some(rel) = rest.find(COMMENT_OPEN) else {
                self.push_text(rest);
                self.pos = src.len();
                break;
            };

            self.push_text(&rest[..rel]);
            let start = self.pos + rel;
            let body_start = start + COMMENT_OPEN.len();
            let body_len = src[body_start..]
                .find(COMMENT_CLOSE)
                .ok_or(CodecError::UnterminatedComment { offset: start })?;
            let end = body_start + body_len + COMMENT_CLOSE.len();
            let body = &src[body_start..body_start + body_len];

            match parse_delimiter(body, start)? {
                Some(Delimiter::Open {
                    name,
                    attributes,
                    void: true,
                }) => {
                    let node = BlockNode::new(name).with_attributes(attributes);
                    self.push_node(node);
                }
                Some(Delimiter::Open {
                    name,
                    attributes,
                    void: false,
                }) => self.stack.push(Frame {
                    name,
                    attributes,
                    children: Vec::new(),
                }),
                Some(Delimiter::Close { name }) => self.close(name, start)?,
                None => {
                    // Foreign comment, kept verbatim
                    let node = BlockNode::new(FREEFORM_BLOCK_TYPE)
                        .with_attribute("content", &src[start..end]);
                    self.push_node(node);
                }
            }

            self.pos = end;
        }

        if let Some(frame) = self.stack.pop() {
            return Err(CodecError::Unclosed {
                name: frame.name.to_string(),
            });
        }
        Ok(self.root)
    }

    fn close(&mut self, name: &str, offset: usize) -> CodecResult<()> {
        match self.stack.pop() {
            Some(frame) if frame.name == name => {
                let node = BlockNode::new(frame.name)
                    .with_attributes(frame.attributes)
                    .with_inner_blocks(frame.children);
                self.push_node(node);
                Ok(())
            }
            Some(frame) => Err(CodecError::MismatchedClose {
                expected: Some(frame.name.to_string()),
                found: name.to_string(),
                offset,
            }),
            None => Err(CodecError::MismatchedClose {
                expected: None,
                found: name.to_string(),
                offset,
            }),
        }
    }

    fn push_node(&mut self, node: BlockNode) {
        match self.stack.last_mut() {
            Some(frame) => frame.children.push(node),
            None => self.root.push(node),
        }
    }

    fn push_text(&mut self, text: &str) {
        for chunk in text.split(BLOCK_SEPARATOR) {
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                let node = BlockNode::new(FREEFORM_BLOCK_TYPE).with_attribute("content", chunk);
                self.push_node(node);
            }
        }
    }
}

fn parse_delimiter(body: &str, offset: usize) -> CodecResult<Option<Delimiter<'_>>> {
    let body = body.trim();

    if let Some(name) = body.strip_prefix('/').and_then(|b| b.strip_prefix(PREFIX)) {
        let name = name.trim();
        check_name(name, offset)?;
        return Ok(Some(Delimiter::Close { name }));
    }

    let Some(rest) = body.strip_prefix(PREFIX) else {
        return Ok(None);
    };

    let (rest, void) = match rest.strip_suffix('/') {
        Some(stripped) => (stripped.trim_end(), true),
        None => (rest, false),
    };

    let (name, json) = match rest.find(char::is_whitespace) {
        Some(split) => (&rest[..split], rest[split..].trim()),
        None => (rest, ""),
    };
    check_name(name, offset)?;

    let attributes = if json.is_empty() {
        Attributes::new()
    } else {
        serde_json::from_str::<Attributes>(json).map_err(|e| CodecError::InvalidAttributes {
            name: name.to_string(),
            offset,
            message: e.to_string(),
        })?
    };

    Ok(Some(Delimiter::Open {
        name,
        attributes,
        void,
    }))
}

fn check_name(name: &str, offset: usize) -> CodecResult<()> {
    if is_valid_type_name(name) {
        Ok(())
    } else {
        Err(CodecError::InvalidBlockName {
            name: name.to_string(),
            offset,
        })
    }
}
