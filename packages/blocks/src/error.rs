use thiserror::Error;

/// Errors raised by the block type registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockError {
    #[error("Block type already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Unknown block type: {0}")]
    UnknownType(String),

    #[error("Invalid block type name: {0}")]
    InvalidName(String),

    #[error("Attribute {attribute} of {block_type} expected {expected}")]
    InvalidAttribute {
        block_type: String,
        attribute: String,
        expected: String,
    },
}

/// Errors raised while parsing markup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Unterminated comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },

    #[error("Invalid block name {name:?} at byte {offset}")]
    InvalidBlockName { name: String, offset: usize },

    #[error("Invalid attributes for {name} at byte {offset}: {message}")]
    InvalidAttributes {
        name: String,
        offset: usize,
        message: String,
    },

    #[error("Block {name} opened but never closed")]
    Unclosed { name: String },

    #[error("Closing delimiter for {found} at byte {offset} does not match {expected:?}")]
    MismatchedClose {
        expected: Option<String>,
        found: String,
        offset: usize,
    },
}
