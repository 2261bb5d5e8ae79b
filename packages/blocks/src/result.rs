use crate::error::{BlockError, CodecError};

/// Result type for registry operations
pub type BlockResult<T> = Result<T, BlockError>;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
