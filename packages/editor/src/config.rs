//! Editor configuration
//!
//! All fields have defaults, so an empty JSON object is a valid config:
//!
//! ```json
//! { "autosave_interval_ms": 5000, "strict": true }
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BLOCK_TYPE: &str = "core/paragraph";
pub const REFERENCE_BLOCK_TYPE: &str = "core/block";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Delay between the last content change and an autosave
    #[serde(rename = "autosave_interval_ms", with = "millis")]
    pub autosave_interval: Duration,

    /// Maximum undo levels (0 = unlimited)
    pub history_limit: usize,

    /// Report local state errors from `dispatch` instead of ignoring them
    pub strict: bool,

    /// Pointer-move samples closer together than this are coalesced
    #[serde(rename = "pointer_throttle_ms", with = "millis")]
    pub pointer_throttle: Duration,

    /// Block type inserted by "append default block"
    pub default_block_type: String,

    /// Block type whose `ref` attribute points at a reusable block
    pub reference_block_type: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(10),
            history_limit: 100,
            strict: false,
            pointer_throttle: Duration::from_millis(16),
            default_block_type: DEFAULT_BLOCK_TYPE.to_string(),
            reference_block_type: REFERENCE_BLOCK_TYPE.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
