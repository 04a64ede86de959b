use serde::{Deserialize, Serialize};

use crate::error::EditingError;

/// State persisted across process restarts and configuration changes.
///
/// Serialized as `{"text": "...", "caretPosition": 3}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreInfo {
    /// Field text.
    pub text: String,
    /// Caret offset in code units. Negative values clamp to 0 on restore.
    pub caret_position: i64,
}

impl RestoreInfo {
    /// Encodes the record as JSON.
    pub fn to_json(&self) -> Result<String, EditingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a record produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, EditingError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Caret offset clamped to the record's own text.
    pub fn caret(&self, len: usize) -> usize {
        usize::try_from(self.caret_position).unwrap_or(0).min(len)
    }
}
