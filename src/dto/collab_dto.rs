use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

/// One collaborative edit, tagged with the quiz version it was made against.
/// Used both as the HTTP body and as the WebSocket client frame.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplyChangeRequest {
    #[serde(alias = "changeType")]
    #[validate(length(min = 1, max = 64))]
    pub change_type: String,
    #[serde(default, alias = "changeData")]
    pub change_data: JsonValue,
    pub version: i64,
}
