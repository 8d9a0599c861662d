use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Immutable audit entry for one accepted collaborative change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizChange {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub author_id: Uuid,
    /// Change type exactly as submitted, unknown values included.
    pub change_type: String,
    pub change_data: JsonValue,
    /// Quiz version the change produced.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}
