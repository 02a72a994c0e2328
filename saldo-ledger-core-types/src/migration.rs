use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome recorded in the migration log. Stored as text guarded by a CHECK constraint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationLogValues {
    pub migration_name: String,
    pub status: MigrationStatus,
    pub message: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub execution_time_ms: i64,
}
