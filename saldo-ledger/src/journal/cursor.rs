use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use saldo_types::{
    journal::JournalEntryValues,
    primitives::{JournalEntryId, JournalStatus},
};

use crate::query::*;

/// Newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntryByCreatedAtCursor {
    pub created_at: DateTime<Utc>,
    pub id: JournalEntryId,
}

impl From<&JournalEntryValues> for JournalEntryByCreatedAtCursor {
    fn from(values: &JournalEntryValues) -> Self {
        Self {
            created_at: values.created_at,
            id: values.id,
        }
    }
}

impl Default for PaginatedQueryArgs<JournalEntryByCreatedAtCursor> {
    fn default() -> Self {
        Self {
            first: 100,
            after: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalFilter {
    pub status: Option<JournalStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
