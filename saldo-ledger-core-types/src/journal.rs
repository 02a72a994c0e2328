use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::primitives::*;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JournalReference {
    pub source_type: SourceType,
    pub source_id: Option<uuid::Uuid>,
}

impl JournalReference {
    pub fn manual() -> Self {
        Self {
            source_type: SourceType::Manual,
            source_id: None,
        }
    }

    pub fn new(source_type: SourceType, source_id: impl Into<uuid::Uuid>) -> Self {
        Self {
            source_type,
            source_id: Some(source_id.into()),
        }
    }

    pub fn reversal_of(entry_id: JournalEntryId) -> Self {
        Self::new(SourceType::Reversal, entry_id)
    }
}

impl Default for JournalReference {
    fn default() -> Self {
        Self::manual()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct JournalEntryValues {
    pub id: JournalEntryId,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub status: JournalStatus,
    pub description: String,
    #[sqlx(flatten)]
    pub reference: JournalReference,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub reverses_entry_id: Option<JournalEntryId>,
    pub reversed_by_entry_id: Option<JournalEntryId>,
    pub posted_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct JournalLineValues {
    pub id: JournalLineId,
    pub journal_entry_id: JournalEntryId,
    pub line_number: i32,
    pub account_id: AccountId,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    pub description: Option<String>,
}
