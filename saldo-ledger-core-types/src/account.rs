use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::primitives::*;

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountValues {
    pub id: AccountId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub account_type: AccountType,
    pub category: AccountCategory,
    pub parent_id: Option<AccountId>,
    pub is_header: bool,
    pub is_active: bool,
    /// Cached signed balance. Derived from the journal ledger, never authoritative.
    pub balance: Decimal,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl AccountValues {
    pub fn normal_balance(&self) -> DebitOrCredit {
        self.account_type.normal_balance()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether journal lines may reference this account.
    pub fn accepts_postings(&self) -> bool {
        !self.is_header && self.is_active && !self.is_deleted()
    }
}
