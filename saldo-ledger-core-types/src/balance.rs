use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::primitives::*;

/// A ledger-derived balance for a single account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub account_type: AccountType,
    pub as_of: Option<NaiveDate>,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub balance: Decimal,
}

impl AccountBalance {
    pub fn normal_balance(&self) -> DebitOrCredit {
        self.account_type.normal_balance()
    }
}

/// One row of the materialized account balance view.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountBalanceSnapshot {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub category: AccountCategory,
    pub parent_id: Option<AccountId>,
    pub is_header: bool,
    pub is_active: bool,
    pub current_balance: Decimal,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub transaction_count: i64,
    pub last_transaction_date: Option<NaiveDate>,
    pub normal_balance: DebitOrCredit,
    pub last_updated: DateTime<Utc>,
}
