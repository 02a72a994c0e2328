use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

crate::entity_id! { AccountId }
crate::entity_id! { JournalEntryId }
crate::entity_id! { JournalLineId }

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "DebitOrCredit", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebitOrCredit {
    Debit,
    Credit,
}

/// Top level classification of an account. Determines the normal balance side
/// and therefore the sign convention used when deriving balances.
#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[sqlx(type_name = "AccountType", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub fn normal_balance(&self) -> DebitOrCredit {
        match self {
            AccountType::Asset | AccountType::Expense => DebitOrCredit::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                DebitOrCredit::Credit
            }
        }
    }

    /// Signed balance of the given debit and credit totals for this account type.
    pub fn signed_balance(&self, total_debit: Decimal, total_credit: Decimal) -> Decimal {
        match self.normal_balance() {
            DebitOrCredit::Debit => total_debit - total_credit,
            DebitOrCredit::Credit => total_credit - total_debit,
        }
    }

    pub fn is_balance_sheet(&self) -> bool {
        matches!(
            self,
            AccountType::Asset | AccountType::Liability | AccountType::Equity
        )
    }
}

#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
)]
#[sqlx(type_name = "AccountCategory", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AccountCategory {
    CurrentAsset,
    FixedAsset,
    CurrentLiability,
    LongTermLiability,
    Equity,
    OperatingRevenue,
    OtherRevenue,
    OperatingExpense,
    OtherExpense,
}

impl AccountCategory {
    pub fn default_for(account_type: AccountType) -> Self {
        match account_type {
            AccountType::Asset => AccountCategory::CurrentAsset,
            AccountType::Liability => AccountCategory::CurrentLiability,
            AccountType::Equity => AccountCategory::Equity,
            AccountType::Revenue => AccountCategory::OperatingRevenue,
            AccountType::Expense => AccountCategory::OperatingExpense,
        }
    }

    pub fn belongs_to(&self, account_type: AccountType) -> bool {
        use AccountCategory::*;
        matches!(
            (self, account_type),
            (CurrentAsset | FixedAsset, AccountType::Asset)
                | (CurrentLiability | LongTermLiability, AccountType::Liability)
                | (Equity, AccountType::Equity)
                | (OperatingRevenue | OtherRevenue, AccountType::Revenue)
                | (OperatingExpense | OtherExpense, AccountType::Expense)
        )
    }
}

#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[sqlx(type_name = "JournalStatus", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum JournalStatus {
    Draft,
    Posted,
    Reversed,
}

impl JournalStatus {
    pub fn can_transition_to(&self, next: JournalStatus) -> bool {
        matches!(
            (self, next),
            (JournalStatus::Draft, JournalStatus::Posted)
                | (JournalStatus::Posted, JournalStatus::Reversed)
        )
    }

    /// Lines of journals in this status contribute to account balances.
    /// A reversed journal keeps its effect; its counter-entry cancels it.
    pub fn affects_balances(&self) -> bool {
        matches!(self, JournalStatus::Posted | JournalStatus::Reversed)
    }

    pub fn balance_affecting() -> Vec<JournalStatus> {
        JournalStatus::iter()
            .filter(JournalStatus::affects_balances)
            .collect()
    }
}

#[derive(
    Debug,
    Default,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
)]
#[sqlx(type_name = "JournalSourceType", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum SourceType {
    #[default]
    Manual,
    Sale,
    Purchase,
    Payment,
    CashBank,
    Adjustment,
    Opening,
    Reversal,
}
