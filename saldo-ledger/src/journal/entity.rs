use chrono::{NaiveDate, Utc};
use derive_builder::Builder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use saldo_types::{
    journal::*,
    primitives::{JournalEntryId, JournalLineId},
};

use crate::primitives::*;

/// A journal entry header together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    values: JournalEntryValues,
    lines: Vec<JournalLineValues>,
}

impl JournalEntry {
    pub(super) fn new(values: JournalEntryValues, mut lines: Vec<JournalLineValues>) -> Self {
        lines.sort_by_key(|l| l.line_number);
        Self { values, lines }
    }

    pub fn id(&self) -> JournalEntryId {
        self.values.id
    }

    pub fn entry_number(&self) -> &str {
        &self.values.entry_number
    }

    pub fn status(&self) -> JournalStatus {
        self.values.status
    }

    pub fn values(&self) -> &JournalEntryValues {
        &self.values
    }

    pub fn lines(&self) -> &[JournalLineValues] {
        &self.lines
    }

    pub fn into_parts(self) -> (JournalEntryValues, Vec<JournalLineValues>) {
        (self.values, self.lines)
    }

    /// Distinct accounts referenced by the lines, sorted.
    pub fn account_ids(&self) -> Vec<AccountId> {
        distinct_accounts(self.lines.iter().map(|l| l.account_id))
    }
}

/// One line of a journal entry about to be written.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct NewJournalLine {
    #[builder(setter(into))]
    pub(super) account_id: AccountId,
    #[builder(default)]
    pub(super) debit: Decimal,
    #[builder(default)]
    pub(super) credit: Decimal,
    #[builder(setter(strip_option, into), default)]
    pub(super) description: Option<String>,
}

impl NewJournalLine {
    pub fn builder() -> NewJournalLineBuilder {
        NewJournalLineBuilder::default()
    }

    pub fn debit(account_id: impl Into<AccountId>, amount: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
        }
    }

    pub fn credit(account_id: impl Into<AccountId>, amount: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            debit: Decimal::ZERO,
            credit: amount,
            description: None,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// The same line with debit and credit swapped.
    pub(super) fn reversed(&self) -> Self {
        Self {
            account_id: self.account_id,
            debit: self.credit,
            credit: self.debit,
            description: self.description.clone(),
        }
    }
}

impl From<&JournalLineValues> for NewJournalLine {
    fn from(line: &JournalLineValues) -> Self {
        Self {
            account_id: line.account_id,
            debit: line.debit_amount,
            credit: line.credit_amount,
            description: line.description.clone(),
        }
    }
}

/// Representation of a ***new*** journal entry with required/optional properties and a builder.
#[derive(Builder, Debug, Clone)]
pub struct NewJournalEntry {
    #[builder(setter(into), default = "JournalEntryId::new()")]
    pub id: JournalEntryId,
    #[builder(default = "Utc::now().date_naive()")]
    pub(super) entry_date: NaiveDate,
    #[builder(setter(into))]
    pub(super) description: String,
    #[builder(default)]
    pub(super) reference: JournalReference,
    #[builder(default)]
    pub(super) lines: Vec<NewJournalLine>,
}

impl NewJournalEntry {
    pub fn builder() -> NewJournalEntryBuilder {
        NewJournalEntryBuilder::default()
    }

    pub fn lines(&self) -> &[NewJournalLine] {
        &self.lines
    }

    pub fn account_ids(&self) -> Vec<AccountId> {
        distinct_accounts(self.lines.iter().map(|l| l.account_id))
    }
}

impl NewJournalEntryBuilder {
    pub fn add_line(&mut self, line: NewJournalLine) -> &mut Self {
        self.lines.get_or_insert_with(Vec::new).push(line);
        self
    }
}

/// A journal line as seen from one account, with its entry's header fields.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountLedgerLine {
    pub line_id: JournalLineId,
    pub journal_entry_id: JournalEntryId,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub status: JournalStatus,
    pub line_number: i32,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    pub description: Option<String>,
}

pub(super) fn distinct_accounts(ids: impl Iterator<Item = AccountId>) -> Vec<AccountId> {
    let mut ids: Vec<_> = ids.collect();
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn it_builds() {
        let receivable = AccountId::new();
        let revenue = AccountId::new();
        let new_entry = NewJournalEntry::builder()
            .description("Invoice INV-001")
            .add_line(NewJournalLine::debit(receivable, dec!(100000)))
            .add_line(NewJournalLine::credit(revenue, dec!(100000)))
            .build()
            .unwrap();
        assert_eq!(new_entry.lines().len(), 2);
        assert_eq!(new_entry.reference, JournalReference::manual());
        assert_eq!(new_entry.account_ids().len(), 2);
    }

    #[test]
    fn fails_when_description_is_missing() {
        assert!(NewJournalEntry::builder().build().is_err());
    }

    #[test]
    fn reversed_line_swaps_sides() {
        let line = NewJournalLine::debit(AccountId::new(), dec!(12.34));
        let reversed = line.reversed();
        assert_eq!(reversed.debit, Decimal::ZERO);
        assert_eq!(reversed.credit, dec!(12.34));
        assert_eq!(reversed.reversed(), line);
    }

    #[test]
    fn account_ids_are_distinct() {
        let cash = AccountId::new();
        let new_entry = NewJournalEntry::builder()
            .description("split")
            .add_line(NewJournalLine::debit(cash, dec!(1)))
            .add_line(NewJournalLine::debit(cash, dec!(1)))
            .add_line(NewJournalLine::credit(AccountId::new(), dec!(2)))
            .build()
            .unwrap();
        assert_eq!(new_entry.account_ids().len(), 2);
    }
}
