//! The journal ledger: the single source of truth for every posting.
mod cursor;
mod entity;
pub mod error;
pub mod gate;
mod repo;
pub mod validation;

use chrono::{NaiveDate, Utc};
use sqlx::{Connection, PgConnection, PgPool};
use tracing::instrument;

use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    account::{AccountRepo, AccountValues},
    balance::Balances,
    db,
    primitives::*,
    query::*,
};

pub use cursor::*;
pub use entity::*;
use error::*;
use gate::{PostingCandidate, PostingGate};
use repo::*;

/// Service for posting and querying journal entries.
#[derive(Clone)]
pub struct Journals {
    repo: JournalRepo,
    accounts: AccountRepo,
    balances: Balances,
    gate: Arc<dyn PostingGate>,
    pool: PgPool,
    lock_timeout: Duration,
}

impl Journals {
    pub(crate) fn new(
        pool: &PgPool,
        balances: Balances,
        gate: Arc<dyn PostingGate>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            repo: JournalRepo::new(pool),
            accounts: AccountRepo::new(pool),
            balances,
            gate,
            pool: pool.clone(),
            lock_timeout,
        }
    }

    /// Validates and writes a POSTED entry, then synchronizes the balances of every
    /// touched account within the same transaction.
    #[instrument(
        name = "saldo_ledger.journals.post",
        skip(self, new_entry),
        fields(journal_entry_id = %new_entry.id, lines = new_entry.lines.len()),
        err
    )]
    pub async fn post(&self, new_entry: NewJournalEntry) -> Result<JournalEntry, JournalError> {
        let totals = validation::validate_shape(&new_entry.description, &new_entry.lines)?;
        self.approve(PostingCandidate {
            entry_id: new_entry.id,
            entry_date: new_entry.entry_date,
            description: &new_entry.description,
            reference: &new_entry.reference,
            total: totals.debit,
            line_count: new_entry.lines.len(),
        })?;

        let mut tx = self.pool.begin().await?;
        let account_ids = new_entry.account_ids();
        let accounts = self.lock_accounts(&mut tx, &account_ids).await?;
        validation::validate_accounts(&new_entry.lines, &accounts)?;

        let values = self
            .repo
            .insert_entry(
                &mut tx,
                EntryInsert {
                    id: new_entry.id,
                    entry_date: new_entry.entry_date,
                    description: &new_entry.description,
                    reference: &new_entry.reference,
                    status: JournalStatus::Posted,
                    totals,
                    reverses_entry_id: None,
                },
            )
            .await?;
        let lines = self
            .repo
            .insert_lines(&mut tx, values.id, &new_entry.lines)
            .await?;
        self.sync_balances(&mut tx, &account_ids).await?;
        tx.commit().await.map_err(JournalError::from_lock)?;

        tracing::info!(entry_number = %values.entry_number, total = %totals.debit, "journal entry posted");
        Ok(JournalEntry::new(values, lines))
    }

    /// Stores a DRAFT. Drafts do not affect balances until posted.
    #[instrument(
        name = "saldo_ledger.journals.create_draft",
        skip(self, new_entry),
        fields(journal_entry_id = %new_entry.id),
        err
    )]
    pub async fn create_draft(
        &self,
        new_entry: NewJournalEntry,
    ) -> Result<JournalEntry, JournalError> {
        let totals = validation::validate_shape(&new_entry.description, &new_entry.lines)?;

        let mut tx = self.pool.begin().await?;
        let accounts = self
            .accounts
            .find_all_in(&mut *tx, &new_entry.account_ids())
            .await?;
        validation::validate_accounts_exist(&new_entry.lines, &accounts)?;

        let values = self
            .repo
            .insert_entry(
                &mut tx,
                EntryInsert {
                    id: new_entry.id,
                    entry_date: new_entry.entry_date,
                    description: &new_entry.description,
                    reference: &new_entry.reference,
                    status: JournalStatus::Draft,
                    totals,
                    reverses_entry_id: None,
                },
            )
            .await?;
        let lines = self
            .repo
            .insert_lines(&mut tx, values.id, &new_entry.lines)
            .await?;
        tx.commit().await?;
        Ok(JournalEntry::new(values, lines))
    }

    /// Re-validates a DRAFT under row locks and transitions it to POSTED.
    #[instrument(name = "saldo_ledger.journals.post_draft", skip(self), err)]
    pub async fn post_draft(&self, id: JournalEntryId) -> Result<JournalEntry, JournalError> {
        let mut tx = self.pool.begin().await?;
        db::set_lock_timeout(&mut tx, self.lock_timeout).await?;
        let draft = self.repo.find_by_id_for_update(&mut tx, id).await?;
        if !draft.status.can_transition_to(JournalStatus::Posted) {
            return Err(JournalError::InvalidStatusTransition {
                id,
                from: draft.status,
                to: JournalStatus::Posted,
            });
        }

        let stored_lines = self.repo.find_lines_in(&mut *tx, id).await?;
        let lines: Vec<NewJournalLine> = stored_lines.iter().map(NewJournalLine::from).collect();
        let totals = validation::validate_shape(&draft.description, &lines)?;
        self.approve(PostingCandidate {
            entry_id: id,
            entry_date: draft.entry_date,
            description: &draft.description,
            reference: &draft.reference,
            total: totals.debit,
            line_count: lines.len(),
        })?;

        let account_ids = distinct_accounts(lines.iter().map(|l| l.account_id()));
        let accounts = self.lock_accounts(&mut tx, &account_ids).await?;
        validation::validate_accounts(&lines, &accounts)?;

        let values = self.repo.mark_posted(&mut tx, id, totals).await?;
        self.sync_balances(&mut tx, &account_ids).await?;
        tx.commit().await.map_err(JournalError::from_lock)?;

        tracing::info!(entry_number = %values.entry_number, "draft journal entry posted");
        Ok(JournalEntry::new(values, stored_lines))
    }

    #[instrument(name = "saldo_ledger.journals.discard_draft", skip(self), err)]
    pub async fn discard_draft(&self, id: JournalEntryId) -> Result<(), JournalError> {
        let mut tx = self.pool.begin().await?;
        let draft = self.repo.find_by_id_for_update(&mut tx, id).await?;
        if draft.status != JournalStatus::Draft {
            return Err(JournalError::NotDraft(id, draft.status));
        }
        self.repo.discard_draft(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Posts a counter-entry with every line's sides swapped and marks the original
    /// REVERSED. The original's lines stay untouched.
    #[instrument(name = "saldo_ledger.journals.reverse", skip(self, description), err)]
    pub async fn reverse(
        &self,
        id: JournalEntryId,
        description: impl Into<String>,
        entry_date: Option<NaiveDate>,
    ) -> Result<JournalEntry, JournalError> {
        let mut tx = self.pool.begin().await?;
        db::set_lock_timeout(&mut tx, self.lock_timeout).await?;
        let original = self.repo.find_by_id_for_update(&mut tx, id).await?;
        if !original.status.can_transition_to(JournalStatus::Reversed) {
            return Err(JournalError::InvalidStatusTransition {
                id,
                from: original.status,
                to: JournalStatus::Reversed,
            });
        }

        let mut description = description.into();
        if description.trim().is_empty() {
            description = format!("Reversal of {}", original.entry_number);
        }
        let lines: Vec<NewJournalLine> = self
            .repo
            .find_lines_in(&mut *tx, id)
            .await?
            .iter()
            .map(|l| NewJournalLine::from(l).reversed())
            .collect();
        let totals = validation::validate_shape(&description, &lines)?;
        let reversal_id = JournalEntryId::new();
        let reference = JournalReference::reversal_of(id);
        let entry_date = entry_date.unwrap_or_else(|| Utc::now().date_naive());
        self.approve(PostingCandidate {
            entry_id: reversal_id,
            entry_date,
            description: &description,
            reference: &reference,
            total: totals.debit,
            line_count: lines.len(),
        })?;

        let account_ids = distinct_accounts(lines.iter().map(|l| l.account_id()));
        let accounts = self.lock_accounts(&mut tx, &account_ids).await?;
        validation::validate_accounts_exist(&lines, &accounts)?;

        let values = self
            .repo
            .insert_entry(
                &mut tx,
                EntryInsert {
                    id: reversal_id,
                    entry_date,
                    description: &description,
                    reference: &reference,
                    status: JournalStatus::Posted,
                    totals,
                    reverses_entry_id: Some(id),
                },
            )
            .await?;
        let reversal_lines = self.repo.insert_lines(&mut tx, reversal_id, &lines).await?;
        self.repo.mark_reversed(&mut tx, id, reversal_id).await?;
        self.sync_balances(&mut tx, &account_ids).await?;
        tx.commit().await.map_err(JournalError::from_lock)?;

        tracing::info!(
            original = %original.entry_number,
            reversal = %values.entry_number,
            "journal entry reversed"
        );
        Ok(JournalEntry::new(values, reversal_lines))
    }

    #[instrument(name = "saldo_ledger.journals.find_by_id", skip(self), err)]
    pub async fn find_by_id(&self, id: JournalEntryId) -> Result<JournalEntry, JournalError> {
        let values = self.repo.find_by_id_in(&self.pool, id).await?;
        let lines = self.repo.find_lines(id).await?;
        Ok(JournalEntry::new(values, lines))
    }

    #[instrument(name = "saldo_ledger.journals.find_by_entry_number", skip(self), err)]
    pub async fn find_by_entry_number(
        &self,
        entry_number: &str,
    ) -> Result<JournalEntry, JournalError> {
        let values = self.repo.find_by_entry_number(entry_number).await?;
        let lines = self.repo.find_lines(values.id).await?;
        Ok(JournalEntry::new(values, lines))
    }

    #[instrument(name = "saldo_ledger.journals.list", skip(self), err)]
    pub async fn list(
        &self,
        filter: JournalFilter,
        query: PaginatedQueryArgs<JournalEntryByCreatedAtCursor>,
    ) -> Result<PaginatedQueryRet<JournalEntryValues, JournalEntryByCreatedAtCursor>, JournalError>
    {
        self.repo.list(&filter, query).await
    }

    /// Ledger-effective lines touching an account, oldest first.
    #[instrument(name = "saldo_ledger.journals.lines_for_account", skip(self), err)]
    pub async fn lines_for_account(
        &self,
        account_id: AccountId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<AccountLedgerLine>, JournalError> {
        self.repo.lines_for_account(account_id, from, to).await
    }

    fn approve(&self, candidate: PostingCandidate<'_>) -> Result<(), JournalError> {
        self.gate.approve(&candidate).map_err(|reason| {
            tracing::warn!(journal_entry_id = %candidate.entry_id, %reason, "posting rejected");
            JournalError::PostingRejected(reason)
        })
    }

    async fn lock_accounts(
        &self,
        conn: &mut PgConnection,
        account_ids: &[AccountId],
    ) -> Result<HashMap<AccountId, AccountValues>, JournalError> {
        db::set_lock_timeout(&mut *conn, self.lock_timeout).await?;
        self.accounts
            .lock_with_ancestors(conn, account_ids)
            .await
            .map_err(JournalError::from_lock)
    }

    /// A failed sync is rolled back to its savepoint and logged. The ledger write
    /// stands and the balances heal on the next sync of the same accounts.
    async fn sync_balances(
        &self,
        conn: &mut PgConnection,
        account_ids: &[AccountId],
    ) -> Result<(), JournalError> {
        let mut savepoint = conn.begin().await?;
        match self
            .balances
            .sync_accounts_in_tx(&mut savepoint, account_ids)
            .await
        {
            Ok(_) => savepoint.commit().await?,
            Err(e) => {
                savepoint.rollback().await?;
                tracing::warn!(error = %e, ?account_ids, "balance sync failed, balances left stale");
            }
        }
        Ok(())
    }
}
