//! Balance synchronization: recompute cached balances from posted journal lines
//! and propagate them up the header chain.
pub mod derive;
pub mod error;
mod repo;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use std::{collections::HashMap, time::Duration};

pub use saldo_types::balance::*;

use crate::{
    account::{tree::ChartTree, AccountRepo},
    db,
    primitives::AccountId,
};
use derive::LedgerTotals;
use error::*;
use repo::*;

/// Outcome of a synchronization pass inside a posting or recompute transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub leaves_updated: u64,
    pub headers_updated: u64,
    pub header_levels: usize,
}

/// Service for deriving and synchronizing account balances.
#[derive(Clone)]
pub struct Balances {
    repo: BalanceRepo,
    accounts: AccountRepo,
    pool: PgPool,
    lock_timeout: Duration,
}

impl Balances {
    pub(crate) fn new(pool: &PgPool, lock_timeout: Duration) -> Self {
        Self {
            repo: BalanceRepo::new(pool),
            accounts: AccountRepo::new(pool),
            pool: pool.clone(),
            lock_timeout,
        }
    }

    /// Balance derived from the journal ledger. Headers are aggregated over the
    /// subtree below them. With `as_of` only entries dated on or before it count.
    #[instrument(name = "saldo_ledger.balances.account_balance", skip(self), err)]
    pub async fn account_balance(
        &self,
        account_id: AccountId,
        as_of: Option<NaiveDate>,
    ) -> Result<AccountBalance, BalanceError> {
        let subtree = self
            .accounts
            .find_subtree_in(&self.pool, account_id)
            .await?;
        let account = subtree
            .iter()
            .find(|a| a.id == account_id)
            .ok_or(BalanceError::AccountNotFound(account_id))?;

        let (balance, totals) = if account.is_header {
            let ids: Vec<AccountId> = subtree.iter().map(|a| a.id).collect();
            let totals = self
                .repo
                .ledger_totals(&self.pool, Some(&ids), as_of)
                .await?;
            let tree = ChartTree::from_accounts(&subtree)?;
            let balances = tree.aggregate_balances(&derive::leaf_balances(&subtree, &totals));
            let rolled = derive::aggregated_totals(&tree, &totals);
            (
                balances.get(&account_id).copied().unwrap_or_default(),
                rolled.get(&account_id).copied().unwrap_or_default(),
            )
        } else {
            let totals = self
                .repo
                .ledger_totals(&self.pool, Some(std::slice::from_ref(&account_id)), as_of)
                .await?
                .remove(&account_id)
                .unwrap_or_default();
            (totals.signed_for(account.account_type), totals)
        };

        Ok(AccountBalance {
            account_id,
            account_type: account.account_type,
            as_of,
            total_debits: totals.total_debits,
            total_credits: totals.total_credits,
            balance,
        })
    }

    /// The cached balance column. May lag the ledger until the next sync.
    #[instrument(name = "saldo_ledger.balances.cached_balance", skip(self), err)]
    pub async fn cached_balance(&self, account_id: AccountId) -> Result<Decimal, BalanceError> {
        self.repo
            .cached_balance(account_id)
            .await?
            .ok_or(BalanceError::AccountNotFound(account_id))
    }

    /// Recomputes one account from the ledger and propagates up its parent chain.
    #[instrument(name = "saldo_ledger.balances.recompute_account", skip(self), err)]
    pub async fn recompute_account(&self, account_id: AccountId) -> Result<Decimal, BalanceError> {
        let mut tx = self.pool.begin().await?;
        db::set_lock_timeout(&mut tx, self.lock_timeout).await?;
        let locked = self
            .accounts
            .lock_with_ancestors(&mut tx, &[account_id])
            .await
            .map_err(BalanceError::from_lock)?;
        if !locked.contains_key(&account_id) {
            return Err(BalanceError::AccountNotFound(account_id));
        }
        self.sync_accounts_in_tx(&mut tx, &[account_id]).await?;
        let balance: Decimal = sqlx::query_scalar("SELECT balance FROM saldo_accounts WHERE id = $1")
            .bind(account_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await.map_err(BalanceError::from_lock)?;
        Ok(balance)
    }

    /// Recomputes the given accounts and every header above them, deepest level
    /// first. The caller must hold row locks on the accounts and their ancestors.
    /// Idempotent: the result depends on ledger state only.
    pub(crate) async fn sync_accounts_in_tx(
        &self,
        conn: &mut PgConnection,
        account_ids: &[AccountId],
    ) -> Result<SyncSummary, BalanceError> {
        let chain = self
            .accounts
            .find_with_ancestors_in(&mut *conn, account_ids)
            .await?;
        let tree = ChartTree::from_accounts(&chain)?;

        let leaves: Vec<_> = chain
            .iter()
            .filter(|a| account_ids.contains(&a.id) && !a.is_header && !a.is_deleted())
            .collect();
        let leaf_ids: Vec<AccountId> = leaves.iter().map(|a| a.id).collect();
        let totals = self
            .repo
            .ledger_totals(&mut *conn, Some(&leaf_ids), None)
            .await?;
        let balances: Vec<(AccountId, Decimal)> = leaves
            .iter()
            .map(|a| {
                let balance = totals
                    .get(&a.id)
                    .map(|t| t.signed_for(a.account_type))
                    .unwrap_or_default();
                (a.id, balance)
            })
            .collect();
        let leaves_updated = self.repo.write_balances(&mut *conn, &balances).await?;

        let levels = tree.header_levels(chain.iter().map(|a| a.id));
        let mut headers_updated = 0;
        for level in levels.iter() {
            headers_updated += self.repo.recompute_headers(&mut *conn, level).await?;
        }

        tracing::debug!(
            leaves_updated,
            headers_updated,
            header_levels = levels.len(),
            "balances synchronized"
        );
        Ok(SyncSummary {
            leaves_updated,
            headers_updated,
            header_levels: levels.len(),
        })
    }

    /// Line totals per account over ledger-effective journals.
    pub(crate) async fn ledger_totals_in(
        &self,
        conn: &mut PgConnection,
        as_of: Option<NaiveDate>,
    ) -> Result<HashMap<AccountId, LedgerTotals>, BalanceError> {
        Ok(self.repo.ledger_totals(conn, None, as_of).await?)
    }

    pub(crate) async fn ledger_totals(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<HashMap<AccountId, LedgerTotals>, BalanceError> {
        Ok(self.repo.ledger_totals(&self.pool, None, as_of).await?)
    }

    pub(crate) async fn write_leaf_balances_in(
        &self,
        conn: &mut PgConnection,
        balances: &[(AccountId, Decimal)],
    ) -> Result<u64, BalanceError> {
        Ok(self.repo.write_balances(conn, balances).await?)
    }

    /// Recomputes every header level by level, deepest first.
    pub(crate) async fn recompute_all_headers_in(
        &self,
        conn: &mut PgConnection,
        tree: &ChartTree,
    ) -> Result<u64, BalanceError> {
        let mut updated = 0;
        for level in tree.all_header_levels() {
            updated += self.repo.recompute_headers(&mut *conn, &level).await?;
        }
        Ok(updated)
    }

    pub(crate) async fn zero_all_in(&self, conn: &mut PgConnection) -> Result<u64, BalanceError> {
        Ok(self.repo.zero_all(conn).await?)
    }
}
