//! Drift detection and repair between cached balances and the journal ledger.
mod drift;
pub mod error;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::{
    account::{tree::ChartTree, AccountRepo, AccountValues},
    balance::{derive, derive::LedgerTotals, Balances},
    db,
    primitives::*,
};
pub use drift::*;
use error::*;

/// An account whose cached balance differs from the value derived from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDiscrepancy {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_type: AccountType,
    pub is_header: bool,
    pub cached_balance: Decimal,
    pub expected_balance: Decimal,
    /// `cached_balance - expected_balance`
    pub difference: Decimal,
    /// Most recent posting touching the account (or, for headers, its subtree).
    pub last_posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub discrepancies_found: usize,
    pub leaves_fixed: u64,
    pub headers_recomputed: u64,
    pub max_depth: usize,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSyncReport {
    pub accounts_zeroed: u64,
    pub leaves_updated: u64,
    pub headers_updated: u64,
    pub max_depth: usize,
    pub duration_ms: i64,
}

/// Service for reconciling cached balances against the journal ledger.
#[derive(Clone)]
pub struct Reconciliation {
    accounts: AccountRepo,
    balances: Balances,
    pool: PgPool,
    lock_timeout: Duration,
}

impl Reconciliation {
    pub(crate) fn new(pool: &PgPool, balances: Balances, lock_timeout: Duration) -> Self {
        Self {
            accounts: AccountRepo::new(pool),
            balances,
            pool: pool.clone(),
            lock_timeout,
        }
    }

    /// Exact comparison of every live account against its derived balance.
    #[instrument(name = "saldo_ledger.reconciliation.detect_discrepancies", skip(self), err)]
    pub async fn detect_discrepancies(
        &self,
    ) -> Result<Vec<AccountDiscrepancy>, ReconciliationError> {
        let accounts = self.accounts.load_all_in(&self.pool).await?;
        let totals = self.balances.ledger_totals(None).await?;
        let discrepancies = find_discrepancies(&accounts, &totals)?;
        for d in discrepancies.iter() {
            tracing::warn!(
                account_id = %d.account_id,
                account_code = %d.account_code,
                cached = %d.cached_balance,
                expected = %d.expected_balance,
                difference = %d.difference,
                "DriftDetected"
            );
        }
        tracing::info!(
            accounts = accounts.len(),
            discrepancies = discrepancies.len(),
            "reconciliation check complete"
        );
        Ok(discrepancies)
    }

    /// Overwrites drifting leaves with their derived values, then recomputes every
    /// header bottom-up. A second run reports nothing to fix.
    #[instrument(name = "saldo_ledger.reconciliation.fix_discrepancies", skip(self), err)]
    pub async fn fix_discrepancies(&self) -> Result<RepairReport, ReconciliationError> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;
        let accounts = self.lock_all(&mut tx).await?;
        let totals = self.balances.ledger_totals_in(&mut tx, None).await?;
        let discrepancies = find_discrepancies(&accounts, &totals)?;

        let leaf_fixes: Vec<(AccountId, Decimal)> = discrepancies
            .iter()
            .filter(|d| !d.is_header)
            .map(|d| (d.account_id, d.expected_balance))
            .collect();
        let leaves_fixed = self
            .balances
            .write_leaf_balances_in(&mut tx, &leaf_fixes)
            .await?;
        let tree = ChartTree::from_accounts(&accounts)?;
        let headers_recomputed = self
            .balances
            .recompute_all_headers_in(&mut tx, &tree)
            .await?;
        tx.commit().await.map_err(ReconciliationError::from_lock)?;

        let report = RepairReport {
            discrepancies_found: discrepancies.len(),
            leaves_fixed,
            headers_recomputed,
            max_depth: tree.max_depth(),
            duration_ms: start.elapsed().as_millis() as i64,
        };
        tracing::info!(?report, "discrepancies fixed");
        Ok(report)
    }

    /// Rebuilds every cached balance from scratch.
    #[instrument(name = "saldo_ledger.reconciliation.run_initial_sync", skip(self), err)]
    pub async fn run_initial_sync(&self) -> Result<InitialSyncReport, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let report = self.initial_sync_in_tx(&mut tx).await?;
        tx.commit().await.map_err(ReconciliationError::from_lock)?;
        Ok(report)
    }

    /// Zeroes all cached balances, recomputes every leaf from the ledger in one
    /// grouped pass and propagates the headers. Idempotent.
    pub(crate) async fn initial_sync_in_tx(
        &self,
        conn: &mut PgConnection,
    ) -> Result<InitialSyncReport, ReconciliationError> {
        let start = Instant::now();
        let accounts = self.lock_all(&mut *conn).await?;
        let accounts_zeroed = self.balances.zero_all_in(&mut *conn).await?;
        let totals = self.balances.ledger_totals_in(&mut *conn, None).await?;
        let mut leaves: Vec<(AccountId, Decimal)> = derive::leaf_balances(&accounts, &totals)
            .into_iter()
            .filter(|(_, balance)| !balance.is_zero())
            .collect();
        leaves.sort();
        let leaves_updated = self
            .balances
            .write_leaf_balances_in(&mut *conn, &leaves)
            .await?;
        let tree = ChartTree::from_accounts(&accounts)?;
        let headers_updated = self
            .balances
            .recompute_all_headers_in(&mut *conn, &tree)
            .await?;

        let report = InitialSyncReport {
            accounts_zeroed,
            leaves_updated,
            headers_updated,
            max_depth: tree.max_depth(),
            duration_ms: start.elapsed().as_millis() as i64,
        };
        tracing::info!(?report, "initial balance sync complete");
        Ok(report)
    }

    async fn lock_all(
        &self,
        conn: &mut PgConnection,
    ) -> Result<Vec<AccountValues>, ReconciliationError> {
        db::set_lock_timeout(&mut *conn, self.lock_timeout).await?;
        self.accounts
            .lock_all(conn)
            .await
            .map_err(ReconciliationError::from_lock)
    }
}

/// Compares cached against derived balances for every live account, ordered by code.
pub fn find_discrepancies(
    accounts: &[AccountValues],
    totals: &HashMap<AccountId, LedgerTotals>,
) -> Result<Vec<AccountDiscrepancy>, crate::account::tree::ChartCycle> {
    let tree = ChartTree::from_accounts(accounts)?;
    let expected = tree.aggregate_balances(&derive::leaf_balances(accounts, totals));
    let activity = derive::aggregated_totals(&tree, totals);

    let mut ret: Vec<_> = accounts
        .iter()
        .filter(|a| !a.is_deleted())
        .filter_map(|a| {
            let expected_balance = expected.get(&a.id).copied().unwrap_or_default();
            if expected_balance == a.balance {
                return None;
            }
            Some(AccountDiscrepancy {
                account_id: a.id,
                account_code: a.code.clone(),
                account_type: a.account_type,
                is_header: a.is_header,
                cached_balance: a.balance,
                expected_balance,
                difference: a.balance - expected_balance,
                last_posted_at: activity.get(&a.id).and_then(|t| t.last_posted_at),
            })
        })
        .collect();
    ret.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    Ok(ret)
}
