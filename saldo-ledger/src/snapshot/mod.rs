//! The materialized account balance view used by reporting. It is a cache of the
//! journal ledger, refreshed wholesale and never written to directly.
pub mod error;
mod repo;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use std::time::{Duration, Instant};

pub use saldo_types::balance::AccountBalanceSnapshot;

use crate::{
    account::{AccountRepo, AccountValues},
    db,
    primitives::*,
};
use error::*;
use repo::*;

/// Where a snapshot row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotSource {
    MaterializedView,
    /// The view is missing or unpopulated, or nothing has been posted yet.
    CachedAccounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRefresh {
    pub accounts: i64,
    pub non_zero_balances: i64,
    pub concurrently: bool,
    pub duration_ms: i64,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilter {
    pub account_type: Option<AccountType>,
    pub include_inactive: bool,
    pub include_headers: bool,
    pub non_zero_only: bool,
}

impl SnapshotFilter {
    pub fn matches(&self, row: &AccountBalanceSnapshot) -> bool {
        self.account_type.is_none_or(|t| row.account_type == t)
            && (self.include_inactive || row.is_active)
            && (self.include_headers || !row.is_header)
            && (!self.non_zero_only || !row.current_balance.is_zero())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotListing {
    pub source: SnapshotSource,
    pub rows: Vec<AccountBalanceSnapshot>,
}

/// Service for the `saldo_account_balances` materialized view.
#[derive(Clone)]
pub struct AccountBalanceSnapshots {
    repo: SnapshotRepo,
    accounts: AccountRepo,
    pool: PgPool,
    max_staleness: Duration,
}

impl AccountBalanceSnapshots {
    pub(crate) fn new(pool: &PgPool, max_staleness: Duration) -> Self {
        Self {
            repo: SnapshotRepo::new(pool),
            accounts: AccountRepo::new(pool),
            pool: pool.clone(),
            max_staleness,
        }
    }

    /// Creates and populates the view when it is missing, otherwise refreshes it.
    /// Concurrent callers are serialized on an advisory lock.
    #[instrument(name = "saldo_ledger.snapshots.ensure", skip(self), err)]
    pub async fn ensure(&self) -> Result<ViewBootstrap, SnapshotError> {
        let mut tx = self.pool.begin().await?;
        db::advisory_xact_lock(&mut tx, VIEW_NAME).await?;
        let bootstrap = match self.repo.view_state(&mut *tx).await? {
            ViewState::Missing => {
                self.repo.create_view(&mut tx).await?;
                ViewBootstrap::Created
            }
            ViewState::Unpopulated | ViewState::Populated => {
                self.repo.refresh_in(&mut *tx, false).await?;
                ViewBootstrap::Refreshed
            }
        };
        tx.commit().await?;
        tracing::info!(?bootstrap, "account balance view ready");
        Ok(bootstrap)
    }

    /// Full recompute of the view. Runs CONCURRENTLY once the view has been
    /// populated so readers are never blocked.
    #[instrument(name = "saldo_ledger.snapshots.refresh", skip(self), err)]
    pub async fn refresh(&self) -> Result<SnapshotRefresh, SnapshotError> {
        let start = Instant::now();
        let concurrently = match self.repo.view_state(&self.pool).await? {
            ViewState::Missing => {
                self.ensure().await?;
                false
            }
            ViewState::Unpopulated => {
                self.repo.refresh_in(&self.pool, false).await?;
                false
            }
            ViewState::Populated => {
                self.repo.refresh_in(&self.pool, true).await?;
                true
            }
        };
        let stats = self.repo.stats().await?;
        let refresh = SnapshotRefresh {
            accounts: stats.accounts,
            non_zero_balances: stats.non_zero_balances,
            concurrently,
            duration_ms: start.elapsed().as_millis() as i64,
            refreshed_at: stats.refreshed_at.unwrap_or_else(Utc::now),
        };
        tracing::info!(
            accounts = refresh.accounts,
            non_zero_balances = refresh.non_zero_balances,
            duration_ms = refresh.duration_ms,
            concurrently,
            "account balance view refreshed"
        );
        Ok(refresh)
    }

    /// Time of the last refresh, `None` while the view is unavailable or empty.
    #[instrument(name = "saldo_ledger.snapshots.last_refreshed_at", skip(self), err)]
    pub async fn last_refreshed_at(&self) -> Result<Option<DateTime<Utc>>, SnapshotError> {
        if self.repo.view_state(&self.pool).await? != ViewState::Populated {
            return Ok(None);
        }
        Ok(self.repo.stats().await?.refreshed_at)
    }

    #[instrument(name = "saldo_ledger.snapshots.find", skip(self), err)]
    pub async fn find(
        &self,
        account_id: AccountId,
    ) -> Result<(AccountBalanceSnapshot, SnapshotSource), SnapshotError> {
        if self.view_usable().await? {
            match self.repo.find(account_id).await {
                Ok(Some(row)) => return Ok((row, SnapshotSource::MaterializedView)),
                // created after the last refresh
                Ok(None) => (),
                Err(e) if is_view_unavailable(&e) => (),
                Err(e) => return Err(e.into()),
            }
        }
        let row = self
            .accounts
            .find_all_in(&self.pool, std::slice::from_ref(&account_id))
            .await?
            .remove(&account_id)
            .filter(|a| !a.is_deleted())
            .ok_or(SnapshotError::AccountNotFound(account_id))?;
        Ok((from_cached(&row, Utc::now()), SnapshotSource::CachedAccounts))
    }

    #[instrument(name = "saldo_ledger.snapshots.list", skip(self), err)]
    pub async fn list(&self, filter: SnapshotFilter) -> Result<SnapshotListing, SnapshotError> {
        let (rows, source) = if self.view_usable().await? {
            match self.repo.list_all().await {
                Ok(rows) => (rows, SnapshotSource::MaterializedView),
                Err(e) if is_view_unavailable(&e) => {
                    (self.cached_rows().await?, SnapshotSource::CachedAccounts)
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            (self.cached_rows().await?, SnapshotSource::CachedAccounts)
        };
        Ok(SnapshotListing {
            source,
            rows: rows.into_iter().filter(|r| filter.matches(r)).collect(),
        })
    }

    /// Like [`Self::find`], refreshing first when the view is older than
    /// `max_staleness` (the configured default when `None`).
    #[instrument(name = "saldo_ledger.snapshots.find_fresh", skip(self), err)]
    pub async fn find_fresh(
        &self,
        account_id: AccountId,
        max_staleness: Option<Duration>,
    ) -> Result<(AccountBalanceSnapshot, SnapshotSource), SnapshotError> {
        let max_staleness = max_staleness.unwrap_or(self.max_staleness);
        let last = self.last_refreshed_at().await?;
        if is_stale(last, max_staleness, Utc::now()) {
            tracing::debug!(?last, ?max_staleness, "account balance view stale");
            self.refresh().await?;
        }
        self.find(account_id).await
    }

    async fn view_usable(&self) -> Result<bool, SnapshotError> {
        Ok(self.repo.view_state(&self.pool).await? == ViewState::Populated
            && self.repo.has_ledger_activity().await?)
    }

    async fn cached_rows(&self) -> Result<Vec<AccountBalanceSnapshot>, SnapshotError> {
        let now = Utc::now();
        Ok(self
            .accounts
            .load_all_in(&self.pool)
            .await?
            .iter()
            .filter(|a| !a.is_deleted())
            .map(|a| from_cached(a, now))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewBootstrap {
    Created,
    Refreshed,
}

fn is_view_unavailable(err: &sqlx::Error) -> bool {
    db::has_code(err, db::UNDEFINED_TABLE) || db::has_code(err, db::OBJECT_NOT_IN_PREREQUISITE_STATE)
}

fn is_stale(last: Option<DateTime<Utc>>, max_staleness: Duration, now: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(last) => chrono::Duration::from_std(max_staleness)
            .map(|tolerance| now - last > tolerance)
            .unwrap_or(false),
    }
}

/// Snapshot row built from an account's cached balance. Line statistics are
/// unknown on this path and reported as zero.
fn from_cached(account: &AccountValues, now: DateTime<Utc>) -> AccountBalanceSnapshot {
    AccountBalanceSnapshot {
        account_id: account.id,
        account_code: account.code.clone(),
        account_name: account.name.clone(),
        account_type: account.account_type,
        category: account.category,
        parent_id: account.parent_id,
        is_header: account.is_header,
        is_active: account.is_active,
        current_balance: account.balance,
        total_debits: Default::default(),
        total_credits: Default::default(),
        transaction_count: 0,
        last_transaction_date: None,
        normal_balance: account.account_type.normal_balance(),
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn account(account_type: AccountType, is_header: bool, is_active: bool) -> AccountValues {
        AccountValues {
            id: AccountId::new(),
            code: "1100".to_string(),
            name: "Accounts Receivable".to_string(),
            description: None,
            account_type,
            category: AccountCategory::default_for(account_type),
            parent_id: None,
            is_header,
            is_active,
            balance: dec!(0),
            deleted_at: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn default_filter_hides_headers_and_inactive() {
        let now = Utc::now();
        let filter = SnapshotFilter::default();
        assert!(filter.matches(&from_cached(&account(AccountType::Asset, false, true), now)));
        assert!(!filter.matches(&from_cached(&account(AccountType::Asset, true, true), now)));
        assert!(!filter.matches(&from_cached(&account(AccountType::Asset, false, false), now)));
    }

    #[test]
    fn filter_by_type_and_non_zero() {
        let now = Utc::now();
        let mut receivable = account(AccountType::Asset, false, true);
        receivable.balance = dec!(100000);
        let revenue = account(AccountType::Revenue, false, true);

        let filter = SnapshotFilter {
            account_type: Some(AccountType::Asset),
            non_zero_only: true,
            ..Default::default()
        };
        assert!(filter.matches(&from_cached(&receivable, now)));
        assert!(!filter.matches(&from_cached(&revenue, now)));

        receivable.balance = dec!(0);
        assert!(!filter.matches(&from_cached(&receivable, now)));
    }

    #[test]
    fn cached_row_carries_normal_balance() {
        let row = from_cached(&account(AccountType::Liability, false, true), Utc::now());
        assert_eq!(row.normal_balance, DebitOrCredit::Credit);
        assert_eq!(row.transaction_count, 0);
    }

    #[test]
    fn staleness() {
        let now = Utc::now();
        let tolerance = Duration::from_secs(60);
        assert!(is_stale(None, tolerance, now));
        assert!(!is_stale(Some(now - chrono::Duration::seconds(30)), tolerance, now));
        assert!(is_stale(Some(now - chrono::Duration::seconds(90)), tolerance, now));
    }
}
