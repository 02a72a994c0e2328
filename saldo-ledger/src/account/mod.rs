//! [Account] is a node of the chart of accounts holding a cached balance.
mod cursor;
mod entity;
pub mod error;
mod repo;
pub mod tree;

use sqlx::PgPool;
use tracing::instrument;

use std::{collections::HashMap, time::Duration};

use crate::{balance::Balances, db, primitives::*, query::*};

pub use cursor::*;
pub use entity::*;
use error::*;
pub(crate) use repo::AccountRepo;
use tree::ChartTree;

/// Service for working with `Account` entities.
#[derive(Clone)]
pub struct Accounts {
    repo: AccountRepo,
    balances: Balances,
    pool: PgPool,
    lock_timeout: Duration,
}

impl Accounts {
    pub(crate) fn new(pool: &PgPool, balances: Balances, lock_timeout: Duration) -> Self {
        Self {
            repo: AccountRepo::new(pool),
            balances,
            pool: pool.clone(),
            lock_timeout,
        }
    }

    #[instrument(name = "saldo_ledger.accounts.create", skip(self), err)]
    pub async fn create(&self, new_account: NewAccount) -> Result<Account, AccountError> {
        let mut tx = self.pool.begin().await?;
        if let Some(parent_id) = new_account.parent_id {
            let parent = self
                .repo
                .find_by_id_in(&mut *tx, parent_id)
                .await
                .map_err(|e| match e {
                    AccountError::NotFound(id) => AccountError::ParentNotFound(id),
                    e => e,
                })?;
            let parent = parent.values();
            if parent.is_deleted() {
                return Err(AccountError::ParentNotFound(parent_id));
            }
            check_parent_type(parent, new_account.account_type)?;
        }
        let account = self.repo.create_in_tx(&mut tx, new_account).await?;
        tx.commit().await?;
        Ok(account)
    }

    #[instrument(name = "saldo_ledger.accounts.find", skip(self), err)]
    pub async fn find(&self, account_id: AccountId) -> Result<Account, AccountError> {
        self.repo.find_by_id(account_id).await
    }

    #[instrument(name = "saldo_ledger.accounts.find_by_code", skip(self), err)]
    pub async fn find_by_code(&self, code: &str) -> Result<Account, AccountError> {
        self.repo.find_by_code(code).await
    }

    #[instrument(name = "saldo_ledger.accounts.find_all", skip(self), err)]
    pub async fn find_all<T: From<Account>>(
        &self,
        account_ids: &[AccountId],
    ) -> Result<HashMap<AccountId, T>, AccountError> {
        Ok(self
            .repo
            .find_all_in(&self.pool, account_ids)
            .await?
            .into_iter()
            .map(|(id, values)| (id, T::from(Account::new(values))))
            .collect())
    }

    #[instrument(name = "saldo_ledger.accounts.list", skip(self), err)]
    pub async fn list(
        &self,
        query: PaginatedQueryArgs<AccountByCodeCursor>,
    ) -> Result<PaginatedQueryRet<Account, AccountByCodeCursor>, AccountError> {
        self.repo.list(query).await
    }

    #[instrument(name = "saldo_ledger.accounts.list_children", skip(self), err)]
    pub async fn list_children(&self, parent_id: AccountId) -> Result<Vec<Account>, AccountError> {
        self.repo.list_children(parent_id).await
    }

    /// Snapshot of the whole chart, including soft-deleted accounts.
    #[instrument(name = "saldo_ledger.accounts.chart_tree", skip(self), err)]
    pub async fn chart_tree(&self) -> Result<ChartTree, AccountError> {
        let accounts = self.repo.load_all_in(&self.pool).await?;
        Ok(ChartTree::from_accounts(&accounts)?)
    }

    #[instrument(name = "saldo_ledger.accounts.update", skip(self, builder), err)]
    pub async fn update(
        &self,
        account_id: AccountId,
        builder: impl Into<AccountUpdate>,
    ) -> Result<Account, AccountError> {
        let mut tx = self.pool.begin().await?;
        let mut account = self.repo.find_by_id_in(&mut *tx, account_id).await?;
        let updated_fields = account.update(builder)?;
        if !updated_fields.is_empty() {
            self.repo.update_in_tx(&mut tx, &account).await?;
            tracing::info!(%account_id, ?updated_fields, "account updated");
        }
        tx.commit().await?;
        Ok(account)
    }

    /// Moves an account under a new parent (or to the root) and re-propagates the
    /// header balances of both the old and the new parent chain.
    #[instrument(name = "saldo_ledger.accounts.set_parent", skip(self), err)]
    pub async fn set_parent(
        &self,
        account_id: AccountId,
        parent_id: Option<AccountId>,
    ) -> Result<Account, AccountError> {
        let mut tx = self.pool.begin().await?;
        db::set_lock_timeout(&mut tx, self.lock_timeout).await?;

        let mut to_lock = vec![account_id];
        to_lock.extend(parent_id);
        let locked = self
            .repo
            .lock_with_ancestors(&mut tx, &to_lock)
            .await
            .map_err(map_lock_err)?;
        let account = locked
            .get(&account_id)
            .filter(|a| !a.is_deleted())
            .ok_or(AccountError::NotFound(account_id))?;
        let old_parent = account.parent_id;
        if old_parent == parent_id {
            tx.commit().await?;
            return self.repo.find_by_id(account_id).await;
        }

        if let Some(parent_id) = parent_id {
            let parent = locked
                .get(&parent_id)
                .filter(|p| !p.is_deleted())
                .ok_or(AccountError::ParentNotFound(parent_id))?;
            check_parent_type(parent, account.account_type)?;
            let tree = ChartTree::from_accounts(locked.values())?;
            if tree.would_create_cycle(account_id, parent_id) {
                return Err(AccountError::CycleDetected(account_id));
            }
        }

        self.repo
            .set_parent_in_tx(&mut tx, account_id, parent_id)
            .await?;

        let mut resync = vec![account_id];
        resync.extend(old_parent);
        resync.extend(parent_id);
        self.balances.sync_accounts_in_tx(&mut tx, &resync).await?;

        let account = self.repo.find_by_id_in(&mut *tx, account_id).await?;
        tx.commit().await?;
        tracing::info!(%account_id, ?old_parent, ?parent_id, "account re-parented");
        Ok(account)
    }

    /// Soft deletes an account. Requires no live children and a zero cached balance.
    #[instrument(name = "saldo_ledger.accounts.soft_delete", skip(self), err)]
    pub async fn soft_delete(&self, account_id: AccountId) -> Result<(), AccountError> {
        let mut tx = self.pool.begin().await?;
        db::set_lock_timeout(&mut tx, self.lock_timeout).await?;
        let locked = self
            .repo
            .lock_with_ancestors(&mut tx, &[account_id])
            .await
            .map_err(map_lock_err)?;
        let account = locked
            .get(&account_id)
            .filter(|a| !a.is_deleted())
            .ok_or(AccountError::NotFound(account_id))?;
        if self.repo.live_children_count(&mut tx, account_id).await? > 0 {
            return Err(AccountError::HasChildren(account_id));
        }
        if !account.balance.is_zero() {
            return Err(AccountError::NonZeroBalance(account_id, account.balance));
        }
        self.repo.soft_delete_in_tx(&mut tx, account_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// A non-header parent must share the child's account type.
fn check_parent_type(parent: &AccountValues, child: AccountType) -> Result<(), AccountError> {
    if parent.is_header || parent.account_type == child {
        Ok(())
    } else {
        Err(AccountError::ParentTypeMismatch {
            parent: parent.account_type,
            child,
        })
    }
}

fn map_lock_err(err: sqlx::Error) -> AccountError {
    if db::is_lock_contention(&err) {
        AccountError::Concurrency(err.to_string())
    } else {
        AccountError::Sqlx(err)
    }
}
