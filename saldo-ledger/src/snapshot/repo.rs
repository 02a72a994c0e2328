use chrono::{DateTime, Utc};
use sqlx::{Executor, PgConnection, PgExecutor, PgPool};

use super::error::SnapshotError;
use crate::primitives::*;
use saldo_types::balance::AccountBalanceSnapshot;

pub(super) const VIEW_NAME: &str = "saldo_account_balances";
const CREATE_VIEW: &str = include_str!("../../migrations/account_balances_view.sql");

const SNAPSHOT_COLUMNS: &str = "account_id, account_code, account_name, account_type, category, \
     parent_id, is_header, is_active, current_balance, total_debits, total_credits, \
     transaction_count, last_transaction_date, normal_balance, last_updated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ViewState {
    Missing,
    Unpopulated,
    Populated,
}

pub(super) struct ViewStats {
    pub accounts: i64,
    pub non_zero_balances: i64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub(super) struct SnapshotRepo {
    pool: PgPool,
}

impl SnapshotRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn view_state(&self, executor: impl PgExecutor<'_>) -> Result<ViewState, sqlx::Error> {
        let populated: Option<bool> = sqlx::query_scalar(
            r#"SELECT ispopulated FROM pg_matviews
               WHERE schemaname = current_schema() AND matviewname = $1"#,
        )
        .bind(VIEW_NAME)
        .fetch_optional(executor)
        .await?;
        Ok(match populated {
            None => ViewState::Missing,
            Some(false) => ViewState::Unpopulated,
            Some(true) => ViewState::Populated,
        })
    }

    pub async fn create_view(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        conn.execute(sqlx::raw_sql(CREATE_VIEW)).await?;
        Ok(())
    }

    pub async fn refresh_in(
        &self,
        executor: impl PgExecutor<'_>,
        concurrently: bool,
    ) -> Result<(), sqlx::Error> {
        let sql = if concurrently {
            "REFRESH MATERIALIZED VIEW CONCURRENTLY saldo_account_balances"
        } else {
            "REFRESH MATERIALIZED VIEW saldo_account_balances"
        };
        executor.execute(sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<ViewStats, sqlx::Error> {
        let (accounts, non_zero_balances, refreshed_at): (i64, i64, Option<DateTime<Utc>>) =
            sqlx::query_as(
                r#"SELECT
                     COUNT(*),
                     COUNT(*) FILTER (WHERE current_balance <> 0),
                     MAX(last_updated)
                   FROM saldo_account_balances"#,
            )
            .fetch_one(&self.pool)
            .await?;
        Ok(ViewStats {
            accounts,
            non_zero_balances,
            refreshed_at,
        })
    }

    pub async fn find(
        &self,
        account_id: AccountId,
    ) -> Result<Option<AccountBalanceSnapshot>, sqlx::Error> {
        sqlx::query_as::<_, AccountBalanceSnapshot>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM saldo_account_balances WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_all(&self) -> Result<Vec<AccountBalanceSnapshot>, sqlx::Error> {
        sqlx::query_as::<_, AccountBalanceSnapshot>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM saldo_account_balances ORDER BY account_code"
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// Whether any balance-affecting journal exists yet.
    pub async fn has_ledger_activity(&self) -> Result<bool, SnapshotError> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (
                 SELECT 1 FROM saldo_journal_entries
                 WHERE status::text = ANY($1) AND deleted_at IS NULL
               )"#,
        )
        .bind(crate::db::balance_affecting_statuses())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
