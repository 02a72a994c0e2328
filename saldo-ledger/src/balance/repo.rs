use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};

use std::collections::HashMap;

use super::derive::LedgerTotals;
use crate::primitives::AccountId;

#[derive(sqlx::FromRow)]
struct LedgerTotalsRow {
    account_id: AccountId,
    total_debits: Decimal,
    total_credits: Decimal,
    line_count: i64,
    last_entry_date: Option<NaiveDate>,
    last_posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub(super) struct BalanceRepo {
    pool: PgPool,
}

impl BalanceRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Line totals over ledger-effective journals, optionally restricted to some
    /// accounts and to entries dated on or before `as_of`.
    pub async fn ledger_totals(
        &self,
        executor: impl PgExecutor<'_>,
        account_ids: Option<&[AccountId]>,
        as_of: Option<NaiveDate>,
    ) -> Result<HashMap<AccountId, LedgerTotals>, sqlx::Error> {
        let ids: Option<Vec<uuid::Uuid>> =
            account_ids.map(|ids| ids.iter().map(uuid::Uuid::from).collect());
        let rows = sqlx::query_as::<_, LedgerTotalsRow>(
            r#"SELECT
                 l.account_id,
                 SUM(l.debit_amount) AS total_debits,
                 SUM(l.credit_amount) AS total_credits,
                 COUNT(*) AS line_count,
                 MAX(e.entry_date) AS last_entry_date,
                 MAX(e.posted_at) AS last_posted_at
               FROM saldo_journal_lines l
               JOIN saldo_journal_entries e ON e.id = l.journal_entry_id
               WHERE e.status::text = ANY($3)
                 AND e.deleted_at IS NULL
                 AND ($1::uuid[] IS NULL OR l.account_id = ANY($1))
                 AND ($2::date IS NULL OR e.entry_date <= $2)
               GROUP BY l.account_id"#,
        )
        .bind(ids)
        .bind(as_of)
        .bind(crate::db::balance_affecting_statuses())
        .fetch_all(executor)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.account_id,
                    LedgerTotals {
                        total_debits: row.total_debits,
                        total_credits: row.total_credits,
                        line_count: row.line_count,
                        last_entry_date: row.last_entry_date,
                        last_posted_at: row.last_posted_at,
                    },
                )
            })
            .collect())
    }

    /// Writes leaf balances in one statement. Returns the number of rows that changed.
    pub async fn write_balances(
        &self,
        conn: &mut PgConnection,
        balances: &[(AccountId, Decimal)],
    ) -> Result<u64, sqlx::Error> {
        if balances.is_empty() {
            return Ok(0);
        }
        let (ids, amounts): (Vec<uuid::Uuid>, Vec<Decimal>) = balances
            .iter()
            .map(|(id, balance)| (uuid::Uuid::from(id), *balance))
            .unzip();
        let res = sqlx::query(
            r#"UPDATE saldo_accounts a
               SET balance = v.balance, modified_at = NOW()
               FROM UNNEST($1::uuid[], $2::numeric[]) AS v(id, balance)
               WHERE a.id = v.id
                 AND NOT a.is_header
                 AND a.balance IS DISTINCT FROM v.balance"#,
        )
        .bind(&ids)
        .bind(&amounts)
        .execute(conn)
        .await?;
        Ok(res.rows_affected())
    }

    /// Sets each header to the sum of its live direct children. The headers passed
    /// in one call must not depend on each other.
    pub async fn recompute_headers(
        &self,
        conn: &mut PgConnection,
        header_ids: &[AccountId],
    ) -> Result<u64, sqlx::Error> {
        if header_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<uuid::Uuid> = header_ids.iter().map(uuid::Uuid::from).collect();
        let res = sqlx::query(
            r#"UPDATE saldo_accounts h
               SET balance = s.total, modified_at = NOW()
               FROM (
                 SELECT p.id, COALESCE(SUM(c.balance), 0) AS total
                 FROM saldo_accounts p
                 LEFT JOIN saldo_accounts c
                   ON c.parent_id = p.id AND c.deleted_at IS NULL
                 WHERE p.id = ANY($1)
                 GROUP BY p.id
               ) s
               WHERE h.id = s.id
                 AND h.is_header
                 AND h.balance IS DISTINCT FROM s.total"#,
        )
        .bind(&ids)
        .execute(conn)
        .await?;
        Ok(res.rows_affected())
    }

    pub async fn zero_all(&self, conn: &mut PgConnection) -> Result<u64, sqlx::Error> {
        let res = sqlx::query("UPDATE saldo_accounts SET balance = 0, modified_at = NOW()")
            .execute(conn)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn cached_balance(&self, id: AccountId) -> Result<Option<Decimal>, sqlx::Error> {
        sqlx::query_scalar("SELECT balance FROM saldo_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
