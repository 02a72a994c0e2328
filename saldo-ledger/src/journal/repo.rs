use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};

use super::{cursor::*, entity::*, error::JournalError, validation::JournalTotals};
use crate::{primitives::*, query::*};

const ENTRY_COLUMNS: &str = "id, entry_number, entry_date, status, description, source_type, \
     source_id, total_debit, total_credit, reverses_entry_id, reversed_by_entry_id, posted_at, \
     deleted_at, created_at";

const LINE_COLUMNS: &str =
    "id, journal_entry_id, line_number, account_id, debit_amount, credit_amount, description";

pub(super) struct EntryInsert<'a> {
    pub id: JournalEntryId,
    pub entry_date: NaiveDate,
    pub description: &'a str,
    pub reference: &'a JournalReference,
    pub status: JournalStatus,
    pub totals: JournalTotals,
    pub reverses_entry_id: Option<JournalEntryId>,
}

#[derive(Debug, Clone)]
pub(super) struct JournalRepo {
    pool: PgPool,
}

impl JournalRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn insert_entry(
        &self,
        conn: &mut PgConnection,
        entry: EntryInsert<'_>,
    ) -> Result<JournalEntryValues, JournalError> {
        let values = sqlx::query_as::<_, JournalEntryValues>(&format!(
            r#"INSERT INTO saldo_journal_entries
                (id, entry_date, status, description, source_type, source_id,
                 total_debit, total_credit, reverses_entry_id, posted_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                 CASE WHEN $3 = 'DRAFT'::JournalStatus THEN NULL ELSE NOW() END)
               RETURNING {ENTRY_COLUMNS}"#
        ))
        .bind(entry.id)
        .bind(entry.entry_date)
        .bind(entry.status)
        .bind(entry.description)
        .bind(entry.reference.source_type)
        .bind(entry.reference.source_id)
        .bind(entry.totals.debit)
        .bind(entry.totals.credit)
        .bind(entry.reverses_entry_id)
        .fetch_one(conn)
        .await?;
        Ok(values)
    }

    pub async fn insert_lines(
        &self,
        conn: &mut PgConnection,
        journal_entry_id: JournalEntryId,
        lines: &[NewJournalLine],
    ) -> Result<Vec<JournalLineValues>, JournalError> {
        let mut ids = Vec::with_capacity(lines.len());
        let mut line_numbers = Vec::with_capacity(lines.len());
        let mut account_ids = Vec::with_capacity(lines.len());
        let mut debits: Vec<Decimal> = Vec::with_capacity(lines.len());
        let mut credits: Vec<Decimal> = Vec::with_capacity(lines.len());
        let mut descriptions: Vec<Option<String>> = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            ids.push(uuid::Uuid::from(JournalLineId::new()));
            line_numbers.push(idx as i32 + 1);
            account_ids.push(uuid::Uuid::from(line.account_id));
            debits.push(line.debit);
            credits.push(line.credit);
            descriptions.push(line.description.clone());
        }
        let rows = sqlx::query_as::<_, JournalLineValues>(&format!(
            r#"INSERT INTO saldo_journal_lines
                (id, journal_entry_id, line_number, account_id, debit_amount, credit_amount, description)
               SELECT v.id, $1, v.line_number, v.account_id, v.debit_amount, v.credit_amount, v.description
               FROM UNNEST($2::uuid[], $3::int[], $4::uuid[], $5::numeric[], $6::numeric[], $7::varchar[])
                 AS v(id, line_number, account_id, debit_amount, credit_amount, description)
               RETURNING {LINE_COLUMNS}"#
        ))
        .bind(journal_entry_id)
        .bind(&ids)
        .bind(&line_numbers)
        .bind(&account_ids)
        .bind(&debits)
        .bind(&credits)
        .bind(&descriptions)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id_in(
        &self,
        executor: impl PgExecutor<'_>,
        id: JournalEntryId,
    ) -> Result<JournalEntryValues, JournalError> {
        sqlx::query_as::<_, JournalEntryValues>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM saldo_journal_entries WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(JournalError::NotFound(id))
    }

    pub async fn find_by_id_for_update(
        &self,
        conn: &mut PgConnection,
        id: JournalEntryId,
    ) -> Result<JournalEntryValues, JournalError> {
        sqlx::query_as::<_, JournalEntryValues>(&format!(
            r#"SELECT {ENTRY_COLUMNS} FROM saldo_journal_entries
               WHERE id = $1 AND deleted_at IS NULL
               FOR UPDATE"#
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(JournalError::from_lock)?
        .ok_or(JournalError::NotFound(id))
    }

    pub async fn find_by_entry_number(
        &self,
        entry_number: &str,
    ) -> Result<JournalEntryValues, JournalError> {
        sqlx::query_as::<_, JournalEntryValues>(&format!(
            r#"SELECT {ENTRY_COLUMNS} FROM saldo_journal_entries
               WHERE entry_number = $1 AND deleted_at IS NULL"#
        ))
        .bind(entry_number)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| JournalError::EntryNumberNotFound(entry_number.to_string()))
    }

    pub async fn find_lines_in(
        &self,
        executor: impl PgExecutor<'_>,
        journal_entry_id: JournalEntryId,
    ) -> Result<Vec<JournalLineValues>, JournalError> {
        let rows = sqlx::query_as::<_, JournalLineValues>(&format!(
            r#"SELECT {LINE_COLUMNS} FROM saldo_journal_lines
               WHERE journal_entry_id = $1
               ORDER BY line_number"#
        ))
        .bind(journal_entry_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn find_lines(
        &self,
        journal_entry_id: JournalEntryId,
    ) -> Result<Vec<JournalLineValues>, JournalError> {
        self.find_lines_in(&self.pool, journal_entry_id).await
    }

    pub async fn list(
        &self,
        filter: &JournalFilter,
        query: PaginatedQueryArgs<JournalEntryByCreatedAtCursor>,
    ) -> Result<PaginatedQueryRet<JournalEntryValues, JournalEntryByCreatedAtCursor>, JournalError>
    {
        let (created_at, id) = match query.after {
            Some(JournalEntryByCreatedAtCursor { created_at, id }) => {
                (Some(created_at), Some(uuid::Uuid::from(id)))
            }
            None => (None, None),
        };
        let rows = sqlx::query_as::<_, JournalEntryValues>(&format!(
            r#"SELECT {ENTRY_COLUMNS} FROM saldo_journal_entries
               WHERE deleted_at IS NULL
                 AND ($1::JournalStatus IS NULL OR status = $1)
                 AND ($2::date IS NULL OR entry_date >= $2)
                 AND ($3::date IS NULL OR entry_date <= $3)
                 AND ($4::timestamptz IS NULL OR (created_at, id) < ($4, $5))
               ORDER BY created_at DESC, id DESC
               LIMIT $6"#
        ))
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(created_at)
        .bind(id)
        .bind(query.first as i64 + 1)
        .fetch_all(&self.pool)
        .await?;

        let has_next_page = rows.len() > query.first;
        let entities: Vec<_> = rows.into_iter().take(query.first).collect();
        let end_cursor = entities.last().map(JournalEntryByCreatedAtCursor::from);
        Ok(PaginatedQueryRet {
            entities,
            has_next_page,
            end_cursor,
        })
    }

    pub async fn lines_for_account(
        &self,
        account_id: AccountId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<AccountLedgerLine>, JournalError> {
        let rows = sqlx::query_as::<_, AccountLedgerLine>(
            r#"SELECT
                 l.id AS line_id,
                 l.journal_entry_id,
                 e.entry_number,
                 e.entry_date,
                 e.status,
                 l.line_number,
                 l.debit_amount,
                 l.credit_amount,
                 l.description
               FROM saldo_journal_lines l
               JOIN saldo_journal_entries e ON e.id = l.journal_entry_id
               WHERE l.account_id = $1
                 AND e.status::text = ANY($4)
                 AND e.deleted_at IS NULL
                 AND ($2::date IS NULL OR e.entry_date >= $2)
                 AND ($3::date IS NULL OR e.entry_date <= $3)
               ORDER BY e.entry_date, e.created_at, l.line_number"#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .bind(crate::db::balance_affecting_statuses())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_posted(
        &self,
        conn: &mut PgConnection,
        id: JournalEntryId,
        totals: JournalTotals,
    ) -> Result<JournalEntryValues, JournalError> {
        sqlx::query_as::<_, JournalEntryValues>(&format!(
            r#"UPDATE saldo_journal_entries
               SET status = 'POSTED', posted_at = NOW(), total_debit = $2, total_credit = $3
               WHERE id = $1 AND status = 'DRAFT'
               RETURNING {ENTRY_COLUMNS}"#
        ))
        .bind(id)
        .bind(totals.debit)
        .bind(totals.credit)
        .fetch_optional(conn)
        .await?
        .ok_or(JournalError::NotFound(id))
    }

    pub async fn mark_reversed(
        &self,
        conn: &mut PgConnection,
        id: JournalEntryId,
        reversed_by: JournalEntryId,
    ) -> Result<(), JournalError> {
        sqlx::query(
            r#"UPDATE saldo_journal_entries
               SET status = 'REVERSED', reversed_by_entry_id = $2
               WHERE id = $1 AND status = 'POSTED'"#,
        )
        .bind(id)
        .bind(reversed_by)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn discard_draft(
        &self,
        conn: &mut PgConnection,
        id: JournalEntryId,
    ) -> Result<(), JournalError> {
        sqlx::query(
            r#"UPDATE saldo_journal_entries
               SET deleted_at = NOW()
               WHERE id = $1 AND status = 'DRAFT' AND deleted_at IS NULL"#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }
}
