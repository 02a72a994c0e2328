use sqlx::{PgConnection, PgExecutor, PgPool};

use std::collections::{HashMap, HashSet};

use super::{cursor::AccountByCodeCursor, entity::*, error::AccountError};
use crate::{db, query::*};

const ACCOUNT_COLUMNS: &str = "id, code, name, description, account_type, category, parent_id, \
     is_header, is_active, balance, deleted_at, created_at, modified_at";

#[derive(Debug, Clone)]
pub(crate) struct AccountRepo {
    pool: PgPool,
}

impl AccountRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create_in_tx(
        &self,
        conn: &mut PgConnection,
        new_account: NewAccount,
    ) -> Result<Account, AccountError> {
        let category = new_account.category();
        let res = sqlx::query_as::<_, AccountValues>(&format!(
            r#"INSERT INTO saldo_accounts
                (id, code, name, description, account_type, category, parent_id, is_header, is_active)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(new_account.id)
        .bind(&new_account.code)
        .bind(&new_account.name)
        .bind(&new_account.description)
        .bind(new_account.account_type)
        .bind(category)
        .bind(new_account.parent_id)
        .bind(new_account.is_header)
        .bind(new_account.is_active)
        .fetch_one(conn)
        .await;
        match res {
            Ok(values) => Ok(Account::new(values)),
            Err(e) if db::has_code(&e, db::UNIQUE_VIOLATION) => {
                Err(AccountError::DuplicateCode(new_account.code))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: AccountId) -> Result<Account, AccountError> {
        self.find_by_id_in(&self.pool, id).await
    }

    pub async fn find_by_id_in(
        &self,
        executor: impl PgExecutor<'_>,
        id: AccountId,
    ) -> Result<Account, AccountError> {
        sqlx::query_as::<_, AccountValues>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Account::new)
        .ok_or(AccountError::NotFound(id))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Account, AccountError> {
        sqlx::query_as::<_, AccountValues>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .map(Account::new)
        .ok_or_else(|| AccountError::CodeNotFound(code.to_string()))
    }

    pub async fn find_all_in(
        &self,
        executor: impl PgExecutor<'_>,
        ids: &[AccountId],
    ) -> Result<HashMap<AccountId, AccountValues>, sqlx::Error> {
        let ids: Vec<uuid::Uuid> = ids.iter().map(uuid::Uuid::from).collect();
        let rows = sqlx::query_as::<_, AccountValues>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|values| (values.id, values)).collect())
    }

    /// Every account including soft-deleted ones.
    pub async fn load_all_in(
        &self,
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<AccountValues>, sqlx::Error> {
        sqlx::query_as::<_, AccountValues>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts ORDER BY code"
        ))
        .fetch_all(executor)
        .await
    }

    /// The given accounts and every ancestor, without locking.
    pub async fn find_with_ancestors_in(
        &self,
        executor: impl PgExecutor<'_>,
        ids: &[AccountId],
    ) -> Result<Vec<AccountValues>, sqlx::Error> {
        let ids: Vec<uuid::Uuid> = ids.iter().map(uuid::Uuid::from).collect();
        sqlx::query_as::<_, AccountValues>(&format!(
            r#"WITH RECURSIVE chain AS (
                 SELECT id, parent_id FROM saldo_accounts WHERE id = ANY($1)
                 UNION
                 SELECT p.id, p.parent_id
                 FROM saldo_accounts p
                 JOIN chain c ON p.id = c.parent_id
               )
               SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts
               WHERE id IN (SELECT id FROM chain)"#
        ))
        .bind(&ids)
        .fetch_all(executor)
        .await
    }

    /// The account and all of its descendants.
    pub async fn find_subtree_in(
        &self,
        executor: impl PgExecutor<'_>,
        id: AccountId,
    ) -> Result<Vec<AccountValues>, sqlx::Error> {
        sqlx::query_as::<_, AccountValues>(&format!(
            r#"WITH RECURSIVE subtree AS (
                 SELECT id FROM saldo_accounts WHERE id = $1
                 UNION
                 SELECT c.id
                 FROM saldo_accounts c
                 JOIN subtree s ON c.parent_id = s.id
               )
               SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts
               WHERE id IN (SELECT id FROM subtree)"#
        ))
        .bind(id)
        .fetch_all(executor)
        .await
    }

    pub async fn list(
        &self,
        query: PaginatedQueryArgs<AccountByCodeCursor>,
    ) -> Result<PaginatedQueryRet<Account, AccountByCodeCursor>, AccountError> {
        let (code, id) = match query.after {
            Some(AccountByCodeCursor { code, id }) => (Some(code), Some(uuid::Uuid::from(id))),
            None => (None, None),
        };
        let rows = sqlx::query_as::<_, AccountValues>(&format!(
            r#"SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts
               WHERE deleted_at IS NULL
                 AND (($1::varchar IS NULL) OR (code, id) > ($1, $2))
               ORDER BY code, id
               LIMIT $3"#
        ))
        .bind(code)
        .bind(id)
        .bind(query.first as i64 + 1)
        .fetch_all(&self.pool)
        .await?;

        let has_next_page = rows.len() > query.first;
        let mut end_cursor = None;
        let entities: Vec<Account> = rows
            .into_iter()
            .take(query.first)
            .map(|values| {
                end_cursor = Some(AccountByCodeCursor::from(&values));
                Account::new(values)
            })
            .collect();
        Ok(PaginatedQueryRet {
            entities,
            has_next_page,
            end_cursor,
        })
    }

    pub async fn list_children(&self, parent_id: AccountId) -> Result<Vec<Account>, AccountError> {
        let rows = sqlx::query_as::<_, AccountValues>(&format!(
            r#"SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts
               WHERE parent_id = $1 AND deleted_at IS NULL
               ORDER BY code"#
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Account::new).collect())
    }

    /// Row-locks the given accounts together with every ancestor, ordered by id.
    /// The chain is re-read once the locks are held; a concurrent re-parent may have
    /// moved a locked account under ancestors that still need locking.
    pub async fn lock_with_ancestors(
        &self,
        conn: &mut PgConnection,
        ids: &[AccountId],
    ) -> Result<HashMap<AccountId, AccountValues>, sqlx::Error> {
        let mut to_lock = ids.to_vec();
        let mut locked = HashSet::new();
        loop {
            let rows = self.lock_chain(&mut *conn, &to_lock).await?;
            locked.extend(rows.iter().map(|values| values.id));
            let chain = self.find_with_ancestors_in(&mut *conn, ids).await?;
            let missing: Vec<_> = chain
                .iter()
                .map(|values| values.id)
                .filter(|id| !locked.contains(id))
                .collect();
            if missing.is_empty() {
                return Ok(chain.into_iter().map(|values| (values.id, values)).collect());
            }
            to_lock = missing;
        }
    }

    async fn lock_chain(
        &self,
        conn: &mut PgConnection,
        ids: &[AccountId],
    ) -> Result<Vec<AccountValues>, sqlx::Error> {
        let ids: Vec<uuid::Uuid> = ids.iter().map(uuid::Uuid::from).collect();
        sqlx::query_as::<_, AccountValues>(&format!(
            r#"WITH RECURSIVE chain AS (
                 SELECT id, parent_id FROM saldo_accounts WHERE id = ANY($1)
                 UNION
                 SELECT p.id, p.parent_id
                 FROM saldo_accounts p
                 JOIN chain c ON p.id = c.parent_id
               )
               SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts
               WHERE id IN (SELECT id FROM chain)
               ORDER BY id
               FOR UPDATE"#
        ))
        .bind(&ids)
        .fetch_all(conn)
        .await
    }

    pub async fn lock_all(
        &self,
        conn: &mut PgConnection,
    ) -> Result<Vec<AccountValues>, sqlx::Error> {
        sqlx::query_as::<_, AccountValues>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM saldo_accounts ORDER BY id FOR UPDATE"
        ))
        .fetch_all(conn)
        .await
    }

    pub async fn update_in_tx(
        &self,
        conn: &mut PgConnection,
        account: &Account,
    ) -> Result<(), AccountError> {
        let values = account.values();
        sqlx::query(
            r#"UPDATE saldo_accounts
               SET name = $2, description = $3, category = $4, is_active = $5, modified_at = NOW()
               WHERE id = $1"#,
        )
        .bind(values.id)
        .bind(&values.name)
        .bind(&values.description)
        .bind(values.category)
        .bind(values.is_active)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn set_parent_in_tx(
        &self,
        conn: &mut PgConnection,
        id: AccountId,
        parent_id: Option<AccountId>,
    ) -> Result<(), AccountError> {
        sqlx::query("UPDATE saldo_accounts SET parent_id = $2, modified_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(parent_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn soft_delete_in_tx(
        &self,
        conn: &mut PgConnection,
        id: AccountId,
    ) -> Result<(), AccountError> {
        sqlx::query(
            r#"UPDATE saldo_accounts
               SET deleted_at = NOW(), is_active = FALSE, modified_at = NOW()
               WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn live_children_count(
        &self,
        conn: &mut PgConnection,
        id: AccountId,
    ) -> Result<i64, AccountError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM saldo_accounts WHERE parent_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(conn)
        .await?;
        Ok(count)
    }
}
