use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::error::MigrateError;
use crate::db;
use saldo_types::migration::*;

const CREATE_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS saldo_migration_logs (
  id BIGSERIAL PRIMARY KEY,
  migration_name VARCHAR NOT NULL UNIQUE,
  status VARCHAR NOT NULL CHECK (status IN ('SUCCESS', 'FAILED', 'SKIPPED')),
  message TEXT,
  executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  execution_time_ms BIGINT NOT NULL DEFAULT 0,
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

#[derive(Debug, Clone)]
pub(super) struct MigrationLogRepo {
    pool: PgPool,
}

impl MigrationLogRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn ensure_log_table(&self, conn: &mut PgConnection) -> Result<(), MigrateError> {
        sqlx::raw_sql(CREATE_LOG_TABLE).execute(conn).await?;
        Ok(())
    }

    pub async fn find_status(
        &self,
        conn: &mut PgConnection,
        name: &str,
    ) -> Result<Option<MigrationStatus>, MigrateError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM saldo_migration_logs WHERE migration_name = $1")
                .bind(name)
                .fetch_optional(conn)
                .await?;
        status.map(|s| parse_status(&s)).transpose()
    }

    pub async fn record(
        &self,
        conn: &mut PgConnection,
        name: &str,
        status: MigrationStatus,
        message: Option<&str>,
        execution_time_ms: i64,
    ) -> Result<(), MigrateError> {
        sqlx::query(
            r#"INSERT INTO saldo_migration_logs (migration_name, status, message, execution_time_ms)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (migration_name) DO UPDATE SET
                 status = EXCLUDED.status,
                 message = EXCLUDED.message,
                 execution_time_ms = EXCLUDED.execution_time_ms,
                 executed_at = NOW(),
                 updated_at = NOW()"#,
        )
        .bind(name)
        .bind(status.to_string())
        .bind(message)
        .bind(execution_time_ms)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<MigrationLogValues>, MigrateError> {
        let rows: Vec<(String, String, Option<String>, DateTime<Utc>, i64)> = match sqlx::query_as(
            r#"SELECT migration_name, status, message, executed_at, execution_time_ms
               FROM saldo_migration_logs
               ORDER BY migration_name"#,
        )
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows,
            Err(e) if db::has_code(&e, db::UNDEFINED_TABLE) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        rows.into_iter()
            .map(
                |(migration_name, status, message, executed_at, execution_time_ms)| {
                    Ok(MigrationLogValues {
                        migration_name,
                        status: parse_status(&status)?,
                        message,
                        executed_at,
                        execution_time_ms,
                    })
                },
            )
            .collect()
    }
}

fn parse_status(status: &str) -> Result<MigrationStatus, MigrateError> {
    status
        .parse()
        .map_err(|_| MigrateError::UnknownStatus(status.to_string()))
}
