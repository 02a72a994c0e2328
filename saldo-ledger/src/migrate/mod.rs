//! Named, exactly-once migrations recorded in `saldo_migration_logs`.
pub mod error;
mod repo;

use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tracing::instrument;

use std::time::Instant;

pub use saldo_types::migration::*;

use crate::{db, reconciliation::Reconciliation};
use error::*;
use repo::*;

const MIGRATION_LOCK_KEY: &str = "saldo_migrations";

#[derive(Debug, Clone, Copy)]
pub enum MigrationKind {
    /// Executed as one multi-statement script over the simple query protocol.
    Script(&'static str),
    /// Rebuilds every cached balance from the journal ledger.
    InitialBalanceSync,
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub kind: MigrationKind,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_core_schema",
        kind: MigrationKind::Script(include_str!("../../migrations/0001_core_schema.sql")),
    },
    Migration {
        name: "0002_posted_line_guard",
        kind: MigrationKind::Script(include_str!("../../migrations/0002_posted_line_guard.sql")),
    },
    Migration {
        name: "0003_initial_balance_sync",
        kind: MigrationKind::InitialBalanceSync,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub name: String,
    pub status: MigrationStatus,
    pub duration_ms: i64,
}

#[derive(Clone)]
pub struct Migrator {
    repo: MigrationLogRepo,
    reconciliation: Reconciliation,
    pool: PgPool,
}

impl Migrator {
    pub(crate) fn new(pool: &PgPool, reconciliation: Reconciliation) -> Self {
        Self {
            repo: MigrationLogRepo::new(pool),
            reconciliation,
            pool: pool.clone(),
        }
    }

    /// Runs every pending migration in order. Stops at the first failure, which is
    /// recorded as FAILED and may be retried by the next run.
    #[instrument(name = "saldo_ledger.migrator.run", skip(self), err)]
    pub async fn run(&self) -> Result<Vec<MigrationOutcome>, MigrateError> {
        let mut outcomes = Vec::with_capacity(MIGRATIONS.len());
        for migration in MIGRATIONS {
            outcomes.push(self.run_one(migration).await?);
        }
        let applied = outcomes
            .iter()
            .filter(|o| o.status == MigrationStatus::Success)
            .count();
        tracing::info!(applied, total = outcomes.len(), "migrations complete");
        Ok(outcomes)
    }

    #[instrument(name = "saldo_ledger.migrator.migration_status", skip(self), err)]
    pub async fn migration_status(&self) -> Result<Vec<MigrationLogValues>, MigrateError> {
        self.repo.list().await
    }

    #[instrument(
        name = "saldo_ledger.migrator.run_one",
        skip(self, migration),
        fields(migration = migration.name),
        err
    )]
    async fn run_one(&self, migration: &Migration) -> Result<MigrationOutcome, MigrateError> {
        let mut tx = self.pool.begin().await?;
        db::advisory_xact_lock(&mut tx, MIGRATION_LOCK_KEY).await?;
        self.repo.ensure_log_table(&mut tx).await?;

        if self.repo.find_status(&mut tx, migration.name).await? == Some(MigrationStatus::Success)
        {
            tx.commit().await?;
            tracing::debug!(migration = migration.name, "already applied");
            return Ok(MigrationOutcome {
                name: migration.name.to_string(),
                status: MigrationStatus::Skipped,
                duration_ms: 0,
            });
        }

        let start = Instant::now();
        let mut savepoint = Connection::begin(&mut *tx).await?;
        let result = match migration.kind {
            MigrationKind::Script(sql) => sqlx::raw_sql(sql)
                .execute(&mut *savepoint)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            MigrationKind::InitialBalanceSync => self
                .reconciliation
                .initial_sync_in_tx(&mut savepoint)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        };
        let duration_ms = start.elapsed().as_millis() as i64;

        match result {
            Ok(()) => {
                savepoint.commit().await?;
                self.repo
                    .record(
                        &mut tx,
                        migration.name,
                        MigrationStatus::Success,
                        None,
                        duration_ms,
                    )
                    .await?;
                tx.commit().await?;
                tracing::info!(migration = migration.name, duration_ms, "migration applied");
                Ok(MigrationOutcome {
                    name: migration.name.to_string(),
                    status: MigrationStatus::Success,
                    duration_ms,
                })
            }
            Err(message) => {
                savepoint.rollback().await?;
                self.repo
                    .record(
                        &mut tx,
                        migration.name,
                        MigrationStatus::Failed,
                        Some(&message),
                        duration_ms,
                    )
                    .await?;
                tx.commit().await?;
                tracing::error!(migration = migration.name, %message, "migration failed");
                Err(MigrateError::MigrationFailure {
                    name: migration.name.to_string(),
                    message,
                })
            }
        }
    }
}
