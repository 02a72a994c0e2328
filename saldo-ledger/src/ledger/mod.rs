pub mod config;
pub mod error;

use sqlx::PgPool;
use std::sync::Arc;
pub use tracing::instrument;

pub use config::*;
pub use error::*;

use crate::{
    account::Accounts,
    balance::Balances,
    journal::{
        gate::{AllowAllPostings, PostingGate},
        JournalEntry, Journals, NewJournalEntry,
    },
    migrate::Migrator,
    reconciliation::Reconciliation,
    report::Reports,
    snapshot::AccountBalanceSnapshots,
};

#[derive(Clone)]
pub struct SaldoLedger {
    pool: PgPool,
    accounts: Accounts,
    journals: Journals,
    balances: Balances,
    snapshots: AccountBalanceSnapshots,
    reconciliation: Reconciliation,
    migrator: Migrator,
    reports: Reports,
}

impl SaldoLedger {
    pub async fn init(config: SaldoLedgerConfig) -> Result<Self, LedgerError> {
        let pool = match (config.pool, config.pg_con) {
            (Some(pool), None) => pool,
            (None, Some(pg_con)) => {
                let mut pool_opts = sqlx::postgres::PgPoolOptions::new();
                if let Some(max_connections) = config.max_connections {
                    pool_opts = pool_opts.max_connections(max_connections);
                }
                pool_opts.connect(&pg_con).await?
            }
            _ => {
                return Err(LedgerError::ConfigError(
                    "One of pg_con or pool must be set".to_string(),
                ))
            }
        };

        let lock_timeout = config.lock_timeout;
        let gate: Arc<dyn PostingGate> = match config.posting_gate {
            Some(gate) => gate,
            None => Arc::new(AllowAllPostings),
        };
        let balances = Balances::new(&pool, lock_timeout);
        let accounts = Accounts::new(&pool, balances.clone(), lock_timeout);
        let journals = Journals::new(&pool, balances.clone(), gate, lock_timeout);
        let snapshots = AccountBalanceSnapshots::new(&pool, config.snapshot_max_staleness);
        let reconciliation = Reconciliation::new(&pool, balances.clone(), lock_timeout);
        let migrator = Migrator::new(&pool, reconciliation.clone());
        let reports = Reports::new(&pool, balances.clone(), snapshots.clone());

        if config.exec_migrations {
            migrator.run().await?;
            snapshots.ensure().await?;
        }

        Ok(Self {
            pool,
            accounts,
            journals,
            balances,
            snapshots,
            reconciliation,
            migrator,
            reports,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn journals(&self) -> &Journals {
        &self.journals
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn snapshots(&self) -> &AccountBalanceSnapshots {
        &self.snapshots
    }

    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    pub fn reports(&self) -> &Reports {
        &self.reports
    }

    /// Posts a balanced journal entry and synchronizes the affected balances in the
    /// same database transaction.
    #[instrument(name = "saldo_ledger.post_journal", skip(self, new_entry), err)]
    pub async fn post_journal(
        &self,
        new_entry: NewJournalEntry,
    ) -> Result<JournalEntry, LedgerError> {
        Ok(self.journals.post(new_entry).await?)
    }
}
