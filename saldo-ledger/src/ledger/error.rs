use thiserror::Error;

use crate::{
    account::error::AccountError, balance::error::BalanceError, journal::error::JournalError,
    migrate::error::MigrateError, reconciliation::error::ReconciliationError,
    report::error::ReportError, snapshot::error::SnapshotError,
};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("LedgerError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("LedgerError - Config: {0}")]
    ConfigError(String),
    #[error("LedgerError - AccountError: {0}")]
    AccountError(#[from] AccountError),
    #[error("LedgerError - JournalError: {0}")]
    JournalError(#[from] JournalError),
    #[error("LedgerError - BalanceError: {0}")]
    BalanceError(#[from] BalanceError),
    #[error("LedgerError - SnapshotError: {0}")]
    SnapshotError(#[from] SnapshotError),
    #[error("LedgerError - ReconciliationError: {0}")]
    ReconciliationError(#[from] ReconciliationError),
    #[error("LedgerError - MigrateError: {0}")]
    MigrateError(#[from] MigrateError),
    #[error("LedgerError - ReportError: {0}")]
    ReportError(#[from] ReportError),
}

impl LedgerError {
    /// Lock timeouts, deadlocks and serialization failures. Retrying the same
    /// request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountError(AccountError::Concurrency(_))
                | LedgerError::JournalError(JournalError::Concurrency(_))
                | LedgerError::JournalError(JournalError::BalanceError(BalanceError::Concurrency(_)))
                | LedgerError::BalanceError(BalanceError::Concurrency(_))
                | LedgerError::ReconciliationError(ReconciliationError::Concurrency(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_is_retryable() {
        let err = LedgerError::from(JournalError::Concurrency("lock timeout".to_string()));
        assert!(err.is_retryable());
        let err = LedgerError::from(JournalError::PostingRejected("no".to_string()));
        assert!(!err.is_retryable());
    }
}
