use thiserror::Error;

use saldo_ledger::{reconciliation::error::ReconciliationError, snapshot::error::SnapshotError};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("JobError - SnapshotError: {0}")]
    SnapshotError(#[from] SnapshotError),
    #[error("JobError - ReconciliationError: {0}")]
    ReconciliationError(#[from] ReconciliationError),
}
