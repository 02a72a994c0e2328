use thiserror::Error;

use crate::{balance::error::BalanceError, snapshot::error::SnapshotError};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("ReportError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("ReportError - BalanceError: {0}")]
    BalanceError(#[from] BalanceError),
    #[error("ReportError - SnapshotError: {0}")]
    SnapshotError(#[from] SnapshotError),
}
