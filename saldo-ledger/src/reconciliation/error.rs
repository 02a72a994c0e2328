use thiserror::Error;

use crate::{account::tree::ChartCycle, balance::error::BalanceError};

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("ReconciliationError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("ReconciliationError - BalanceError: {0}")]
    BalanceError(#[from] BalanceError),
    #[error("ReconciliationError - ChartCycle: {0}")]
    ChartCycle(#[from] ChartCycle),
    #[error("ReconciliationError - Concurrency: {0}")]
    Concurrency(String),
}

impl ReconciliationError {
    pub(crate) fn from_lock(err: sqlx::Error) -> Self {
        if crate::db::is_lock_contention(&err) {
            ReconciliationError::Concurrency(err.to_string())
        } else {
            ReconciliationError::Sqlx(err)
        }
    }
}
