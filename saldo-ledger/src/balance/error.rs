use thiserror::Error;

use crate::{account::tree::ChartCycle, primitives::AccountId};

#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("BalanceError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("BalanceError - AccountNotFound: account id '{0}' not found")]
    AccountNotFound(AccountId),
    #[error("BalanceError - ChartCycle: {0}")]
    ChartCycle(#[from] ChartCycle),
    #[error("BalanceError - Concurrency: {0}")]
    Concurrency(String),
}

impl BalanceError {
    pub(crate) fn from_lock(err: sqlx::Error) -> Self {
        if crate::db::is_lock_contention(&err) {
            BalanceError::Concurrency(err.to_string())
        } else {
            BalanceError::Sqlx(err)
        }
    }
}
