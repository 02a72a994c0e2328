use thiserror::Error;

use crate::primitives::AccountId;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("SnapshotError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("SnapshotError - AccountNotFound: account id '{0}' not found")]
    AccountNotFound(AccountId),
}
