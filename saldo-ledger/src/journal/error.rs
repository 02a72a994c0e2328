use thiserror::Error;

use super::validation::ValidationError;
use crate::{
    account::error::AccountError,
    balance::error::BalanceError,
    primitives::{JournalEntryId, JournalStatus},
};

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("JournalError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JournalError - Validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("JournalError - NotFound: journal entry '{0}' not found")]
    NotFound(JournalEntryId),
    #[error("JournalError - EntryNumberNotFound: journal entry '{0}' not found")]
    EntryNumberNotFound(String),
    #[error("JournalError - InvalidStatusTransition: journal entry '{id}' is {from}, cannot become {to}")]
    InvalidStatusTransition {
        id: JournalEntryId,
        from: JournalStatus,
        to: JournalStatus,
    },
    #[error("JournalError - NotDraft: journal entry '{0}' is {1}")]
    NotDraft(JournalEntryId, JournalStatus),
    #[error("JournalError - PostingRejected: {0}")]
    PostingRejected(String),
    #[error("JournalError - Concurrency: {0}")]
    Concurrency(String),
    #[error("JournalError - AccountError: {0}")]
    AccountError(#[from] AccountError),
    #[error("JournalError - BalanceError: {0}")]
    BalanceError(#[from] BalanceError),
}

impl JournalError {
    pub(crate) fn from_lock(err: sqlx::Error) -> Self {
        if crate::db::is_lock_contention(&err) {
            JournalError::Concurrency(err.to_string())
        } else {
            JournalError::Sqlx(err)
        }
    }
}
