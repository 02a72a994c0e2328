use rust_decimal::Decimal;
use thiserror::Error;

use crate::primitives::{AccountId, AccountType};

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("AccountError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("AccountError - NotFound: account id '{0}' not found")]
    NotFound(AccountId),
    #[error("AccountError - CodeNotFound: account code '{0}' not found")]
    CodeNotFound(String),
    #[error("AccountError - DuplicateCode: account code '{0}' already exists")]
    DuplicateCode(String),
    #[error("AccountError - ParentNotFound: parent account '{0}' not found")]
    ParentNotFound(AccountId),
    #[error("AccountError - ParentTypeMismatch: parent is {parent} but account is {child}")]
    ParentTypeMismatch {
        parent: AccountType,
        child: AccountType,
    },
    #[error("AccountError - CycleDetected: account '{0}' would become its own ancestor")]
    CycleDetected(AccountId),
    #[error("AccountError - ChartCycle: {0}")]
    ChartCycle(#[from] super::tree::ChartCycle),
    #[error("AccountError - HasChildren: account '{0}' still has live children")]
    HasChildren(AccountId),
    #[error("AccountError - NonZeroBalance: account '{0}' has balance {1}")]
    NonZeroBalance(AccountId, Decimal),
    #[error("AccountError - InvalidUpdate: {0}")]
    InvalidUpdate(#[from] super::entity::AccountUpdateError),
    #[error("AccountError - Concurrency: {0}")]
    Concurrency(String),
    #[error("AccountError - Balance: {0}")]
    Balance(#[from] crate::balance::error::BalanceError),
}
