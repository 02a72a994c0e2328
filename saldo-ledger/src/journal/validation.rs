//! Pre-write checks of a journal entry. Nothing touches the store before these pass.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::HashMap;

use super::entity::NewJournalLine;
use crate::{account::AccountValues, primitives::AccountId};

pub const MIN_LINES: usize = 2;
/// Matches the NUMERIC(20, 2) columns so equality stays exact after persisting.
pub const AMOUNT_SCALE: u32 = 2;

/// The rule a rejected journal entry violated. Line numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ValidationError - TooFewLines: at least {MIN_LINES} lines required, got {0}")]
    TooFewLines(usize),
    #[error("ValidationError - EmptyLine: line {line} has neither debit nor credit")]
    EmptyLine { line: usize },
    #[error("ValidationError - BothSidesSet: line {line} has both debit and credit")]
    BothSidesSet { line: usize },
    #[error("ValidationError - NegativeAmount: line {line} has a negative amount")]
    NegativeAmount { line: usize },
    #[error("ValidationError - TooManyDecimalPlaces: line {line} exceeds {AMOUNT_SCALE} decimal places")]
    TooManyDecimalPlaces { line: usize },
    #[error("ValidationError - Unbalanced: debit {debit} != credit {credit}")]
    Unbalanced { debit: Decimal, credit: Decimal },
    #[error("ValidationError - AccountNotFound: account '{0}' does not exist")]
    AccountNotFound(AccountId),
    #[error("ValidationError - HeaderAccount: account '{0}' is a header account")]
    HeaderAccount(AccountId),
    #[error("ValidationError - InactiveAccount: account '{0}' is inactive")]
    InactiveAccount(AccountId),
    #[error("ValidationError - MissingDescription: description is required")]
    MissingDescription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTotals {
    pub debit: Decimal,
    pub credit: Decimal,
}

/// Checks everything that does not need the store: description, line count,
/// per-line amounts and exact balance.
pub fn validate_shape(
    description: &str,
    lines: &[NewJournalLine],
) -> Result<JournalTotals, ValidationError> {
    if description.trim().is_empty() {
        return Err(ValidationError::MissingDescription);
    }
    if lines.len() < MIN_LINES {
        return Err(ValidationError::TooFewLines(lines.len()));
    }

    let mut totals = JournalTotals {
        debit: Decimal::ZERO,
        credit: Decimal::ZERO,
    };
    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            return Err(ValidationError::NegativeAmount { line: line_no });
        }
        match (line.debit.is_zero(), line.credit.is_zero()) {
            (true, true) => return Err(ValidationError::EmptyLine { line: line_no }),
            (false, false) => return Err(ValidationError::BothSidesSet { line: line_no }),
            _ => (),
        }
        if exceeds_scale(line.debit) || exceeds_scale(line.credit) {
            return Err(ValidationError::TooManyDecimalPlaces { line: line_no });
        }
        totals.debit += line.debit;
        totals.credit += line.credit;
    }

    if totals.debit != totals.credit {
        return Err(ValidationError::Unbalanced {
            debit: totals.debit,
            credit: totals.credit,
        });
    }
    Ok(totals)
}

/// Every referenced account must exist, be live, active and not a header.
pub fn validate_accounts(
    lines: &[NewJournalLine],
    accounts: &HashMap<AccountId, AccountValues>,
) -> Result<(), ValidationError> {
    for line in lines {
        let account = accounts
            .get(&line.account_id)
            .filter(|a| !a.is_deleted())
            .ok_or(ValidationError::AccountNotFound(line.account_id))?;
        if account.accepts_postings() {
            continue;
        }
        if account.is_header {
            return Err(ValidationError::HeaderAccount(account.id));
        }
        return Err(ValidationError::InactiveAccount(account.id));
    }
    Ok(())
}

/// Referenced accounts must exist and be live. Used where the entry was already
/// accepted once, such as reversals and drafts.
pub fn validate_accounts_exist(
    lines: &[NewJournalLine],
    accounts: &HashMap<AccountId, AccountValues>,
) -> Result<(), ValidationError> {
    match lines
        .iter()
        .find(|l| !accounts.get(&l.account_id).is_some_and(|a| !a.is_deleted()))
    {
        Some(line) => Err(ValidationError::AccountNotFound(line.account_id)),
        None => Ok(()),
    }
}

fn exceeds_scale(amount: Decimal) -> bool {
    amount.normalize().scale() > AMOUNT_SCALE
}
