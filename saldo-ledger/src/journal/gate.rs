//! Hook for an external approval workflow deciding whether an entry may post.
use chrono::NaiveDate;
use rust_decimal::Decimal;

use saldo_types::journal::JournalReference;

use crate::primitives::JournalEntryId;

/// What the approval workflow gets to see of an entry about to be posted.
#[derive(Debug, Clone)]
pub struct PostingCandidate<'a> {
    pub entry_id: JournalEntryId,
    pub entry_date: NaiveDate,
    pub description: &'a str,
    pub reference: &'a JournalReference,
    pub total: Decimal,
    pub line_count: usize,
}

pub trait PostingGate: Send + Sync {
    /// `Err` carries the reason the posting was refused.
    fn approve(&self, candidate: &PostingCandidate<'_>) -> Result<(), String>;
}

/// Approves every posting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPostings;

impl PostingGate for AllowAllPostings {
    fn approve(&self, _: &PostingCandidate<'_>) -> Result<(), String> {
        Ok(())
    }
}

impl<F> PostingGate for F
where
    F: Fn(&PostingCandidate<'_>) -> Result<(), String> + Send + Sync,
{
    fn approve(&self, candidate: &PostingCandidate<'_>) -> Result<(), String> {
        self(candidate)
    }
}
