#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg_attr(feature = "fail-on-warnings", deny(clippy::all))]

//! # saldo-ledger
//!
//! Double-entry ledger engine that keeps cached per-account balances, the journal
//! ledger and the reporting view consistent with one another. The posted journal
//! lines are the only source of truth; everything else is derived from them.

pub mod account;
pub mod balance;
mod db;
pub mod journal;
mod ledger;
pub mod migrate;
pub mod reconciliation;
pub mod report;
pub mod snapshot;

pub use ledger::*;

pub mod primitives {
    pub use saldo_types::primitives::*;
}

pub mod query {
    #[derive(Debug)]
    pub struct PaginatedQueryArgs<T: std::fmt::Debug> {
        pub first: usize,
        pub after: Option<T>,
    }

    pub struct PaginatedQueryRet<T, C> {
        pub entities: Vec<T>,
        pub has_next_page: bool,
        pub end_cursor: Option<C>,
    }
}

pub use primitives::*;
