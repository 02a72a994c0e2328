//! Trial balance and balance sheet derived from the ledger or from the
//! materialized view.
pub mod error;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use std::collections::HashMap;

use crate::{
    account::{AccountRepo, AccountValues},
    balance::{derive::LedgerTotals, Balances},
    primitives::*,
    snapshot::{AccountBalanceSnapshot, AccountBalanceSnapshots, SnapshotFilter, SnapshotSource},
};
use error::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportSource {
    Ledger,
    Snapshot(SnapshotSource),
}

/// A posting account with the balance a report is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAccount {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub category: AccountCategory,
    pub balance: Decimal,
}

impl From<&AccountBalanceSnapshot> for ReportAccount {
    fn from(row: &AccountBalanceSnapshot) -> Self {
        Self {
            account_id: row.account_id,
            account_code: row.account_code.clone(),
            account_name: row.account_name.clone(),
            account_type: row.account_type,
            category: row.category,
            balance: row.current_balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub debit_balance: Decimal,
    pub credit_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: Option<NaiveDate>,
    pub lines: Vec<TrialBalanceLine>,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub is_balanced: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheetSection {
    pub accounts: Vec<ReportAccount>,
    pub total: Decimal,
}

impl BalanceSheetSection {
    fn push(&mut self, account: ReportAccount) {
        self.total += account.balance;
        self.accounts.push(account);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of: Option<NaiveDate>,
    pub source: ReportSource,
    pub assets: BalanceSheetSection,
    pub liabilities: BalanceSheetSection,
    pub equity: BalanceSheetSection,
    /// Revenue minus expense, reported as part of equity.
    pub net_income: Decimal,
    pub total_equity: Decimal,
    pub total_liabilities_and_equity: Decimal,
    /// `assets.total - total_liabilities_and_equity`
    pub balance_difference: Decimal,
    pub is_balanced: bool,
}

/// Service assembling financial reports.
#[derive(Clone)]
pub struct Reports {
    accounts: AccountRepo,
    balances: Balances,
    snapshots: AccountBalanceSnapshots,
    pool: PgPool,
}

impl Reports {
    pub(crate) fn new(
        pool: &PgPool,
        balances: Balances,
        snapshots: AccountBalanceSnapshots,
    ) -> Self {
        Self {
            accounts: AccountRepo::new(pool),
            balances,
            snapshots,
            pool: pool.clone(),
        }
    }

    /// Live trial balance over entries dated on or before `as_of`.
    #[instrument(name = "saldo_ledger.reports.trial_balance", skip(self), err)]
    pub async fn trial_balance(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<TrialBalance, ReportError> {
        let accounts = self.accounts.load_all_in(&self.pool).await?;
        let totals = self.balances.ledger_totals(as_of).await?;
        Ok(assemble_trial_balance(as_of, &accounts, &totals))
    }

    /// Live balance sheet over entries dated on or before `as_of`.
    #[instrument(name = "saldo_ledger.reports.balance_sheet", skip(self), err)]
    pub async fn balance_sheet(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<BalanceSheet, ReportError> {
        let accounts = self.accounts.load_all_in(&self.pool).await?;
        let totals = self.balances.ledger_totals(as_of).await?;
        let rows = posting_accounts(&accounts).map(|a| ReportAccount {
            account_id: a.id,
            account_code: a.code.clone(),
            account_name: a.name.clone(),
            account_type: a.account_type,
            category: a.category,
            balance: totals
                .get(&a.id)
                .map(|t| t.signed_for(a.account_type))
                .unwrap_or_default(),
        });
        Ok(assemble_balance_sheet(as_of, ReportSource::Ledger, rows))
    }

    /// Balance sheet read from the last refresh of the materialized view.
    #[instrument(name = "saldo_ledger.reports.balance_sheet_from_snapshot", skip(self), err)]
    pub async fn balance_sheet_from_snapshot(&self) -> Result<BalanceSheet, ReportError> {
        let listing = self
            .snapshots
            .list(SnapshotFilter {
                include_inactive: true,
                ..Default::default()
            })
            .await?;
        Ok(assemble_balance_sheet(
            None,
            ReportSource::Snapshot(listing.source),
            listing.rows.iter().map(ReportAccount::from),
        ))
    }
}

fn posting_accounts(accounts: &[AccountValues]) -> impl Iterator<Item = &AccountValues> {
    accounts.iter().filter(|a| !a.is_header && !a.is_deleted())
}

/// One line per posting account with activity. The net of debits and credits is
/// shown on the side it falls on.
pub fn assemble_trial_balance(
    as_of: Option<NaiveDate>,
    accounts: &[AccountValues],
    totals: &HashMap<AccountId, LedgerTotals>,
) -> TrialBalance {
    let mut lines: Vec<_> = posting_accounts(accounts)
        .filter_map(|a| {
            let t = totals.get(&a.id).filter(|t| t.line_count > 0)?;
            let net = t.total_debits - t.total_credits;
            Some(TrialBalanceLine {
                account_id: a.id,
                account_code: a.code.clone(),
                account_name: a.name.clone(),
                account_type: a.account_type,
                debit_balance: net.max(Decimal::ZERO),
                credit_balance: (-net).max(Decimal::ZERO),
            })
        })
        .collect();
    lines.sort_by(|a, b| a.account_code.cmp(&b.account_code));

    let total_debits: Decimal = lines.iter().map(|l| l.debit_balance).sum();
    let total_credits: Decimal = lines.iter().map(|l| l.credit_balance).sum();
    TrialBalance {
        as_of,
        lines,
        total_debits,
        total_credits,
        is_balanced: total_debits == total_credits,
    }
}

/// Sorts balance sheet accounts into sections, folding revenue and expense into
/// net income. Zero balances are left out.
pub fn assemble_balance_sheet(
    as_of: Option<NaiveDate>,
    source: ReportSource,
    rows: impl IntoIterator<Item = ReportAccount>,
) -> BalanceSheet {
    let mut assets = BalanceSheetSection::default();
    let mut liabilities = BalanceSheetSection::default();
    let mut equity = BalanceSheetSection::default();
    let mut net_income = Decimal::ZERO;

    let mut rows: Vec<_> = rows.into_iter().filter(|r| !r.balance.is_zero()).collect();
    rows.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    for row in rows {
        if !row.account_type.is_balance_sheet() {
            match row.account_type.normal_balance() {
                DebitOrCredit::Credit => net_income += row.balance,
                DebitOrCredit::Debit => net_income -= row.balance,
            }
            continue;
        }
        match row.account_type {
            AccountType::Asset => assets.push(row),
            AccountType::Liability => liabilities.push(row),
            _ => equity.push(row),
        }
    }

    let total_equity = equity.total + net_income;
    let total_liabilities_and_equity = liabilities.total + total_equity;
    let balance_difference = assets.total - total_liabilities_and_equity;
    BalanceSheet {
        as_of,
        source,
        assets,
        liabilities,
        equity,
        net_income,
        total_equity,
        total_liabilities_and_equity,
        balance_difference,
        is_balanced: balance_difference.is_zero(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    fn account(code: &str, account_type: AccountType) -> AccountValues {
        AccountValues {
            id: AccountId::new(),
            code: code.to_string(),
            name: code.to_string(),
            description: None,
            account_type,
            category: AccountCategory::default_for(account_type),
            parent_id: None,
            is_header: false,
            is_active: true,
            balance: Decimal::ZERO,
            deleted_at: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    fn totals(debits: Decimal, credits: Decimal) -> LedgerTotals {
        LedgerTotals {
            total_debits: debits,
            total_credits: credits,
            line_count: 1,
            ..Default::default()
        }
    }

    fn report_account(code: &str, account_type: AccountType, balance: Decimal) -> ReportAccount {
        ReportAccount {
            account_id: AccountId::new(),
            account_code: code.to_string(),
            account_name: code.to_string(),
            account_type,
            category: AccountCategory::default_for(account_type),
            balance,
        }
    }

    #[test]
    fn trial_balance_for_simple_sale() {
        let receivable = account("1201", AccountType::Asset);
        let revenue = account("4101", AccountType::Revenue);
        let idle = account("5101", AccountType::Expense);
        let totals = HashMap::from([
            (receivable.id, totals(dec!(100000), dec!(0))),
            (revenue.id, totals(dec!(0), dec!(100000))),
        ]);
        let tb = assemble_trial_balance(None, &[revenue, receivable, idle], &totals);
        assert_eq!(tb.lines.len(), 2);
        assert_eq!(tb.lines[0].account_code, "1201");
        assert_eq!(tb.lines[0].debit_balance, dec!(100000));
        assert_eq!(tb.lines[1].credit_balance, dec!(100000));
        assert_eq!(tb.total_debits, dec!(100000));
        assert!(tb.is_balanced);
    }

    #[test]
    fn contra_balance_lands_on_the_other_side() {
        let cash = account("1101", AccountType::Asset);
        let totals = HashMap::from([(cash.id, totals(dec!(10), dec!(25)))]);
        let tb = assemble_trial_balance(None, &[cash], &totals);
        assert_eq!(tb.lines[0].debit_balance, dec!(0));
        assert_eq!(tb.lines[0].credit_balance, dec!(15));
    }

    #[test]
    fn balance_sheet_folds_net_income_into_equity() {
        let sheet = assemble_balance_sheet(
            None,
            ReportSource::Ledger,
            vec![
                report_account("1101", AccountType::Asset, dec!(150000)),
                report_account("2101", AccountType::Liability, dec!(20000)),
                report_account("3101", AccountType::Equity, dec!(50000)),
                report_account("4101", AccountType::Revenue, dec!(100000)),
                report_account("5101", AccountType::Expense, dec!(20000)),
                report_account("1999", AccountType::Asset, dec!(0)),
            ],
        );
        assert_eq!(sheet.assets.accounts.len(), 1);
        assert_eq!(sheet.net_income, dec!(80000));
        assert_eq!(sheet.total_equity, dec!(130000));
        assert_eq!(sheet.total_liabilities_and_equity, dec!(150000));
        assert!(sheet.is_balanced);
    }

    #[test]
    fn unbalanced_sheet_reports_difference() {
        let sheet = assemble_balance_sheet(
            None,
            ReportSource::Ledger,
            vec![report_account("1101", AccountType::Asset, dec!(10))],
        );
        assert_eq!(sheet.balance_difference, dec!(10));
        assert!(!sheet.is_balanced);
    }
}
