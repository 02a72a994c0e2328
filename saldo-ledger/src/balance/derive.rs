//! Pure balance derivation from ledger totals.
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use saldo_types::account::AccountValues;

use crate::{
    account::tree::{ChartCycle, ChartTree},
    primitives::{AccountId, AccountType},
};

/// Aggregated journal line activity for one account over ledger-effective journals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub line_count: i64,
    pub last_entry_date: Option<NaiveDate>,
    pub last_posted_at: Option<DateTime<Utc>>,
}

impl LedgerTotals {
    pub fn combine(self, other: &Self) -> Self {
        Self {
            total_debits: self.total_debits + other.total_debits,
            total_credits: self.total_credits + other.total_credits,
            line_count: self.line_count + other.line_count,
            last_entry_date: self.last_entry_date.max(other.last_entry_date),
            last_posted_at: self.last_posted_at.max(other.last_posted_at),
        }
    }

    pub fn signed_for(&self, account_type: AccountType) -> Decimal {
        account_type.signed_balance(self.total_debits, self.total_credits)
    }
}

/// Ledger-derived balance of every live non-header account. Accounts without
/// activity derive to zero.
pub fn leaf_balances(
    accounts: &[AccountValues],
    totals: &HashMap<AccountId, LedgerTotals>,
) -> HashMap<AccountId, Decimal> {
    accounts
        .iter()
        .filter(|a| !a.is_header && !a.is_deleted())
        .map(|a| {
            let balance = totals
                .get(&a.id)
                .map(|t| t.signed_for(a.account_type))
                .unwrap_or_default();
            (a.id, balance)
        })
        .collect()
}

/// Expected cached balance of every live account: leaves from the ledger,
/// headers as the sum of their live direct children.
pub fn expected_balances(
    accounts: &[AccountValues],
    totals: &HashMap<AccountId, LedgerTotals>,
) -> Result<HashMap<AccountId, Decimal>, ChartCycle> {
    let tree = ChartTree::from_accounts(accounts)?;
    Ok(tree.aggregate_balances(&leaf_balances(accounts, totals)))
}

/// Totals rolled up the same way as balances, so a header reports the activity of
/// the accounts it aggregates.
pub fn aggregated_totals(
    tree: &ChartTree,
    totals: &HashMap<AccountId, LedgerTotals>,
) -> HashMap<AccountId, LedgerTotals> {
    tree.aggregate(
        |id| totals.get(&id).copied().unwrap_or_default(),
        |acc, child| acc.combine(child),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::primitives::AccountCategory;

    fn account(account_type: AccountType, parent_id: Option<AccountId>, is_header: bool) -> AccountValues {
        AccountValues {
            id: AccountId::new(),
            code: "code".to_string(),
            name: "name".to_string(),
            description: None,
            account_type,
            category: AccountCategory::default_for(account_type),
            parent_id,
            is_header,
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

    #[test]
    fn simple_sale_derives_positive_balances_on_both_sides() {
        let receivable = account(AccountType::Asset, None, false);
        let revenue = account(AccountType::Revenue, None, false);
        let ledger = HashMap::from([
            (receivable.id, totals(dec!(100000), dec!(0))),
            (revenue.id, totals(dec!(0), dec!(100000))),
        ]);
        let balances = leaf_balances(&[receivable.clone(), revenue.clone()], &ledger);
        assert_eq!(balances[&receivable.id], dec!(100000));
        assert_eq!(balances[&revenue.id], dec!(100000));
    }

    #[test]
    fn expense_is_debit_normal_and_liability_credit_normal() {
        let expense = account(AccountType::Expense, None, false);
        let payable = account(AccountType::Liability, None, false);
        let ledger = HashMap::from([
            (expense.id, totals(dec!(250.10), dec!(50.10))),
            (payable.id, totals(dec!(75), dec!(25))),
        ]);
        let balances = leaf_balances(&[expense.clone(), payable.clone()], &ledger);
        assert_eq!(balances[&expense.id], dec!(200.00));
        assert_eq!(balances[&payable.id], dec!(-50));
    }

    #[test]
    fn headers_aggregate_expected_children() {
        let header = account(AccountType::Asset, None, true);
        let cash = account(AccountType::Asset, Some(header.id), false);
        let bank = account(AccountType::Asset, Some(header.id), false);
        let idle = account(AccountType::Asset, Some(header.id), false);
        let ledger = HashMap::from([
            (cash.id, totals(dec!(10), dec!(0))),
            (bank.id, totals(dec!(30), dec!(5))),
        ]);
        let expected =
            expected_balances(&[header.clone(), cash, bank, idle.clone()], &ledger).unwrap();
        assert_eq!(expected[&header.id], dec!(35));
        assert_eq!(expected[&idle.id], Decimal::ZERO);
    }

    #[test]
    fn reversed_activity_nets_to_zero() {
        let cash = account(AccountType::Asset, None, false);
        let ledger = HashMap::from([(cash.id, totals(dec!(120.55), dec!(120.55)))]);
        let balances = leaf_balances(&[cash.clone()], &ledger);
        assert_eq!(balances[&cash.id], Decimal::ZERO);
    }

    #[test]
    fn aggregated_totals_roll_up() {
        let header = account(AccountType::Expense, None, true);
        let rent = account(AccountType::Expense, Some(header.id), false);
        let power = account(AccountType::Expense, Some(header.id), false);
        let tree = ChartTree::from_accounts(&[header.clone(), rent.clone(), power.clone()]).unwrap();
        let ledger = HashMap::from([
            (rent.id, totals(dec!(10), dec!(0))),
            (power.id, totals(dec!(5), dec!(1))),
        ]);
        let rolled = aggregated_totals(&tree, &ledger);
        assert_eq!(rolled[&header.id].total_debits, dec!(15));
        assert_eq!(rolled[&header.id].total_credits, dec!(1));
        assert_eq!(rolled[&header.id].line_count, 2);
    }
}
