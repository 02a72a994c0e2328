mod helpers;

use rust_decimal_macros::dec;

use saldo_ledger::{
    account::*,
    journal::{error::JournalError, gate::PostingCandidate, validation::ValidationError, *},
    *,
};

#[tokio::test]
async fn simple_sale() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let receivable = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let revenue = helpers::create_account(&ledger, AccountType::Revenue, None).await?;

    let new_entry = NewJournalEntry::builder()
        .description("Invoice INV-001")
        .reference(JournalReference::new(SourceType::Sale, uuid::Uuid::new_v4()))
        .add_line(NewJournalLine::debit(receivable.id(), dec!(100000)))
        .add_line(NewJournalLine::credit(revenue.id(), dec!(100000)))
        .build()
        .unwrap();
    let entry = ledger.post_journal(new_entry).await?;

    assert_eq!(entry.status(), JournalStatus::Posted);
    assert!(entry.entry_number().starts_with("JE-"));
    assert_eq!(entry.lines().len(), 2);
    assert_eq!(entry.values().total_debit, dec!(100000));
    assert!(entry.values().posted_at.is_some());

    let balances = ledger.balances();
    assert_eq!(balances.cached_balance(receivable.id()).await?, dec!(100000));
    assert_eq!(balances.cached_balance(revenue.id()).await?, dec!(100000));

    let derived = balances.account_balance(receivable.id(), None).await?;
    assert_eq!(derived.balance, dec!(100000));
    assert_eq!(derived.total_debits, dec!(100000));
    assert_eq!(derived.normal_balance(), DebitOrCredit::Debit);

    let found = ledger.journals().find_by_entry_number(entry.entry_number()).await?;
    assert_eq!(found.id(), entry.id());
    assert_eq!(found.lines()[0].line_number, 1);
    Ok(())
}

#[tokio::test]
async fn unbalanced_entry_leaves_no_trace() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let revenue = helpers::create_account(&ledger, AccountType::Revenue, None).await?;

    let new_entry = NewJournalEntry::builder()
        .description("off by one cent")
        .add_line(NewJournalLine::debit(cash.id(), dec!(100.00)))
        .add_line(NewJournalLine::credit(revenue.id(), dec!(99.99)))
        .build()
        .unwrap();
    let res = ledger.journals().post(new_entry).await;
    assert!(matches!(
        res,
        Err(JournalError::Validation(ValidationError::Unbalanced { .. }))
    ));

    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saldo_journal_entries")
        .fetch_one(ledger.pool())
        .await?;
    let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saldo_journal_lines")
        .fetch_one(ledger.pool())
        .await?;
    assert_eq!(entries, 0);
    assert_eq!(lines, 0);
    assert_eq!(ledger.balances().cached_balance(cash.id()).await?, dec!(0));
    Ok(())
}

#[tokio::test]
async fn rejects_unusable_accounts() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let header = helpers::create_header(&ledger, AccountType::Asset, None).await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, Some(header.id())).await?;
    let revenue = helpers::create_account(&ledger, AccountType::Revenue, None).await?;

    let res = ledger
        .journals()
        .post(helpers::transfer(header.id(), revenue.id(), dec!(10)))
        .await;
    assert!(matches!(
        res,
        Err(JournalError::Validation(ValidationError::HeaderAccount(id))) if id == header.id()
    ));

    let missing = AccountId::new();
    let res = ledger
        .journals()
        .post(helpers::transfer(missing, revenue.id(), dec!(10)))
        .await;
    assert!(matches!(
        res,
        Err(JournalError::Validation(ValidationError::AccountNotFound(id))) if id == missing
    ));

    ledger
        .accounts()
        .update(cash.id(), AccountUpdate::default().is_active(false).clone())
        .await?;
    let res = ledger
        .journals()
        .post(helpers::transfer(cash.id(), revenue.id(), dec!(10)))
        .await;
    assert!(matches!(
        res,
        Err(JournalError::Validation(ValidationError::InactiveAccount(_)))
    ));
    Ok(())
}

fn only_small_postings(candidate: &PostingCandidate<'_>) -> Result<(), String> {
    if candidate.total > rust_decimal::Decimal::from(1000) {
        return Err(format!("{} needs approval", candidate.total));
    }
    Ok(())
}

#[tokio::test]
async fn posting_gate_can_refuse() -> anyhow::Result<()> {
    let pool = helpers::init_pool().await?;
    let config = SaldoLedgerConfig::builder()
        .pool(pool)
        .exec_migrations(true)
        .posting_gate(only_small_postings)
        .build()?;
    let ledger = SaldoLedger::init(config).await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;

    ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(500)))
        .await?;
    let res = ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(5000)))
        .await;
    assert!(matches!(
        res,
        Err(LedgerError::JournalError(JournalError::PostingRejected(_)))
    ));
    assert_eq!(ledger.balances().cached_balance(cash.id()).await?, dec!(500));
    Ok(())
}

#[tokio::test]
async fn draft_lifecycle() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let expense = helpers::create_account(&ledger, AccountType::Expense, None).await?;
    let payable = helpers::create_account(&ledger, AccountType::Liability, None).await?;

    let draft = ledger
        .journals()
        .create_draft(helpers::transfer(expense.id(), payable.id(), dec!(250.50)))
        .await?;
    assert_eq!(draft.status(), JournalStatus::Draft);
    assert!(draft.values().posted_at.is_none());
    assert_eq!(ledger.balances().cached_balance(expense.id()).await?, dec!(0));
    assert_eq!(
        ledger.balances().account_balance(expense.id(), None).await?.balance,
        dec!(0)
    );

    let posted = ledger.journals().post_draft(draft.id()).await?;
    assert_eq!(posted.status(), JournalStatus::Posted);
    assert_eq!(posted.entry_number(), draft.entry_number());
    assert_eq!(ledger.balances().cached_balance(expense.id()).await?, dec!(250.50));
    assert_eq!(ledger.balances().cached_balance(payable.id()).await?, dec!(250.50));

    let res = ledger.journals().post_draft(draft.id()).await;
    assert!(matches!(
        res,
        Err(JournalError::InvalidStatusTransition {
            from: JournalStatus::Posted,
            ..
        })
    ));
    let res = ledger.journals().discard_draft(draft.id()).await;
    assert!(matches!(res, Err(JournalError::NotDraft(_, JournalStatus::Posted))));

    let discarded = ledger
        .journals()
        .create_draft(helpers::transfer(expense.id(), payable.id(), dec!(1)))
        .await?;
    ledger.journals().discard_draft(discarded.id()).await?;
    let res = ledger.journals().find_by_id(discarded.id()).await;
    assert!(matches!(res, Err(JournalError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn posted_lines_are_immutable() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;
    let entry = ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(42)))
        .await?;

    let res = sqlx::query("UPDATE saldo_journal_lines SET debit_amount = 1 WHERE journal_entry_id = $1")
        .bind(entry.id())
        .execute(ledger.pool())
        .await;
    assert!(res.is_err());
    let res = sqlx::query("DELETE FROM saldo_journal_lines WHERE journal_entry_id = $1")
        .bind(entry.id())
        .execute(ledger.pool())
        .await;
    assert!(res.is_err());
    Ok(())
}

#[tokio::test]
async fn list_and_account_lines() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;
    for amount in [dec!(1), dec!(2), dec!(3)] {
        ledger
            .post_journal(helpers::transfer(cash.id(), equity.id(), amount))
            .await?;
    }
    ledger
        .journals()
        .create_draft(helpers::transfer(cash.id(), equity.id(), dec!(4)))
        .await?;

    let page = ledger
        .journals()
        .list(
            JournalFilter {
                status: Some(JournalStatus::Posted),
                ..Default::default()
            },
            query::PaginatedQueryArgs {
                first: 2,
                after: None,
            },
        )
        .await?;
    assert_eq!(page.entities.len(), 2);
    assert!(page.has_next_page);
    let rest = ledger
        .journals()
        .list(
            JournalFilter {
                status: Some(JournalStatus::Posted),
                ..Default::default()
            },
            query::PaginatedQueryArgs {
                first: 2,
                after: page.end_cursor,
            },
        )
        .await?;
    assert_eq!(rest.entities.len(), 1);
    assert!(!rest.has_next_page);

    let lines = ledger.journals().lines_for_account(cash.id(), None, None).await?;
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l.credit_amount.is_zero()));
    Ok(())
}

#[tokio::test]
async fn lock_timeout_is_retryable() -> anyhow::Result<()> {
    let ledger =
        helpers::init_ledger_with_lock_timeout(std::time::Duration::from_millis(200)).await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;

    let mut holder = ledger.pool().begin().await?;
    sqlx::query("SELECT id FROM saldo_accounts WHERE id = $1 FOR UPDATE")
        .bind(cash.id())
        .execute(&mut *holder)
        .await?;

    let res = ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(10)))
        .await;
    let Err(err) = res else {
        panic!("posting should time out on the held lock");
    };
    assert!(matches!(
        err,
        LedgerError::JournalError(JournalError::Concurrency(_))
    ));
    assert!(err.is_retryable());
    holder.rollback().await?;

    ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(10)))
        .await?;
    assert_eq!(ledger.balances().cached_balance(cash.id()).await?, dec!(10));
    Ok(())
}
