mod helpers;

use rust_decimal_macros::dec;

use std::time::Duration;

use saldo_ledger::{report::*, snapshot::*, *};

#[tokio::test]
async fn falls_back_to_cached_balances_before_any_posting() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;

    let (row, source) = ledger.snapshots().find(cash.id()).await?;
    assert_eq!(source, SnapshotSource::CachedAccounts);
    assert_eq!(row.current_balance, dec!(0));
    assert_eq!(row.normal_balance, DebitOrCredit::Debit);

    let listing = ledger.snapshots().list(SnapshotFilter::default()).await?;
    assert_eq!(listing.source, SnapshotSource::CachedAccounts);
    assert_eq!(listing.rows.len(), 1);
    Ok(())
}

#[tokio::test]
async fn refreshed_view_matches_the_ledger() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let assets = helpers::create_header(&ledger, AccountType::Asset, None).await?;
    let receivable = helpers::create_account(&ledger, AccountType::Asset, Some(assets.id())).await?;
    let revenue = helpers::create_account(&ledger, AccountType::Revenue, None).await?;
    ledger
        .post_journal(helpers::transfer(receivable.id(), revenue.id(), dec!(100000)))
        .await?;

    let refresh = ledger.snapshots().refresh().await?;
    assert!(refresh.concurrently);
    assert_eq!(refresh.accounts, 3);
    assert_eq!(refresh.non_zero_balances, 3);
    assert!(ledger.snapshots().last_refreshed_at().await?.is_some());

    let (row, source) = ledger.snapshots().find(receivable.id()).await?;
    assert_eq!(source, SnapshotSource::MaterializedView);
    assert_eq!(row.current_balance, dec!(100000));
    assert_eq!(row.total_debits, dec!(100000));
    assert_eq!(row.transaction_count, 1);
    assert!(row.last_transaction_date.is_some());

    let (header, _) = ledger.snapshots().find(assets.id()).await?;
    assert!(header.is_header);
    assert_eq!(header.current_balance, dec!(100000));

    let (row, _) = ledger.snapshots().find(revenue.id()).await?;
    assert_eq!(row.current_balance, dec!(100000));
    assert_eq!(row.normal_balance, DebitOrCredit::Credit);

    let res = ledger.snapshots().find(AccountId::new()).await;
    assert!(matches!(
        res,
        Err(snapshot::error::SnapshotError::AccountNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn view_lags_until_refreshed() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;
    ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(10)))
        .await?;
    ledger.snapshots().refresh().await?;
    ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(5)))
        .await?;

    let (row, _) = ledger.snapshots().find(cash.id()).await?;
    assert_eq!(row.current_balance, dec!(10));
    assert_eq!(ledger.balances().cached_balance(cash.id()).await?, dec!(15));

    let (row, source) = ledger
        .snapshots()
        .find_fresh(cash.id(), Some(Duration::ZERO))
        .await?;
    assert_eq!(source, SnapshotSource::MaterializedView);
    assert_eq!(row.current_balance, dec!(15));
    Ok(())
}

#[tokio::test]
async fn list_applies_filters() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let assets = helpers::create_header(&ledger, AccountType::Asset, None).await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, Some(assets.id())).await?;
    helpers::create_account(&ledger, AccountType::Asset, Some(assets.id())).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;
    ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(7)))
        .await?;
    ledger.snapshots().refresh().await?;

    let listing = ledger
        .snapshots()
        .list(SnapshotFilter {
            account_type: Some(AccountType::Asset),
            ..Default::default()
        })
        .await?;
    assert_eq!(listing.source, SnapshotSource::MaterializedView);
    assert_eq!(listing.rows.len(), 2);
    assert!(listing.rows.iter().all(|r| !r.is_header));

    let listing = ledger
        .snapshots()
        .list(SnapshotFilter {
            account_type: Some(AccountType::Asset),
            include_headers: true,
            non_zero_only: true,
            ..Default::default()
        })
        .await?;
    let ids: Vec<_> = listing.rows.iter().map(|r| r.account_id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&cash.id()));
    assert!(ids.contains(&assets.id()));
    Ok(())
}

#[tokio::test]
async fn reports_for_a_simple_sale() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let receivable = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let revenue = helpers::create_account(&ledger, AccountType::Revenue, None).await?;
    let capital = helpers::create_account(&ledger, AccountType::Equity, None).await?;
    let loan = helpers::create_account(&ledger, AccountType::Liability, None).await?;
    ledger
        .post_journal(helpers::transfer(receivable.id(), revenue.id(), dec!(1000)))
        .await?;
    ledger
        .post_journal(helpers::transfer(receivable.id(), capital.id(), dec!(500)))
        .await?;
    ledger
        .post_journal(helpers::transfer(receivable.id(), loan.id(), dec!(250)))
        .await?;

    let trial = ledger.reports().trial_balance(None).await?;
    assert!(trial.is_balanced);
    assert_eq!(trial.total_debits, dec!(1750));
    assert_eq!(trial.total_credits, dec!(1750));
    assert_eq!(trial.lines.len(), 4);

    let sheet = ledger.reports().balance_sheet(None).await?;
    assert_eq!(sheet.source, ReportSource::Ledger);
    assert_eq!(sheet.assets.total, dec!(1750));
    assert_eq!(sheet.liabilities.total, dec!(250));
    assert_eq!(sheet.net_income, dec!(1000));
    assert_eq!(sheet.total_equity, dec!(1500));
    assert!(sheet.is_balanced);
    assert_eq!(sheet.balance_difference, dec!(0));

    ledger.snapshots().refresh().await?;
    let from_view = ledger.reports().balance_sheet_from_snapshot().await?;
    assert_eq!(
        from_view.source,
        ReportSource::Snapshot(SnapshotSource::MaterializedView)
    );
    assert_eq!(from_view.assets.total, sheet.assets.total);
    assert_eq!(from_view.total_equity, sheet.total_equity);
    assert!(from_view.is_balanced);
    Ok(())
}

#[tokio::test]
async fn accounts_created_after_a_refresh_use_cached_balances() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;
    ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(70)))
        .await?;
    ledger.snapshots().refresh().await?;

    let bank = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    ledger
        .post_journal(helpers::transfer(bank.id(), equity.id(), dec!(5)))
        .await?;

    let (row, source) = ledger.snapshots().find(bank.id()).await?;
    assert_eq!(source, SnapshotSource::CachedAccounts);
    assert_eq!(row.account_id, bank.id());
    assert_eq!(row.current_balance, dec!(5));

    let (row, source) = ledger.snapshots().find(cash.id()).await?;
    assert_eq!(source, SnapshotSource::MaterializedView);
    assert_eq!(row.current_balance, dec!(70));
    Ok(())
}

#[tokio::test]
async fn ensure_recreates_a_dropped_view() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;
    ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(15)))
        .await?;

    sqlx::raw_sql("DROP MATERIALIZED VIEW saldo_account_balances")
        .execute(ledger.pool())
        .await?;
    assert!(ledger.snapshots().last_refreshed_at().await?.is_none());
    let (_, source) = ledger.snapshots().find(cash.id()).await?;
    assert_eq!(source, SnapshotSource::CachedAccounts);

    assert_eq!(ledger.snapshots().ensure().await?, ViewBootstrap::Created);
    let (row, source) = ledger.snapshots().find(cash.id()).await?;
    assert_eq!(source, SnapshotSource::MaterializedView);
    assert_eq!(row.current_balance, dec!(15));

    assert_eq!(ledger.snapshots().ensure().await?, ViewBootstrap::Refreshed);
    Ok(())
}
