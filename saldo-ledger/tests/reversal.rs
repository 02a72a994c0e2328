mod helpers;

use rust_decimal_macros::dec;

use saldo_ledger::{journal::error::JournalError, journal::*, *};

#[tokio::test]
async fn reversal_restores_balances() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let assets = helpers::create_header(&ledger, AccountType::Asset, None).await?;
    let receivable = helpers::create_account(&ledger, AccountType::Asset, Some(assets.id())).await?;
    let revenue = helpers::create_account(&ledger, AccountType::Revenue, None).await?;

    ledger
        .post_journal(helpers::transfer(receivable.id(), revenue.id(), dec!(700)))
        .await?;
    let before_receivable = ledger.balances().cached_balance(receivable.id()).await?;
    let before_assets = ledger.balances().cached_balance(assets.id()).await?;

    let entry = ledger
        .post_journal(helpers::transfer(receivable.id(), revenue.id(), dec!(100000)))
        .await?;
    assert_eq!(
        ledger.balances().cached_balance(receivable.id()).await?,
        dec!(100700)
    );

    let reversal = ledger
        .journals()
        .reverse(entry.id(), "Cancel invoice", None)
        .await?;
    assert_eq!(reversal.status(), JournalStatus::Posted);
    assert_eq!(reversal.values().reverses_entry_id, Some(entry.id()));
    assert_eq!(
        reversal.values().reference,
        JournalReference::reversal_of(entry.id())
    );
    assert_eq!(reversal.lines()[0].credit_amount, dec!(100000));
    assert_eq!(reversal.lines()[1].debit_amount, dec!(100000));

    let original = ledger.journals().find_by_id(entry.id()).await?;
    assert_eq!(original.status(), JournalStatus::Reversed);
    assert_eq!(original.values().reversed_by_entry_id, Some(reversal.id()));
    assert_eq!(original.lines()[0].debit_amount, dec!(100000));

    assert_eq!(
        ledger.balances().cached_balance(receivable.id()).await?,
        before_receivable
    );
    assert_eq!(
        ledger.balances().cached_balance(assets.id()).await?,
        before_assets
    );
    assert_eq!(
        ledger
            .balances()
            .account_balance(revenue.id(), None)
            .await?
            .balance,
        dec!(700)
    );
    Ok(())
}

#[tokio::test]
async fn only_posted_entries_can_be_reversed() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;

    let entry = ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(10)))
        .await?;
    ledger.journals().reverse(entry.id(), "", None).await?;
    let res = ledger.journals().reverse(entry.id(), "again", None).await;
    assert!(matches!(
        res,
        Err(JournalError::InvalidStatusTransition {
            from: JournalStatus::Reversed,
            to: JournalStatus::Reversed,
            ..
        })
    ));

    let draft = ledger
        .journals()
        .create_draft(helpers::transfer(cash.id(), equity.id(), dec!(10)))
        .await?;
    let res = ledger.journals().reverse(draft.id(), "nope", None).await;
    assert!(matches!(
        res,
        Err(JournalError::InvalidStatusTransition {
            from: JournalStatus::Draft,
            ..
        })
    ));

    let res = ledger
        .journals()
        .reverse(JournalEntryId::new(), "missing", None)
        .await;
    assert!(matches!(res, Err(JournalError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn default_reversal_description_names_the_original() -> anyhow::Result<()> {
    let ledger = helpers::init_ledger().await?;
    let cash = helpers::create_account(&ledger, AccountType::Asset, None).await?;
    let equity = helpers::create_account(&ledger, AccountType::Equity, None).await?;
    let entry = ledger
        .post_journal(helpers::transfer(cash.id(), equity.id(), dec!(10)))
        .await?;
    let reversal = ledger.journals().reverse(entry.id(), " ", None).await?;
    assert_eq!(
        reversal.values().description,
        format!("Reversal of {}", entry.entry_number())
    );
    Ok(())
}
