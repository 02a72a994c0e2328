#![allow(dead_code)]
use rand::distr::{Alphanumeric, SampleString};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use std::str::FromStr;

use saldo_ledger::{account::*, journal::*, *};

/// A pool whose `search_path` points at a fresh schema, so every test starts
/// from an empty database.
pub async fn init_pool() -> anyhow::Result<sqlx::PgPool> {
    let pg_host = std::env::var("PG_HOST").unwrap_or("localhost".to_string());
    let pg_con = format!("postgres://user:password@{pg_host}:5432/pg");
    let schema = format!(
        "saldo_test_{}",
        Alphanumeric
            .sample_string(&mut rand::rng(), 16)
            .to_lowercase()
    );

    let admin = sqlx::PgPool::connect(&pg_con).await?;
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await?;
    admin.close().await;

    let options = PgConnectOptions::from_str(&pg_con)?.options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn init_ledger() -> anyhow::Result<SaldoLedger> {
    let pool = init_pool().await?;
    let config = SaldoLedgerConfig::builder()
        .pool(pool)
        .exec_migrations(true)
        .build()?;
    Ok(SaldoLedger::init(config).await?)
}

pub async fn init_ledger_with_lock_timeout(
    lock_timeout: std::time::Duration,
) -> anyhow::Result<SaldoLedger> {
    let pool = init_pool().await?;
    let config = SaldoLedgerConfig::builder()
        .pool(pool)
        .exec_migrations(true)
        .lock_timeout(lock_timeout)
        .build()?;
    Ok(SaldoLedger::init(config).await?)
}

pub fn random_code(prefix: &str) -> String {
    format!(
        "{prefix}-{}",
        Alphanumeric.sample_string(&mut rand::rng(), 8)
    )
}

pub async fn create_account(
    ledger: &SaldoLedger,
    account_type: AccountType,
    parent_id: Option<AccountId>,
) -> anyhow::Result<Account> {
    create(ledger, account_type, parent_id, false).await
}

pub async fn create_header(
    ledger: &SaldoLedger,
    account_type: AccountType,
    parent_id: Option<AccountId>,
) -> anyhow::Result<Account> {
    create(ledger, account_type, parent_id, true).await
}

async fn create(
    ledger: &SaldoLedger,
    account_type: AccountType,
    parent_id: Option<AccountId>,
    is_header: bool,
) -> anyhow::Result<Account> {
    let code = random_code(&account_type.to_string());
    let mut builder = NewAccount::builder();
    builder
        .name(format!("Test Account {code}"))
        .code(code)
        .account_type(account_type)
        .is_header(is_header);
    if let Some(parent_id) = parent_id {
        builder.parent_id(parent_id);
    }
    Ok(ledger.accounts().create(builder.build()?).await?)
}

/// A two-line entry debiting `debit` and crediting `credit` by `amount`.
pub fn transfer(debit: AccountId, credit: AccountId, amount: Decimal) -> NewJournalEntry {
    NewJournalEntry::builder()
        .description(format!("Transfer {amount}"))
        .add_line(NewJournalLine::debit(debit, amount))
        .add_line(NewJournalLine::credit(credit, amount))
        .build()
        .unwrap()
}
