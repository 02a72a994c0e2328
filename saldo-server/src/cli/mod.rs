pub mod config;
mod db;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use std::{fs, path::PathBuf};

use saldo_ledger::{SaldoLedger, SaldoLedgerConfig};

use self::config::{Config, EnvOverride};
use crate::app::SaldoApp;

#[derive(Parser)]
#[clap(long_about = None)]
struct Cli {
    #[clap(short, long, env = "SALDO_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
    #[clap(
        long,
        env = "SALDO_HOME",
        default_value = ".saldo",
        value_name = "DIRECTORY"
    )]
    saldo_home: String,
    #[clap(long, env = "PG_CON")]
    pg_con: Option<String>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Boot the ledger and run the scheduled jobs until interrupted (default)
    Run,
    /// Apply pending migrations and bootstrap the account balance view
    Migrate,
    /// Print the migration log
    MigrationStatus,
    /// Compare cached balances against the journal ledger
    Reconcile {
        /// Repair any drift that is found
        #[clap(long)]
        fix: bool,
    },
    /// Rebuild every cached balance from the journal ledger
    InitialSync,
    /// Refresh the account balance view
    RefreshView,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_config(cli.config, EnvOverride { db_con: cli.pg_con })?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_cmd(&cli.saldo_home, config).await?,
        Command::Migrate => {
            let ledger = init_ledger(&config, false).await?;
            print_json(&ledger.migrator().run().await?)?;
            ledger.snapshots().ensure().await?;
        }
        Command::MigrationStatus => {
            let ledger = init_ledger(&config, false).await?;
            print_json(&ledger.migrator().migration_status().await?)?;
        }
        Command::Reconcile { fix } => {
            let ledger = init_ledger(&config, false).await?;
            if fix {
                print_json(&ledger.reconciliation().fix_discrepancies().await?)?;
            } else {
                print_json(&ledger.reconciliation().detect_discrepancies().await?)?;
            }
        }
        Command::InitialSync => {
            let ledger = init_ledger(&config, false).await?;
            print_json(&ledger.reconciliation().run_initial_sync().await?)?;
        }
        Command::RefreshView => {
            let ledger = init_ledger(&config, false).await?;
            print_json(&ledger.snapshots().refresh().await?)?;
        }
    }

    Ok(())
}

async fn run_cmd(saldo_home: &str, config: Config) -> anyhow::Result<()> {
    saldo_tracing::init_tracer(config.tracing.clone())?;
    store_server_pid(saldo_home, std::process::id())?;
    let ledger = init_ledger(&config, config.ledger.exec_migrations).await?;
    let app = SaldoApp::run(ledger, config.app);
    tracing::info!(jobs = app.jobs().len(), "saldo server running");

    tokio::signal::ctrl_c()
        .await
        .context("Waiting for shutdown signal")?;
    tracing::info!("shutting down");
    drop(app);
    saldo_tracing::shutdown_tracer();
    let _ = fs::remove_file(pid_file(saldo_home));
    Ok(())
}

async fn init_ledger(config: &Config, exec_migrations: bool) -> anyhow::Result<SaldoLedger> {
    let pool = db::init_pool(&config.db).await?;
    let ledger_config = SaldoLedgerConfig::builder()
        .pool(pool)
        .exec_migrations(exec_migrations)
        .lock_timeout(config.ledger.lock_timeout)
        .snapshot_max_staleness(config.ledger.snapshot_max_staleness)
        .build()?;
    Ok(SaldoLedger::init(ledger_config).await?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn store_server_pid(saldo_home: &str, pid: u32) -> anyhow::Result<()> {
    create_saldo_dir(saldo_home)?;
    let _ = fs::remove_file(pid_file(saldo_home));
    fs::write(pid_file(saldo_home), pid.to_string()).context("Writing PID file")?;
    Ok(())
}

fn pid_file(saldo_home: &str) -> String {
    format!("{saldo_home}/server-pid")
}

fn create_saldo_dir(saldo_home: &str) -> anyhow::Result<()> {
    fs::create_dir_all(saldo_home).context("Creating saldo home directory")?;
    Ok(())
}
