use anyhow::Context;
use saldo_tracing::TracingConfig;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use std::{path::Path, time::Duration};

use super::db::*;
use crate::app::AppConfig;

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_exec_migrations")]
    pub exec_migrations: bool,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_snapshot_max_staleness")]
    pub snapshot_max_staleness: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            exec_migrations: default_exec_migrations(),
            lock_timeout: default_lock_timeout(),
            snapshot_max_staleness: default_snapshot_max_staleness(),
        }
    }
}

pub struct EnvOverride {
    pub db_con: Option<String>,
}

impl Config {
    pub fn load_config(
        path: Option<impl AsRef<Path>>,
        env_override: EnvOverride,
    ) -> anyhow::Result<Self> {
        let mut config = if let Some(config_path) = path {
            let config_file =
                std::fs::read_to_string(config_path).context("Couldn't read config file")?;
            serde_yaml::from_str(&config_file).context("Couldn't parse config file")?
        } else {
            println!("No config file provided, using default config.");
            Config::default()
        };

        config.apply_env_override(env_override);
        config.validate()?;
        Ok(config)
    }

    fn apply_env_override(&mut self, EnvOverride { db_con }: EnvOverride) {
        if let Some(db_con) = db_con {
            self.db.pg_con = db_con;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.db.pg_con.is_empty() {
            anyhow::bail!("No database connection configured (set PG_CON or db.pg_con)");
        }
        let jobs = &self.app.jobs;
        if jobs.view_refresh.interval.is_zero() || jobs.reconciliation.interval.is_zero() {
            anyhow::bail!("Job intervals must be greater than zero");
        }
        if let Some(quiet_hours) = jobs.reconciliation.quiet_hours {
            quiet_hours.validate().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }
}

fn default_exec_migrations() -> bool {
    true
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_snapshot_max_staleness() -> Duration {
    Duration::from_secs(60)
}
