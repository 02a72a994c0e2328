use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use std::time::Duration;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub view_refresh: ViewRefreshJobConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationJobConfig,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewRefreshJobConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_refresh_interval")]
    pub interval: Duration,
    #[serde(default = "default_enabled")]
    pub run_on_startup: bool,
}

impl Default for ViewRefreshJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_refresh_interval(),
            run_on_startup: true,
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconciliationJobConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_reconciliation_interval")]
    pub interval: Duration,
    /// Repair drift as soon as it is found instead of only reporting it.
    #[serde(default)]
    pub auto_fix: bool,
    #[serde(default = "default_enabled")]
    pub run_on_startup: bool,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
    /// Discrepancies larger than this are logged at ERROR.
    #[serde(default)]
    pub alert_threshold: Option<Decimal>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_max_execution_time")]
    pub max_execution_time: Duration,
}

impl Default for ReconciliationJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_reconciliation_interval(),
            auto_fix: false,
            run_on_startup: true,
            quiet_hours: None,
            alert_threshold: None,
            max_execution_time: default_max_execution_time(),
        }
    }
}

impl ReconciliationJobConfig {
    pub fn is_quiet_at(&self, now: DateTime<Utc>) -> bool {
        self.quiet_hours
            .as_ref()
            .is_some_and(|q| q.contains(now.hour()))
    }
}

/// Window of UTC hours, `start` inclusive and `end` exclusive. Wraps past midnight
/// when `start > end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: u32,
    pub end: u32,
}

impl QuietHours {
    pub fn contains(&self, hour: u32) -> bool {
        match self.start.cmp(&self.end) {
            std::cmp::Ordering::Equal => false,
            std::cmp::Ordering::Less => hour >= self.start && hour < self.end,
            std::cmp::Ordering::Greater => hour >= self.start || hour < self.end,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start > 23 || self.end > 23 {
            return Err(format!(
                "quiet hours must be between 0 and 23, got {}..{}",
                self.start, self.end
            ));
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_reconciliation_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_max_execution_time() -> Duration {
    Duration::from_secs(10 * 60)
}
