use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use saldo_ledger::{
    reconciliation::{AccountDiscrepancy, DriftTracker},
    SaldoLedger,
};

use super::{config::ReconciliationJobConfig, error::JobError, traits::ScheduledJob};

/// Periodic drift check. Drift that outlives a posting is escalated through the
/// tracker; with `auto_fix` the drift is repaired in the same run.
pub struct ReconciliationJob {
    ledger: SaldoLedger,
    config: ReconciliationJobConfig,
    tracker: DriftTracker,
}

impl ReconciliationJob {
    pub fn new(ledger: &SaldoLedger, config: ReconciliationJobConfig) -> Self {
        Self {
            ledger: ledger.clone(),
            config,
            tracker: DriftTracker::new(),
        }
    }

    fn alert_on_threshold(&self, discrepancies: &[AccountDiscrepancy]) -> usize {
        let Some(threshold) = self.config.alert_threshold else {
            return 0;
        };
        let mut alerts = 0;
        for d in discrepancies.iter().filter(|d| d.difference.abs() > threshold) {
            alerts += 1;
            tracing::error!(
                account_id = %d.account_id,
                account_code = %d.account_code,
                difference = %d.difference,
                %threshold,
                "balance drift above alert threshold"
            );
        }
        alerts
    }
}

#[async_trait]
impl ScheduledJob for ReconciliationJob {
    fn name(&self) -> &'static str {
        "reconciliation"
    }

    #[instrument(
        name = "saldo_server.jobs.reconciliation",
        skip(self),
        fields(found, escalated, alerts),
        err
    )]
    async fn run(&mut self) -> Result<(), JobError> {
        let now = Utc::now();
        if self.config.is_quiet_at(now) {
            tracing::debug!("inside quiet hours, skipping reconciliation");
            return Ok(());
        }

        let reconciliation = self.ledger.reconciliation();
        let discrepancies = reconciliation.detect_discrepancies().await?;
        let escalated = self.tracker.observe(&discrepancies, now).len();
        let alerts = self.alert_on_threshold(&discrepancies);

        let span = tracing::Span::current();
        span.record("found", discrepancies.len());
        span.record("escalated", escalated);
        span.record("alerts", alerts);

        if !discrepancies.is_empty() && self.config.auto_fix {
            let report = reconciliation.fix_discrepancies().await?;
            tracing::info!(
                leaves_fixed = report.leaves_fixed,
                headers_recomputed = report.headers_recomputed,
                "drift repaired"
            );
        }
        Ok(())
    }
}
