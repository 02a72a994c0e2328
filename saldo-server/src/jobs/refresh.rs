use async_trait::async_trait;
use tracing::instrument;

use saldo_ledger::SaldoLedger;

use super::{error::JobError, traits::ScheduledJob};

/// Keeps the account balance view within its refresh interval.
pub struct ViewRefreshJob {
    ledger: SaldoLedger,
}

impl ViewRefreshJob {
    pub fn new(ledger: &SaldoLedger) -> Self {
        Self {
            ledger: ledger.clone(),
        }
    }
}

#[async_trait]
impl ScheduledJob for ViewRefreshJob {
    fn name(&self) -> &'static str {
        "view-refresh"
    }

    #[instrument(name = "saldo_server.jobs.view_refresh", skip(self), err)]
    async fn run(&mut self) -> Result<(), JobError> {
        let refresh = self.ledger.snapshots().refresh().await?;
        tracing::info!(
            accounts = refresh.accounts,
            non_zero_balances = refresh.non_zero_balances,
            duration_ms = refresh.duration_ms,
            "scheduled view refresh complete"
        );
        Ok(())
    }
}
