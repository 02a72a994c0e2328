mod config;

use saldo_ledger::SaldoLedger;

use crate::jobs::Jobs;
pub use config::*;

pub struct SaldoApp {
    ledger: SaldoLedger,
    jobs: Jobs,
}

impl SaldoApp {
    pub fn run(ledger: SaldoLedger, config: AppConfig) -> Self {
        let jobs = Jobs::start(&ledger, config.jobs);
        Self { ledger, jobs }
    }

    pub fn ledger(&self) -> &SaldoLedger {
        &self.ledger
    }

    pub fn jobs(&self) -> &Jobs {
        &self.jobs
    }
}
