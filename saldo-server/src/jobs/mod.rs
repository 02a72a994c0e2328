mod config;
pub mod error;
mod reconcile;
mod refresh;
mod traits;

use tokio::time::{Instant, MissedTickBehavior};

use std::time::Duration;

use saldo_ledger::SaldoLedger;

pub use config::*;
pub use reconcile::*;
pub use refresh::*;
pub use traits::*;

/// Scheduled background jobs. Dropping `Jobs` aborts them.
pub struct Jobs {
    handles: Vec<JobHandle>,
}

impl Jobs {
    pub fn start(ledger: &SaldoLedger, config: JobsConfig) -> Self {
        let mut handles = Vec::new();
        let refresh = config.view_refresh;
        if refresh.enabled {
            handles.push(spawn_job(
                ViewRefreshJob::new(ledger),
                Schedule {
                    interval: refresh.interval,
                    run_on_startup: refresh.run_on_startup,
                    max_execution_time: None,
                },
            ));
        }
        let reconciliation = config.reconciliation;
        if reconciliation.enabled {
            let schedule = Schedule {
                interval: reconciliation.interval,
                run_on_startup: reconciliation.run_on_startup,
                max_execution_time: Some(reconciliation.max_execution_time),
            };
            handles.push(spawn_job(
                ReconciliationJob::new(ledger, reconciliation),
                schedule,
            ));
        }
        tracing::info!(jobs = handles.len(), "scheduled jobs started");
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Schedule {
    interval: Duration,
    run_on_startup: bool,
    max_execution_time: Option<Duration>,
}

impl Schedule {
    fn first_tick(&self, now: Instant) -> Instant {
        if self.run_on_startup {
            now
        } else {
            now + self.interval
        }
    }
}

fn spawn_job<J: ScheduledJob>(mut job: J, schedule: Schedule) -> JobHandle {
    let handle = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval_at(schedule.first_tick(Instant::now()), schedule.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            run_once(&mut job, schedule.max_execution_time).await;
        }
    });
    JobHandle(Some(handle))
}

async fn run_once<J: ScheduledJob>(job: &mut J, max_execution_time: Option<Duration>) {
    let name = job.name();
    let result = match max_execution_time {
        Some(limit) => match tokio::time::timeout(limit, job.run()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(job = name, ?limit, "job exceeded its max execution time");
                return;
            }
        },
        None => job.run().await,
    };
    if let Err(e) = result {
        tracing::error!(job = name, error = %e, "job failed");
    }
}

struct JobHandle(Option<tokio::task::JoinHandle<()>>);
impl Drop for JobHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}
