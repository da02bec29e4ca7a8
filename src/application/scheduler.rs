use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{DailyTrigger, NextRun};
use crate::storage::KeyValueStore;

use super::{Clock, CycleOutcome, LedgerService, Notifier};

/// What one scheduler evaluation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Waited until this instant
    Slept(DateTime<FixedOffset>),
    Closed(CycleOutcome),
    /// The close attempt failed; the next step waits out the retry interval.
    Failed(String),
}

/// Fires the daily close once per day at a fixed wall-clock time.
pub struct DailyScheduler<S, N, C> {
    service: Arc<LedgerService<S, N>>,
    clock: Arc<C>,
    trigger: DailyTrigger,
    retry_interval: Duration,
    retry_at: Option<DateTime<FixedOffset>>,
}

impl<S, N, C> DailyScheduler<S, N, C>
where
    S: KeyValueStore + 'static,
    N: Notifier + 'static,
    C: Clock + 'static,
{
    pub fn new(service: Arc<LedgerService<S, N>>, clock: Arc<C>, trigger: DailyTrigger) -> Self {
        Self {
            service,
            clock,
            trigger,
            retry_interval: Duration::minutes(10),
            retry_at: None,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Evaluate the trigger once: either wait for the next occurrence or run
    /// the close now.
    pub async fn step(&mut self) -> Step {
        if let Some(at) = self.retry_at.take() {
            self.clock.sleep_until(at).await;
            return Step::Slept(at);
        }

        let now = self.clock.now();
        let last_run = match self.service.last_cycle_date().await {
            Ok(last_run) => last_run,
            Err(e) => return self.failed(now, e.to_string()),
        };

        match self.trigger.next_run(now, last_run) {
            NextRun::At(at) => {
                debug!(%at, "waiting for daily close");
                self.clock.sleep_until(at).await;
                Step::Slept(at)
            }
            NextRun::Now => match self.service.run_daily_cycle(now).await {
                Ok(outcome) => Step::Closed(outcome),
                Err(e) => self.failed(now, e.to_string()),
            },
        }
    }

    fn failed(&mut self, now: DateTime<FixedOffset>, reason: String) -> Step {
        let retry_at = now + self.retry_interval;
        warn!(error = %reason, %retry_at, "daily close failed, will retry");
        self.retry_at = Some(retry_at);
        Step::Failed(reason)
    }

    pub async fn run(mut self) {
        info!(trigger = %self.trigger, "daily close scheduler started");
        loop {
            self.step().await;
        }
    }

    /// Run the scheduler on its own task.
    pub fn spawn(self) -> ScheduleHandle {
        ScheduleHandle {
            task: tokio::spawn(self.run()),
        }
    }
}

/// Handle to a spawned scheduler. Dropping it leaves the task running.
#[derive(Debug)]
pub struct ScheduleHandle {
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Stop the scheduler at its next suspension point.
    pub async fn cancel(self) {
        self.task.abort();
        let _ = self.task.await;
        info!("daily close scheduler stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
