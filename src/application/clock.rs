//! Clock collaborator: wall-clock time and waiting for a wall-clock instant.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, FixedOffset, Local};

pub trait Clock: Send + Sync {
    /// Current local time, with its UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Resolve once `deadline` has been reached.
    fn sleep_until(&self, deadline: DateTime<FixedOffset>) -> impl Future<Output = ()> + Send;
}

/// Host local time and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    async fn sleep_until(&self, deadline: DateTime<FixedOffset>) {
        let wait = (deadline - self.now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
    }
}

/// Clock that only moves when told to. Sleeping jumps straight to the deadline,
/// which makes scheduler runs deterministic.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> MutexGuard<'_, DateTime<FixedOffset>> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.lock()
    }

    async fn sleep_until(&self, deadline: DateTime<FixedOffset>) {
        {
            let mut now = self.lock();
            if *now < deadline {
                *now = deadline;
            }
        }
        tokio::task::yield_now().await;
    }
}
