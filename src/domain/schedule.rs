use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Wall-clock time of day at which the daily close fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTrigger {
    pub at: NaiveTime,
}

/// What the scheduler should do after evaluating the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRun {
    /// The trigger has passed today and the day is still open.
    Now,
    /// Sleep until this instant, then evaluate again.
    At(DateTime<FixedOffset>),
}

impl Default for DailyTrigger {
    fn default() -> Self {
        Self {
            at: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
        }
    }
}

impl DailyTrigger {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// Parse "HH:MM" or "HH:MM:SS".
    pub fn parse(s: &str) -> Option<Self> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
            .ok()
            .map(Self::new)
    }

    /// The trigger instant on `date`, in the same offset as `now`.
    pub fn occurrence_on(&self, date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
        let local = date.and_time(self.at);
        let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, offset)
    }

    /// True once the trigger time has passed on a day that hasn't been closed.
    pub fn is_due(&self, now: DateTime<FixedOffset>, last_run: Option<NaiveDate>) -> bool {
        let today = now.date_naive();
        last_run.is_none_or(|last| last < today) && now.time() >= self.at
    }

    pub fn next_run(&self, now: DateTime<FixedOffset>, last_run: Option<NaiveDate>) -> NextRun {
        if self.is_due(now, last_run) {
            return NextRun::Now;
        }

        let today = now.date_naive();
        let closed_today = last_run.is_some_and(|last| last >= today);

        // Still before today's trigger and today is open: fire later today.
        if now.time() < self.at && !closed_today {
            return NextRun::At(self.occurrence_on(today, *now.offset()));
        }

        let tomorrow = today.succ_opt().unwrap_or(today);
        NextRun::At(self.occurrence_on(tomorrow, *now.offset()))
    }
}

impl std::fmt::Display for DailyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.at.format("%H:%M"))
    }
}
