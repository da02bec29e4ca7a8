use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AmountOverflow, RunningBalance, Summary, WorkingState, compute_summary};

/// Immutable record of a closed business day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub id: Uuid,
    pub business_date: NaiveDate,
    pub taken_at: DateTime<Utc>,
    pub ledger: WorkingState,
    pub summary: Summary,
    pub opening_balance: RunningBalance,
    pub closing_balance: RunningBalance,
}

impl DailySnapshot {
    /// Close a day: copy the lists, summarize them and carry the balance forward.
    pub fn close(
        business_date: NaiveDate,
        taken_at: DateTime<Utc>,
        ledger: &WorkingState,
        opening_balance: RunningBalance,
    ) -> Result<Self, AmountOverflow> {
        let summary = compute_summary(ledger)?;
        let closing_balance = opening_balance.carry_forward(&summary, taken_at)?;

        Ok(Self {
            id: Uuid::new_v4(),
            business_date,
            taken_at,
            ledger: ledger.clone(),
            summary,
            opening_balance,
            closing_balance,
        })
    }
}
