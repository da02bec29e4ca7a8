use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AmountOverflow, Cents, Summary, add_cents};

/// Cumulative cash and transfer position carried across daily closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    pub cash_cents: Cents,
    pub transfer_cents: Cents,
    pub last_updated: Option<DateTime<Utc>>,
}

impl RunningBalance {
    /// Add one day's net movement to the carried balance.
    pub fn carry_forward(
        &self,
        summary: &Summary,
        at: DateTime<Utc>,
    ) -> Result<Self, AmountOverflow> {
        let cash_cents = add_cents(self.cash_cents, summary.balance_cash)?;
        let transfer_cents = add_cents(self.transfer_cents, summary.balance_transfer)?;
        add_cents(cash_cents, transfer_cents)?;

        Ok(Self {
            cash_cents,
            transfer_cents,
            last_updated: Some(at),
        })
    }

    pub fn total_cents(&self) -> Cents {
        self.cash_cents + self.transfer_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(balance_cash: Cents, balance_transfer: Cents) -> Summary {
        Summary {
            balance_cash,
            balance_transfer,
            ..Summary::default()
        }
    }

    #[test]
    fn test_carry_forward_adds_day_balances() {
        let now = Utc::now();
        let opening = RunningBalance {
            cash_cents: 1000,
            transfer_cents: -200,
            last_updated: None,
        };

        let closing = opening.carry_forward(&day(10, 95), now).unwrap();

        assert_eq!(closing.cash_cents, 1010);
        assert_eq!(closing.transfer_cents, -105);
        assert_eq!(closing.last_updated, Some(now));
        assert_eq!(closing.total_cents(), 905);
    }

    #[test]
    fn test_carry_forward_accumulates_over_many_days() {
        let now = Utc::now();
        let days = [day(10, 95), day(-40, 0), day(300, -150)];

        let balance = days
            .iter()
            .try_fold(RunningBalance::default(), |b, s| b.carry_forward(s, now))
            .unwrap();

        assert_eq!(balance.cash_cents, 270);
        assert_eq!(balance.transfer_cents, -55);
    }

    #[test]
    fn test_carry_forward_out_of_range() {
        let opening = RunningBalance {
            cash_cents: Cents::MAX - 5,
            transfer_cents: 0,
            last_updated: None,
        };

        assert_eq!(
            opening.carry_forward(&day(10, 0), Utc::now()),
            Err(AmountOverflow)
        );
    }
}
