use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maker/taker fee schedule for the paper-fill simulator. Rates may be negative (rebates).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

impl FeeSchedule {
    pub fn new(maker_rate: Decimal, taker_rate: Decimal) -> Self {
        Self {
            maker_rate,
            taker_rate,
        }
    }

    /// `fee = notional * rate`. The pipeline only simulates market fills, so this always
    /// applies the taker rate; `maker_rate` is retained for schedules that price resting
    /// orders differently.
    pub fn taker_fee(&self, notional: Decimal) -> Decimal {
        notional * self.taker_rate
    }

    pub fn maker_fee(&self, notional: Decimal) -> Decimal {
        notional * self.maker_rate
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            maker_rate: dec!(0.0002),
            taker_rate: dec!(0.0006),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn taker_fee_scales_with_notional() {
        let fees = FeeSchedule::new(dec!(0.0002), dec!(0.0006));
        assert_eq!(fees.taker_fee(dec!(1000)), dec!(0.6));
    }

    #[test]
    fn negative_rate_is_a_rebate() {
        let fees = FeeSchedule::new(dec!(-0.0001), dec!(-0.0001));
        assert_eq!(fees.maker_fee(dec!(1000)), dec!(-0.1));
    }
}
