//! Paper-fill simulator: the only component that touches `balance`. Tracks a multi-coin
//! book with a pluggable fee schedule.

use crate::domain::errors::PipelineError;
use crate::domain::trading::fees::FeeSchedule;
use crate::domain::trading::types::{Direction, Position, Trade};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct SimulatorConfig {
    pub starting_balance: Decimal,
    pub fees: FeeSchedule,
    /// Position cap as a fraction of balance, before the 10x leverage assumption.
    pub max_position_size_pct: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            starting_balance: dec!(10000),
            fees: FeeSchedule::default(),
            max_position_size_pct: 0.25,
        }
    }
}

fn unrealized_pnl(position: &Position, price: Decimal) -> Decimal {
    match position.side {
        Direction::Long => (price - position.entry_price) * position.size,
        Direction::Short => (position.entry_price - price) * position.size,
    }
}

/// Owns `balance` and every open `Position`; everything else (trailing stops, plan
/// sizing) is layered on top by `PositionManager`.
#[derive(Debug)]
pub struct PaperFillSimulator {
    config: SimulatorConfig,
    balance: Decimal,
    positions: HashMap<String, Position>,
    trade_history: Vec<Trade>,
    total_fees: Decimal,
}

impl PaperFillSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            balance: config.starting_balance,
            config,
            positions: HashMap::new(),
            trade_history: Vec::new(),
            total_fees: Decimal::ZERO,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    pub fn trade_history(&self) -> &[Trade] {
        &self.trade_history
    }

    pub fn position(&self, coin: &str) -> Option<&Position> {
        self.positions.get(coin)
    }

    pub fn has_position(&self, coin: &str) -> bool {
        self.positions.contains_key(coin)
    }

    /// Refuses on an existing position, insufficient margin, or a notional over
    /// `balance * max_position_size_pct * 10` (10x leverage assumption).
    pub fn open(
        &mut self,
        coin: &str,
        side: Direction,
        size: Decimal,
        price: Decimal,
        entry_time: i64,
    ) -> Result<Position, PipelineError> {
        if self.positions.contains_key(coin) {
            return Err(PipelineError::InvalidPositionState {
                coin: coin.to_string(),
                reason: "position already open".to_string(),
            });
        }

        let notional = size * price;
        let fee = self.config.fees.taker_fee(notional);
        let required_margin = notional * Decimal::new(1, 1);
        let total_required = required_margin + fee.max(Decimal::ZERO);
        if total_required > self.balance {
            return Err(PipelineError::InsufficientBalance {
                coin: coin.to_string(),
                need: total_required,
                available: self.balance,
            });
        }

        let max_notional = self.balance
            * Decimal::from_f64(self.config.max_position_size_pct).unwrap_or_default()
            * Decimal::TEN;
        if notional > max_notional {
            return Err(PipelineError::PositionTooLarge {
                coin: coin.to_string(),
                notional,
                cap: max_notional,
            });
        }

        self.balance -= fee.max(Decimal::ZERO);
        if fee < Decimal::ZERO {
            self.balance -= fee;
        }
        self.total_fees += fee;

        let position = Position {
            coin: coin.to_string(),
            side,
            size,
            entry_price: price,
            entry_time,
        };
        info!(coin, side = %side, %size, %price, "opened position");
        self.positions.insert(coin.to_string(), position.clone());
        Ok(position)
    }

    /// `net_pnl = raw_pnl - fee` where `raw_pnl` is signed by side.
    pub fn close(
        &mut self,
        coin: &str,
        price: Decimal,
        exit_time: i64,
        exit_reason: impl Into<String>,
    ) -> Result<Trade, PipelineError> {
        let position = self
            .positions
            .remove(coin)
            .ok_or_else(|| PipelineError::InvalidPositionState {
                coin: coin.to_string(),
                reason: "no open position".to_string(),
            })?;

        let raw_pnl = unrealized_pnl(&position, price);
        let notional = position.size * price;
        let fee = self.config.fees.taker_fee(notional);
        let net_pnl = raw_pnl - fee;

        let trade = Trade {
            coin: coin.to_string(),
            side: position.side,
            size: position.size,
            entry_price: position.entry_price,
            exit_price: price,
            entry_time: position.entry_time,
            exit_time,
            pnl: net_pnl,
            fees_paid: fee,
            exit_reason: exit_reason.into(),
        };

        self.balance += net_pnl;
        self.total_fees += fee;
        info!(coin, %net_pnl, "closed position");
        self.trade_history.push(trade.clone());
        Ok(trade)
    }

    /// `balance + sum(unrealised_pnl)` over every coin with both an open position and a
    /// current price; positions missing a price are carried at their last marked value.
    pub fn equity(&self, prices: &HashMap<String, Decimal>) -> Decimal {
        let unrealized: Decimal = self
            .positions
            .values()
            .filter_map(|p| prices.get(&p.coin).map(|price| unrealized_pnl(p, *price)))
            .sum();
        self.balance + unrealized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sim() -> PaperFillSimulator {
        PaperFillSimulator::new(SimulatorConfig {
            starting_balance: dec!(10000),
            fees: FeeSchedule::new(dec!(0.0002), dec!(0.0006)),
            max_position_size_pct: 0.25,
        })
    }

    #[test]
    fn open_then_close_at_same_price_loses_only_entry_and_exit_fees() {
        let mut s = sim();
        let opened = s.open("BTC", Direction::Long, dec!(1), dec!(100), 0).unwrap();
        let entry_fee = opened.size * opened.entry_price * dec!(0.0006);
        let trade = s.close("BTC", dec!(100), 1, "manual").unwrap();
        assert_eq!(trade.pnl, -entry_fee);
        assert_eq!(s.total_fees(), entry_fee * dec!(2));
    }

    #[test]
    fn cannot_open_twice_for_same_coin() {
        let mut s = sim();
        s.open("BTC", Direction::Long, dec!(1), dec!(100), 0).unwrap();
        let err = s.open("BTC", Direction::Long, dec!(1), dec!(100), 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPositionState { .. }));
    }

    #[test]
    fn refuses_when_margin_exceeds_balance() {
        let mut s = sim();
        let err = s.open("BTC", Direction::Long, dec!(1000), dec!(100), 0).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientBalance { .. }));
    }

    #[test]
    fn refuses_position_over_max_notional_cap() {
        let mut s = sim();
        // balance*0.25*10 = 25000 cap; size*price = 30000 notional exceeds it even though
        // margin (3000) alone would have been affordable.
        let err = s.open("BTC", Direction::Long, dec!(300), dec!(100), 0).unwrap_err();
        assert!(matches!(err, PipelineError::PositionTooLarge { .. }));
    }

    #[test]
    fn short_profits_when_price_falls() {
        let mut s = sim();
        s.open("BTC", Direction::Short, dec!(1), dec!(100), 0).unwrap();
        let trade = s.close("BTC", dec!(90), 1, "take_profit").unwrap();
        assert!(trade.pnl > Decimal::ZERO);
    }

    #[test]
    fn equity_includes_unrealized_pnl_of_open_position() {
        let mut s = sim();
        s.open("BTC", Direction::Long, dec!(1), dec!(100), 0).unwrap();
        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(110));
        assert!(s.equity(&prices) > s.balance());
    }
}
