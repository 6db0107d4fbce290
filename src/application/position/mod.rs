//! Managed positions and trailing stops, layered over the paper-fill simulator. Handles
//! both LONG and SHORT with a single `ManagedPosition::extreme_price` field that tracks
//! the peak for a long and the trough for a short.

pub mod simulator;

pub use simulator::{PaperFillSimulator, SimulatorConfig};

use crate::domain::errors::PipelineError;
use crate::domain::trading::types::{Direction, ManagedPosition, Trade, TradeAction, TradePlan};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;

impl ManagedPosition {
    pub fn open(
        position: crate::domain::trading::types::Position,
        stop_loss: Decimal,
        take_profit: Decimal,
        trail_activation: Decimal,
        trail_distance_pct: f64,
    ) -> Self {
        let entry_price = position.entry_price;
        Self {
            position,
            stop_loss,
            take_profit,
            trail_activation,
            trail_distance_pct,
            trailing_active: false,
            trailing_stop: Decimal::ZERO,
            extreme_price: entry_price,
        }
    }

    pub fn coin(&self) -> &str {
        &self.position.coin
    }

    pub fn is_long(&self) -> bool {
        self.position.side == Direction::Long
    }

    /// Tracks the running extreme price, arms trailing once `trail_activation` is
    /// crossed, then ratchets `trailing_stop`. Once active, `trailing_stop` only moves
    /// in the favourable direction.
    pub fn update_price(&mut self, current_price: Decimal) {
        let trail_distance =
            current_price * Decimal::from_f64(self.trail_distance_pct / 100.0).unwrap_or_default();

        if self.is_long() {
            if current_price > self.extreme_price {
                self.extreme_price = current_price;
            }
            if !self.trailing_active && current_price >= self.trail_activation {
                self.trailing_active = true;
            }
            if self.trailing_active {
                let candidate = self.extreme_price - trail_distance;
                if candidate > self.trailing_stop {
                    self.trailing_stop = candidate;
                }
            }
        } else {
            if current_price < self.extreme_price {
                self.extreme_price = current_price;
            }
            if !self.trailing_active && current_price <= self.trail_activation {
                self.trailing_active = true;
            }
            if self.trailing_active {
                let candidate = self.extreme_price + trail_distance;
                if self.trailing_stop == Decimal::ZERO || candidate < self.trailing_stop {
                    self.trailing_stop = candidate;
                }
            }
        }
    }

    pub fn active_stop(&self) -> Decimal {
        if self.trailing_active {
            self.trailing_stop
        } else {
            self.stop_loss
        }
    }

    /// Checks whether the current price has triggered a stop or target. `None` means hold.
    pub fn check_exit(&self, current_price: Decimal) -> Option<&'static str> {
        if self.is_long() {
            if current_price <= self.active_stop() {
                return Some(if self.trailing_active { "trailing_stop" } else { "stop_loss" });
            }
            if current_price >= self.take_profit {
                return Some("take_profit");
            }
        } else {
            if current_price >= self.active_stop() {
                return Some(if self.trailing_active { "trailing_stop" } else { "stop_loss" });
            }
            if current_price <= self.take_profit {
                return Some("take_profit");
            }
        }
        None
    }
}

/// Coordinates the simulator with trailing-stop bookkeeping. Owns the set of
/// `ManagedPosition`s; the simulator owns balance and the raw `Position`/`Trade` ledger.
pub struct PositionManager {
    simulator: PaperFillSimulator,
    managed: HashMap<String, ManagedPosition>,
}

impl PositionManager {
    pub fn new(simulator: PaperFillSimulator) -> Self {
        Self {
            simulator,
            managed: HashMap::new(),
        }
    }

    pub fn simulator(&self) -> &PaperFillSimulator {
        &self.simulator
    }

    pub fn has_position(&self, coin: &str) -> bool {
        self.managed.contains_key(coin)
    }

    pub fn position(&self, coin: &str) -> Option<&ManagedPosition> {
        self.managed.get(coin)
    }

    pub fn open_positions(&self) -> &HashMap<String, ManagedPosition> {
        &self.managed
    }

    pub fn position_count(&self) -> usize {
        self.managed.len()
    }

    /// Immutable snapshot of every open position, keyed by coin, for handing to the
    /// brain as context for the confirmation oracle.
    pub fn positions_snapshot(&self) -> HashMap<String, crate::domain::trading::types::Position> {
        self.managed.iter().map(|(coin, m)| (coin.clone(), m.position.clone())).collect()
    }

    /// Sizes `notional = balance * size_pct/100`, delegates the fill to the simulator,
    /// and wraps the result with trailing-stop state from the plan. Refuses if a
    /// position is already open for this coin or the plan is a `WAIT`.
    pub fn open_from_plan(
        &mut self,
        plan: &TradePlan,
        current_price: Decimal,
        entry_time: i64,
    ) -> Result<&ManagedPosition, PipelineError> {
        if self.managed.contains_key(&plan.coin) {
            return Err(PipelineError::InvalidPositionState {
                coin: plan.coin.clone(),
                reason: "position already open".to_string(),
            });
        }
        let direction = match plan.action {
            TradeAction::Long => Direction::Long,
            TradeAction::Short => Direction::Short,
            TradeAction::Wait => {
                return Err(PipelineError::InvalidPositionState {
                    coin: plan.coin.clone(),
                    reason: "cannot open a position from a WAIT plan".to_string(),
                });
            }
        };

        let notional = self.simulator.balance() * Decimal::from_f64(plan.size_pct / 100.0).unwrap_or_default();
        let size = notional / current_price;
        let position = self.simulator.open(&plan.coin, direction, size, current_price, entry_time)?;
        let managed = ManagedPosition::open(position, plan.stop_loss, plan.take_profit, plan.trail_activation, plan.trail_distance_pct);
        Ok(self.managed.entry(plan.coin.clone()).or_insert(managed))
    }

    /// Advances every managed position's trailing state against `prices`, closes any
    /// that hit a stop or target, and returns the closed trades.
    pub fn check_exits(&mut self, prices: &HashMap<String, Decimal>, exit_time: i64) -> Vec<Trade> {
        let mut triggered = Vec::new();
        for (coin, managed) in self.managed.iter_mut() {
            let Some(&price) = prices.get(coin) else { continue };
            managed.update_price(price);
            if let Some(reason) = managed.check_exit(price) {
                triggered.push((coin.clone(), price, reason));
            }
        }

        let mut closed = Vec::new();
        for (coin, price, reason) in triggered {
            self.managed.remove(&coin);
            if let Ok(trade) = self.simulator.close(&coin, price, exit_time, reason) {
                closed.push(trade);
            }
        }
        closed
    }

    /// Unconditionally closes every open position at the given prices.
    pub fn close_all(&mut self, prices: &HashMap<String, Decimal>, exit_time: i64) -> Vec<Trade> {
        let coins: Vec<String> = self.managed.keys().cloned().collect();
        let mut trades = Vec::new();
        for coin in coins {
            self.managed.remove(&coin);
            if let Some(&price) = prices.get(&coin) {
                if let Ok(trade) = self.simulator.close(&coin, price, exit_time, "end_of_backtest") {
                    trades.push(trade);
                }
            }
        }
        trades
    }

    pub fn equity(&self, prices: &HashMap<String, Decimal>) -> Decimal {
        self.simulator.equity(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::TradeAction;
    use rust_decimal_macros::dec;

    fn plan(action: TradeAction, coin: &str, trail_activation: Decimal) -> TradePlan {
        TradePlan {
            action,
            coin: coin.to_string(),
            size_pct: 10.0,
            stop_loss: dec!(90),
            take_profit: dec!(120),
            trail_activation,
            trail_distance_pct: 1.0,
            confidence: 7,
            reason: "test".to_string(),
            signals_considered: vec![],
        }
    }

    fn manager() -> PositionManager {
        PositionManager::new(PaperFillSimulator::new(SimulatorConfig::default()))
    }

    #[test]
    fn open_from_plan_refuses_when_already_open() {
        let mut m = manager();
        m.open_from_plan(&plan(TradeAction::Long, "BTC", dec!(105)), dec!(100), 0).unwrap();
        let err = m.open_from_plan(&plan(TradeAction::Long, "BTC", dec!(105)), dec!(100), 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPositionState { .. }));
    }

    #[test]
    fn open_from_plan_refuses_wait() {
        let mut m = manager();
        let err = m.open_from_plan(&plan(TradeAction::Wait, "BTC", dec!(105)), dec!(100), 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPositionState { .. }));
    }

    #[test]
    fn trailing_stop_activates_and_is_monotonic_for_long() {
        let mut m = manager();
        m.open_from_plan(&plan(TradeAction::Long, "BTC", dec!(105)), dec!(100), 0).unwrap();

        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(106));
        m.check_exits(&prices, 1);
        let first_stop = m.position("BTC").unwrap().trailing_stop;
        assert!(m.position("BTC").unwrap().trailing_active);

        prices.insert("BTC".to_string(), dec!(110));
        m.check_exits(&prices, 2);
        let second_stop = m.position("BTC").unwrap().trailing_stop;
        assert!(second_stop >= first_stop);

        prices.insert("BTC".to_string(), dec!(103));
        m.check_exits(&prices, 3);
        let third_stop = m.position("BTC").unwrap().trailing_stop;
        assert!(third_stop >= second_stop, "trailing stop must never move down for a LONG");
    }

    #[test]
    fn check_exits_closes_position_on_stop_loss_hit() {
        let mut m = manager();
        m.open_from_plan(&plan(TradeAction::Long, "BTC", dec!(200)), dec!(100), 0).unwrap();

        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(85));
        let closed = m.check_exits(&prices, 1);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason, "stop_loss");
        assert!(!m.has_position("BTC"));
    }

    #[test]
    fn check_exits_closes_on_take_profit() {
        let mut m = manager();
        m.open_from_plan(&plan(TradeAction::Long, "BTC", dec!(200)), dec!(100), 0).unwrap();

        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(121));
        let closed = m.check_exits(&prices, 1);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason, "take_profit");
    }

    #[test]
    fn close_all_closes_every_open_position() {
        let mut m = manager();
        m.open_from_plan(&plan(TradeAction::Long, "BTC", dec!(200)), dec!(100), 0).unwrap();
        m.open_from_plan(&plan(TradeAction::Short, "ETH", dec!(0)), dec!(50), 0).unwrap();

        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(101));
        prices.insert("ETH".to_string(), dec!(49));
        let trades = m.close_all(&prices, 5);
        assert_eq!(trades.len(), 2);
        assert_eq!(m.position_count(), 0);
    }
}
