//! Weighted-scoring decision brain: filters signals, scores by strategy weight,
//! gates on threshold and an oracle, then sizes and stops the resulting plan.

pub mod oracle;
pub mod risk_sizing;

pub use oracle::{AutoConfirmOracle, ConfirmationOracle};
pub use risk_sizing::calculate_dynamic_risk;

use crate::domain::strategy::Strategy;
use crate::domain::trading::types::{Direction, MarketContext, Position, Signal, TradeAction, TradePlan};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::sync::Arc;

pub struct DecisionBrain {
    strategy: Strategy,
    oracle: Arc<dyn ConfirmationOracle>,
}

impl DecisionBrain {
    pub fn new(strategy: Strategy, oracle: Arc<dyn ConfirmationOracle>) -> Self {
        Self { strategy, oracle }
    }

    pub fn with_default_oracle(strategy: Strategy) -> Self {
        Self::new(strategy, Arc::new(AutoConfirmOracle))
    }

    fn filter_signals<'a>(&self, signals: &'a [Signal], coin: &str) -> Vec<&'a Signal> {
        signals
            .iter()
            .filter(|s| s.coin == coin)
            .filter(|s| self.strategy.signal_weights.contains_key(&s.signal_type))
            .filter(|s| s.strength >= self.strategy.min_signal_strength)
            .collect()
    }

    fn weighted_scores(&self, signals: &[&Signal]) -> (f64, f64) {
        let mut long_score = 0.0;
        let mut short_score = 0.0;
        for signal in signals {
            let weight = self.strategy.signal_weights.get(&signal.signal_type).copied().unwrap_or(0.0);
            let contribution = weight * signal.strength;
            match signal.direction {
                Direction::Long => long_score += contribution,
                Direction::Short => short_score += contribution,
            }
        }
        (long_score, short_score)
    }

    /// `0.5` if every matched signal type has zero weight (nothing to average).
    fn avg_signal_strength(&self, signals: &[&Signal]) -> f64 {
        let mut total_weight = 0.0;
        let mut weighted_sum = 0.0;
        for signal in signals {
            let weight = self.strategy.signal_weights.get(&signal.signal_type).copied().unwrap_or(0.0);
            weighted_sum += weight * signal.strength;
            total_weight += weight;
        }
        if total_weight == 0.0 { 0.5 } else { weighted_sum / total_weight }
    }

    /// Runs the full pipeline: filter → score → threshold → oracle → risk sizing →
    /// stops/targets. Always returns a plan (`WAIT` on any gate failure).
    pub async fn evaluate(
        &self,
        signals: &[Signal],
        positions: &HashMap<String, Position>,
        context: &MarketContext,
    ) -> TradePlan {
        let coin = &context.coin;
        let filtered = self.filter_signals(signals, coin);
        if filtered.is_empty() {
            return TradePlan::wait(coin.clone(), "No signals meet criteria");
        }

        let (long_score, short_score) = self.weighted_scores(&filtered);
        let direction = if long_score >= self.strategy.signal_threshold && long_score > short_score {
            Direction::Long
        } else if short_score >= self.strategy.signal_threshold && short_score > long_score {
            Direction::Short
        } else {
            let winning = long_score.max(short_score);
            return TradePlan::wait(
                coin.clone(),
                format!(
                    "weighted score ({winning:.2}) below threshold ({})",
                    self.strategy.signal_threshold
                ),
            );
        };

        let winning_score = long_score.max(short_score);
        let (confirmed, confidence, oracle_reason) = self
            .oracle
            .confirm(direction, winning_score, signals, positions, context)
            .await;
        if !confirmed {
            return TradePlan::wait(coin.clone(), format!("not confirmed: {oracle_reason}"));
        }
        if confidence < self.strategy.min_confidence {
            return TradePlan::wait(coin.clone(), format!("confidence too low ({confidence})"));
        }

        let avg_strength = self.avg_signal_strength(&filtered);
        let sizing = calculate_dynamic_risk(avg_strength, confidence, context.volatility_level, &self.strategy.risk);

        let atr_sl = context.atr * Decimal::from_f64(sizing.stop_multiplier).unwrap_or_default();
        let atr_tp = context.atr * Decimal::from_f64(sizing.tp_multiplier).unwrap_or_default();
        let (stop_loss, take_profit, trail_activation) = match direction {
            Direction::Long => (
                context.current_price - atr_sl,
                context.current_price + atr_tp,
                context.current_price
                    * (Decimal::ONE + Decimal::from_f64(self.strategy.risk.trail_activation_pct / 100.0).unwrap_or_default()),
            ),
            Direction::Short => (
                context.current_price + atr_sl,
                context.current_price - atr_tp,
                context.current_price
                    * (Decimal::ONE - Decimal::from_f64(self.strategy.risk.trail_activation_pct / 100.0).unwrap_or_default()),
            ),
        };

        let signals_considered = filtered
            .iter()
            .map(|s| format!("{}:{}", s.signal_type, s.direction))
            .collect();

        TradePlan {
            action: match direction {
                Direction::Long => TradeAction::Long,
                Direction::Short => TradeAction::Short,
            },
            coin: coin.clone(),
            size_pct: sizing.position_pct,
            stop_loss,
            take_profit,
            trail_activation,
            trail_distance_pct: self.strategy.risk.trail_distance_pct,
            confidence,
            reason: oracle_reason,
            signals_considered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::RiskConfig;
    use crate::domain::trading::types::SignalType;
    use rust_decimal_macros::dec;

    fn risk() -> RiskConfig {
        RiskConfig {
            max_position_pct: 10.0,
            stop_loss_atr_mult: 1.5,
            take_profit_atr_mult: 3.0,
            trail_activation_pct: 0.5,
            trail_distance_pct: 0.3,
        }
    }

    fn strategy(threshold: f64, weights: HashMap<SignalType, f64>) -> Strategy {
        Strategy::new("s", weights, threshold, 0.1, 5, risk()).unwrap()
    }

    fn ctx() -> MarketContext {
        MarketContext::new("BTC", dec!(81), dec!(2))
    }

    #[tokio::test]
    async fn no_matching_signals_waits() {
        let brain = DecisionBrain::with_default_oracle(strategy(0.5, HashMap::new()));
        let plan = brain.evaluate(&[], &HashMap::new(), &ctx()).await;
        assert_eq!(plan.action, TradeAction::Wait);
    }

    #[tokio::test]
    async fn below_threshold_waits_s5() {
        let mut weights = HashMap::new();
        weights.insert(SignalType::Momentum, 0.5);
        weights.insert(SignalType::Rsi, 0.3);
        let brain = DecisionBrain::with_default_oracle(strategy(0.7, weights));

        let signals = vec![
            Signal::new("BTC", SignalType::Momentum, Direction::Long, 0.5, 0, "{}"),
            Signal::new("BTC", SignalType::Rsi, Direction::Long, 0.5, 0, "{}"),
        ];
        let plan = brain.evaluate(&signals, &HashMap::new(), &ctx()).await;
        assert_eq!(plan.action, TradeAction::Wait);
    }

    #[tokio::test]
    async fn threshold_met_emits_long_plan_s1() {
        let mut weights = HashMap::new();
        weights.insert(SignalType::Rsi, 1.0);
        let brain = DecisionBrain::with_default_oracle(strategy(0.5, weights));

        let signals = vec![Signal::new("BTC", SignalType::Rsi, Direction::Long, 0.9, 0, "{}")];
        let plan = brain.evaluate(&signals, &HashMap::new(), &ctx()).await;
        assert_eq!(plan.action, TradeAction::Long);
        assert!(plan.stop_loss < ctx().current_price);
        assert!(plan.take_profit > ctx().current_price);
        assert_eq!(plan.confidence, 7);
    }

    #[tokio::test]
    async fn never_opens_against_existing_position_is_caller_responsibility() {
        // The brain itself is stateless w.r.t. open positions (gating against an existing
        // position happens in the position manager); this just documents that positions are
        // passed through unused by the default oracle and don't block emission here.
        let mut weights = HashMap::new();
        weights.insert(SignalType::Rsi, 1.0);
        let brain = DecisionBrain::with_default_oracle(strategy(0.5, weights));
        let mut positions = HashMap::new();
        positions.insert(
            "BTC".to_string(),
            Position {
                coin: "BTC".into(),
                side: Direction::Long,
                size: dec!(1),
                entry_price: dec!(80),
                entry_time: 0,
            },
        );
        let signals = vec![Signal::new("BTC", SignalType::Rsi, Direction::Long, 0.9, 0, "{}")];
        let plan = brain.evaluate(&signals, &positions, &ctx()).await;
        assert_eq!(plan.action, TradeAction::Long);
    }
}
