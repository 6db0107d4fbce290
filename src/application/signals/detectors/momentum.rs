//! Dual-EMA crossover detector: align the fast EMA series to the slow one, compare the
//! last two aligned points, and emit a signal on a fresh crossover.

use super::SignalDetector;
use crate::application::indicators::ema_series;
use crate::domain::trading::types::{Candle, Direction, Signal, SignalType};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct MomentumConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            fast_period: 9,
            slow_period: 21,
            threshold: 0.001,
        }
    }
}

/// Per-coin dedup state: the direction of the last crossover emitted, so the same
/// crossover doesn't re-fire every candle while the EMAs stay separated.
pub struct Momentum {
    config: MomentumConfig,
    last_crossover_direction: HashMap<String, Direction>,
}

impl Momentum {
    pub fn new(config: MomentumConfig) -> Self {
        Self {
            config,
            last_crossover_direction: HashMap::new(),
        }
    }
}

impl Default for Momentum {
    fn default() -> Self {
        Self::new(MomentumConfig::default())
    }
}

impl SignalDetector for Momentum {
    fn detect(&mut self, coin: &str, candles: &[Candle]) -> Option<Signal> {
        if candles.len() < self.config.slow_period + 2 {
            return None;
        }

        let prices: Vec<f64> = candles
            .iter()
            .map(|c| c.close.to_f64().unwrap_or(0.0))
            .collect();

        let fast = ema_series(&prices, self.config.fast_period);
        let slow = ema_series(&prices, self.config.slow_period);
        if fast.is_empty() || slow.is_empty() {
            return None;
        }

        let offset = self.config.slow_period - self.config.fast_period;
        if fast.len() <= offset {
            return None;
        }
        let aligned_fast = &fast[offset..];
        let len = aligned_fast.len().min(slow.len());
        if len < 2 {
            return None;
        }
        let aligned_fast = &aligned_fast[aligned_fast.len() - len..];
        let aligned_slow = &slow[slow.len() - len..];

        let prev_fast = aligned_fast[len - 2];
        let prev_slow = aligned_slow[len - 2];
        let cur_fast = aligned_fast[len - 1];
        let cur_slow = aligned_slow[len - 1];

        let was_above = prev_fast > prev_slow;
        let is_above = cur_fast > cur_slow;

        let direction = if !was_above && is_above {
            Direction::Long
        } else if was_above && !is_above {
            Direction::Short
        } else {
            return None;
        };

        if self.last_crossover_direction.get(coin) == Some(&direction) {
            return None;
        }
        self.last_crossover_direction
            .insert(coin.to_string(), direction);

        let current_price = *prices.last().expect("checked non-empty above");
        if current_price == 0.0 {
            return None;
        }
        let diff_pct = (cur_fast - cur_slow).abs() / current_price;
        if diff_pct < self.config.threshold {
            return None;
        }
        let strength = (diff_pct / (self.config.threshold * 5.0)).min(1.0);

        let metadata = serde_json::json!({
            "fast_ema": cur_fast,
            "slow_ema": cur_slow,
            "diff_pct": diff_pct,
            "fast_period": self.config.fast_period,
            "slow_period": self.config.slow_period,
        })
        .to_string();

        Some(Signal::new(
            coin,
            SignalType::Momentum,
            direction,
            strength,
            candles.last().expect("checked non-empty above").timestamp,
            metadata,
        ))
    }

    fn reset(&mut self, coin: Option<&str>) {
        match coin {
            Some(c) => {
                self.last_crossover_direction.remove(c);
            }
            None => self.last_crossover_direction.clear(),
        }
    }
}
