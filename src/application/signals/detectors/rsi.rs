//! RSI extremes and RSI/price divergence. Divergence is checked first (it's the more
//! predictive signal) and falls back to oversold/overbought threshold crossings.

use super::SignalDetector;
use crate::application::indicators::rsi::rsi_wilder;
use crate::domain::trading::types::{Candle, Direction, Signal, SignalType};
use rust_decimal::prelude::ToPrimitive;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct RsiConfig {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub cooldown_candles: u32,
    pub divergence_lookback: usize,
    pub divergence_strength_boost: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
            cooldown_candles: 5,
            divergence_lookback: 20,
            divergence_strength_boost: 0.3,
        }
    }
}

struct CoinState {
    candles_since_signal: u32,
    last_signal_direction: Option<Direction>,
    rsi_history: VecDeque<f64>,
    price_history: VecDeque<f64>,
}

impl CoinState {
    fn new(divergence_lookback: usize) -> Self {
        Self {
            candles_since_signal: 0,
            last_signal_direction: None,
            rsi_history: VecDeque::with_capacity(divergence_lookback),
            price_history: VecDeque::with_capacity(divergence_lookback),
        }
    }
}

pub struct Rsi {
    config: RsiConfig,
    state: HashMap<String, CoinState>,
}

impl Rsi {
    pub fn new(config: RsiConfig) -> Self {
        Self {
            config,
            state: HashMap::new(),
        }
    }

    /// Local highs/lows in a series: `window` points on each side must be strictly
    /// exceeded (high) or undercut (low), with the opposite side allowed to tie.
    fn local_extremes(values: &[f64], window: usize) -> (Vec<(usize, f64)>, Vec<(usize, f64)>) {
        let mut highs = Vec::new();
        let mut lows = Vec::new();
        if values.len() <= 2 * window {
            return (highs, lows);
        }
        for i in window..values.len() - window {
            let val = values[i];
            let left = &values[i - window..i];
            let right = &values[i + 1..i + window + 1];

            if left.iter().all(|&v| val > v) && right.iter().all(|&v| val >= v) {
                highs.push((i, val));
            }
            if left.iter().all(|&v| val < v) && right.iter().all(|&v| val <= v) {
                lows.push((i, val));
            }
        }
        (highs, lows)
    }

    /// Bullish: price lower low, RSI higher low. Bearish: price higher high, RSI lower
    /// high. Returns `(direction, strength)`.
    fn detect_divergence(prices: &[f64], rsi_values: &[f64]) -> Option<(Direction, f64)> {
        if prices.len() < 10 || rsi_values.len() < 10 {
            return None;
        }
        let min_len = prices.len().min(rsi_values.len());
        let prices = &prices[prices.len() - min_len..];
        let rsi_values = &rsi_values[rsi_values.len() - min_len..];

        let (price_highs, price_lows) = Self::local_extremes(prices, 3);
        let (rsi_highs, rsi_lows) = Self::local_extremes(rsi_values, 3);

        if price_lows.len() >= 2 && rsi_lows.len() >= 2 {
            let (_, p_prev) = price_lows[price_lows.len() - 2];
            let (_, p_last) = price_lows[price_lows.len() - 1];
            let (_, r_prev) = rsi_lows[rsi_lows.len() - 2];
            let (_, r_last) = rsi_lows[rsi_lows.len() - 1];

            if p_last < p_prev && r_last > r_prev {
                let strength = ((r_last - r_prev) / 20.0).min(1.0);
                return Some((Direction::Long, strength));
            }
        }

        if price_highs.len() >= 2 && rsi_highs.len() >= 2 {
            let (_, p_prev) = price_highs[price_highs.len() - 2];
            let (_, p_last) = price_highs[price_highs.len() - 1];
            let (_, r_prev) = rsi_highs[rsi_highs.len() - 2];
            let (_, r_last) = rsi_highs[rsi_highs.len() - 1];

            if p_last > p_prev && r_last < r_prev {
                let strength = ((r_prev - r_last) / 20.0).min(1.0);
                return Some((Direction::Short, strength));
            }
        }

        None
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(RsiConfig::default())
    }
}

impl SignalDetector for Rsi {
    fn detect(&mut self, coin: &str, candles: &[Candle]) -> Option<Signal> {
        if candles.len() < self.config.period + 1 {
            return None;
        }

        let state = self
            .state
            .entry(coin.to_string())
            .or_insert_with(|| CoinState::new(self.config.divergence_lookback));
        state.candles_since_signal += 1;

        let prices: Vec<f64> = candles
            .iter()
            .map(|c| c.close.to_f64().unwrap_or(0.0))
            .collect();
        let rsi_value = rsi_wilder(&prices, self.config.period)?;

        if state.rsi_history.len() == self.config.divergence_lookback {
            state.rsi_history.pop_front();
            state.price_history.pop_front();
        }
        state.rsi_history.push_back(rsi_value);
        state
            .price_history
            .push_back(*prices.last().expect("checked non-empty above"));

        let rsi_history: Vec<f64> = state.rsi_history.iter().copied().collect();
        let price_history: Vec<f64> = state.price_history.iter().copied().collect();
        let timestamp = candles.last().expect("checked non-empty above").timestamp;

        if let Some((direction, divergence_strength)) =
            Self::detect_divergence(&price_history, &rsi_history)
        {
            if state.candles_since_signal >= self.config.cooldown_candles
                && state.last_signal_direction != Some(direction)
            {
                state.candles_since_signal = 0;
                state.last_signal_direction = Some(direction);
                let strength = (divergence_strength + self.config.divergence_strength_boost).min(1.0);

                let metadata = serde_json::json!({
                    "rsi": rsi_value,
                    "signal_source": "divergence",
                    "oversold_threshold": self.config.oversold,
                    "overbought_threshold": self.config.overbought,
                    "period": self.config.period,
                })
                .to_string();

                return Some(Signal::new(
                    coin,
                    SignalType::Rsi,
                    direction,
                    strength,
                    timestamp,
                    metadata,
                ));
            }
        }

        let direction = if rsi_value < self.config.oversold {
            Direction::Long
        } else if rsi_value > self.config.overbought {
            Direction::Short
        } else {
            // Back in the neutral band: re-arm so the next extreme can fire again even if
            // it matches the direction of the last signal.
            state.last_signal_direction = None;
            return None;
        };

        if state.candles_since_signal < self.config.cooldown_candles {
            return None;
        }
        if state.last_signal_direction == Some(direction) {
            return None;
        }

        state.candles_since_signal = 0;
        state.last_signal_direction = Some(direction);

        // Early signals (RSI just crossing the threshold) are more predictive than
        // deeply extreme ones, so strength is inverted against proximity to threshold.
        let strength = match direction {
            Direction::Long => {
                let extremity = (self.config.oversold - rsi_value) / self.config.oversold;
                1.0 - extremity
            }
            Direction::Short => {
                let extremity =
                    (rsi_value - self.config.overbought) / (100.0 - self.config.overbought);
                1.0 - extremity
            }
        };
        let strength = strength.clamp(0.1, 1.0);

        let metadata = serde_json::json!({
            "rsi": rsi_value,
            "signal_source": "threshold",
            "oversold_threshold": self.config.oversold,
            "overbought_threshold": self.config.overbought,
            "period": self.config.period,
        })
        .to_string();

        Some(Signal::new(
            coin,
            SignalType::Rsi,
            direction,
            strength,
            timestamp,
            metadata,
        ))
    }

    fn reset(&mut self, coin: Option<&str>) {
        match coin {
            Some(c) => {
                self.state.remove(c);
            }
            None => self.state.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    fn candle_at(i: i64, price: f64) -> Candle {
        let price = rust_decimal::Decimal::from_f64(price).unwrap_or(dec!(0));
        Candle {
            coin: "BTC".into(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: dec!(1),
            trade_count: 1,
            timestamp: i,
        }
    }

    #[test]
    fn insufficient_candles_yields_no_signal() {
        let mut det = Rsi::default();
        let candles: Vec<Candle> = (0..5).map(|i| candle_at(i, 100.0)).collect();
        assert!(det.detect("BTC", &candles).is_none());
    }

    #[test]
    fn sustained_decline_triggers_oversold_long() {
        let mut det = Rsi::default();
        let candles: Vec<Candle> = (0..20).map(|i| candle_at(i, 100.0 - i as f64 * 2.0)).collect();
        let signal = det.detect("BTC", &candles).unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert!(signal.strength >= 0.1 && signal.strength <= 1.0);
    }

    #[test]
    fn sustained_rally_triggers_overbought_short() {
        let mut det = Rsi::default();
        let candles: Vec<Candle> = (0..20).map(|i| candle_at(i, 100.0 + i as f64 * 2.0)).collect();
        let signal = det.detect("BTC", &candles).unwrap();
        assert_eq!(signal.direction, Direction::Short);
    }

    #[test]
    fn repeated_same_direction_signal_is_deduped_until_cooldown_and_reversal() {
        let mut det = Rsi::default();
        let candles: Vec<Candle> = (0..20).map(|i| candle_at(i, 100.0 - i as f64 * 2.0)).collect();
        assert!(det.detect("BTC", &candles).is_some());

        let mut more = candles.clone();
        more.push(candle_at(20, 59.0));
        assert!(det.detect("BTC", &more).is_none());
    }

    #[test]
    fn reset_clears_all_per_coin_state() {
        let mut det = Rsi::default();
        let candles: Vec<Candle> = (0..20).map(|i| candle_at(i, 100.0 - i as f64 * 2.0)).collect();
        det.detect("BTC", &candles);
        det.reset(None);
        assert!(det.state.is_empty());
    }
}
