//! MACD histogram-sign crossover. The `min_histogram` gate defaults deliberately
//! sky-high: live tuning found MACD's raw signals unreliable (~40% accuracy, all in the
//! weak band), so the gate effectively disables the detector rather than removing it
//! outright. Kept as the default here too.

use super::SignalDetector;
use crate::application::indicators::macd_series;
use crate::domain::trading::types::{Candle, Direction, Signal, SignalType};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub min_histogram: f64,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
            min_histogram: 100_000.0,
        }
    }
}

pub struct Macd {
    config: MacdConfig,
    last_crossover_direction: HashMap<String, Direction>,
}

impl Macd {
    pub fn new(config: MacdConfig) -> Self {
        Self {
            config,
            last_crossover_direction: HashMap::new(),
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(MacdConfig::default())
    }
}

impl SignalDetector for Macd {
    fn detect(&mut self, coin: &str, candles: &[Candle]) -> Option<Signal> {
        if candles.len() < self.config.slow + self.config.signal + 1 {
            return None;
        }

        let prices: Vec<f64> = candles
            .iter()
            .map(|c| c.close.to_f64().unwrap_or(0.0))
            .collect();
        let results = macd_series(&prices, self.config.fast, self.config.slow, self.config.signal);
        if results.len() < 2 {
            return None;
        }

        let previous = results[results.len() - 2];
        let current = results[results.len() - 1];

        let was_bullish = previous.histogram > 0.0;
        let is_bullish = current.histogram > 0.0;

        let direction = if !was_bullish && is_bullish {
            Direction::Long
        } else if was_bullish && !is_bullish {
            Direction::Short
        } else {
            return None;
        };

        if self.last_crossover_direction.get(coin) == Some(&direction) {
            return None;
        }
        self.last_crossover_direction
            .insert(coin.to_string(), direction);

        if current.histogram.abs() < self.config.min_histogram {
            return None;
        }

        let current_price = *prices.last().expect("checked non-empty above");
        if current_price == 0.0 {
            return None;
        }
        let histogram_pct = current.histogram.abs() / current_price;
        let strength = (histogram_pct * 100.0).min(1.0);

        let metadata = serde_json::json!({
            "macd_line": current.macd_line,
            "signal_line": current.signal_line,
            "histogram": current.histogram,
            "histogram_pct": histogram_pct * 100.0,
            "fast": self.config.fast,
            "slow": self.config.slow,
            "signal": self.config.signal,
        })
        .to_string();

        Some(Signal::new(
            coin,
            SignalType::Macd,
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
