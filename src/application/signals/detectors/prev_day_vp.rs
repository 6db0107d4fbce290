//! Previous-day Volume Profile levels (POC/VAH/VAL) as support/resistance memory for the
//! current session: opening drive in the first `confirmation_candles`-sized window of a
//! session, then level rejection/reclaim checks, all priority-ordered and cooldown-gated.

use super::SignalDetector;
use crate::domain::trading::types::{Candle, Direction, Signal, SignalType};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

/// The previous session's completed POC/VAH/VAL, handed in by the orchestrator once a
/// session rolls over (`VolumeProfileBuilder::record_trade`'s completed-profile return).
#[derive(Debug, Clone, Copy)]
pub struct PrevDayLevels {
    pub poc: f64,
    pub vah: f64,
    pub val: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PrevDayVpConfig {
    pub level_buffer_pct: f64,
    pub confirmation_candles: usize,
    pub min_strength: f64,
    pub cooldown_candles: u32,
    pub poc_magnet_distance_pct: f64,
}

impl Default for PrevDayVpConfig {
    fn default() -> Self {
        Self {
            level_buffer_pct: 0.001,
            confirmation_candles: 2,
            min_strength: 0.5,
            cooldown_candles: 10,
            poc_magnet_distance_pct: 0.3,
        }
    }
}

#[derive(Default)]
struct CoinState {
    candle_count: u32,
    candles_since_signal: u32,
    session_open: Option<f64>,
}

pub struct PrevDayVp {
    config: PrevDayVpConfig,
    levels: Option<PrevDayLevels>,
    state: HashMap<String, CoinState>,
}

impl PrevDayVp {
    pub fn new(config: PrevDayVpConfig) -> Self {
        Self {
            config,
            levels: None,
            state: HashMap::new(),
        }
    }

    /// Pushed by the orchestrator when a session's volume profile completes.
    pub fn set_prev_day_levels(&mut self, levels: PrevDayLevels) {
        self.levels = Some(levels);
    }

    fn check_opening_drive(
        &self,
        coin: &str,
        candles: &[Candle],
        open_price: f64,
        vah: f64,
        val: f64,
        buffer: f64,
    ) -> Option<Signal> {
        let current = candles.last()?;
        let n = self.config.confirmation_candles.min(candles.len());
        let recent = &candles[candles.len() - n..];
        let close = current.close.to_f64().unwrap_or(0.0);

        if open_price > vah + buffer {
            let all_above = recent.iter().all(|c| c.low.to_f64().unwrap_or(0.0) > vah);
            let trending_up = recent.last()?.close.to_f64().unwrap_or(0.0)
                > recent[0].open.to_f64().unwrap_or(0.0);
            if all_above && trending_up {
                let strength = (((close - vah) / (vah * 0.01)) * 0.2 + 0.6).min(1.0);
                if strength >= self.config.min_strength {
                    let metadata = serde_json::json!({
                        "setup": "opening_drive_bullish",
                        "prev_day_vah": vah,
                        "prev_day_val": val,
                        "session_open": open_price,
                        "close_price": close,
                    })
                    .to_string();
                    return Some(Signal::new(
                        coin,
                        SignalType::PrevDayVp,
                        Direction::Long,
                        strength,
                        current.timestamp,
                        metadata,
                    ));
                }
            }
        }

        if open_price < val - buffer {
            let all_below = recent.iter().all(|c| c.high.to_f64().unwrap_or(0.0) < val);
            let trending_down = recent.last()?.close.to_f64().unwrap_or(0.0)
                < recent[0].open.to_f64().unwrap_or(0.0);
            if all_below && trending_down {
                let strength = (((val - close) / (val * 0.01)) * 0.2 + 0.6).min(1.0);
                if strength >= self.config.min_strength {
                    let metadata = serde_json::json!({
                        "setup": "opening_drive_bearish",
                        "prev_day_vah": vah,
                        "prev_day_val": val,
                        "session_open": open_price,
                        "close_price": close,
                    })
                    .to_string();
                    return Some(Signal::new(
                        coin,
                        SignalType::PrevDayVp,
                        Direction::Short,
                        strength,
                        current.timestamp,
                        metadata,
                    ));
                }
            }
        }
        None
    }

    fn check_vah_rejection(
        &self,
        coin: &str,
        candles: &[Candle],
        vah: f64,
        buffer: f64,
        va_range: f64,
    ) -> Option<Signal> {
        let lookback = 5.min(candles.len());
        let recent = &candles[candles.len() - lookback..];
        let current = candles.last()?;
        let touched = recent[..recent.len() - 1]
            .iter()
            .any(|c| c.high.to_f64().unwrap_or(0.0) >= vah - buffer);
        let close = current.close.to_f64().unwrap_or(0.0);
        let open = current.open.to_f64().unwrap_or(0.0);
        let closed_below = close < vah - buffer;
        let bearish_candle = close < open;

        if touched && closed_below && bearish_candle {
            let highest = recent
                .iter()
                .map(|c| c.high.to_f64().unwrap_or(0.0))
                .fold(f64::NEG_INFINITY, f64::max);
            let strength = ((highest - close) / va_range * 2.0).min(0.85);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "vah_rejection",
                    "prev_day_vah": vah,
                    "rejection_from": highest,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::PrevDayVp,
                    Direction::Short,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }

    fn check_val_rejection(
        &self,
        coin: &str,
        candles: &[Candle],
        val: f64,
        buffer: f64,
        va_range: f64,
    ) -> Option<Signal> {
        let lookback = 5.min(candles.len());
        let recent = &candles[candles.len() - lookback..];
        let current = candles.last()?;
        let touched = recent[..recent.len() - 1]
            .iter()
            .any(|c| c.low.to_f64().unwrap_or(0.0) <= val + buffer);
        let close = current.close.to_f64().unwrap_or(0.0);
        let open = current.open.to_f64().unwrap_or(0.0);
        let closed_above = close > val + buffer;
        let bullish_candle = close > open;

        if touched && closed_above && bullish_candle {
            let lowest = recent
                .iter()
                .map(|c| c.low.to_f64().unwrap_or(0.0))
                .fold(f64::INFINITY, f64::min);
            let strength = ((close - lowest) / va_range * 2.0).min(0.85);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "val_rejection",
                    "prev_day_val": val,
                    "rejection_from": lowest,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::PrevDayVp,
                    Direction::Long,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }

    fn check_poc_test(
        &self,
        coin: &str,
        candles: &[Candle],
        poc: f64,
        vah: f64,
        val: f64,
        buffer: f64,
        va_range: f64,
    ) -> Option<Signal> {
        if candles.len() < 3 {
            return None;
        }
        let current = &candles[candles.len() - 1];
        let prev = &candles[candles.len() - 2];
        let poc_buffer = buffer * 2.0;
        let lo = prev.low.to_f64().unwrap_or(0.0).min(current.low.to_f64().unwrap_or(0.0));
        let hi = prev.high.to_f64().unwrap_or(0.0).max(current.high.to_f64().unwrap_or(0.0));
        let touched = lo <= poc + poc_buffer && hi >= poc - poc_buffer;
        if !touched {
            return None;
        }

        let close = current.close.to_f64().unwrap_or(0.0);
        let prev_close = prev.close.to_f64().unwrap_or(0.0);

        if prev_close < poc && close > poc && close > prev_close {
            let strength = ((close - poc).abs() / va_range * 3.0).min(0.75);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "poc_test_bullish",
                    "prev_day_poc": poc,
                    "target": vah,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::PrevDayVp,
                    Direction::Long,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }

        if prev_close > poc && close < poc && close < prev_close {
            let strength = ((poc - close).abs() / va_range * 3.0).min(0.75);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "poc_test_bearish",
                    "prev_day_poc": poc,
                    "target": val,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::PrevDayVp,
                    Direction::Short,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }

    fn check_va_reclaim(
        &self,
        coin: &str,
        candles: &[Candle],
        vah: f64,
        val: f64,
        poc: f64,
        buffer: f64,
        va_range: f64,
    ) -> Option<Signal> {
        let window = self.config.confirmation_candles + 2;
        if candles.len() < window {
            return None;
        }
        let current = candles.last()?;
        let close = current.close.to_f64().unwrap_or(0.0);
        let prior = &candles[candles.len() - window..candles.len() - 1];

        let was_below = prior.iter().all(|c| c.close.to_f64().unwrap_or(0.0) < val - buffer);
        let now_inside = close > val + buffer && close < vah - buffer;
        if was_below && now_inside {
            let strength = ((close - val) / va_range * 2.0).min(0.7);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "va_reclaim_bullish",
                    "prev_day_poc": poc,
                    "target": poc,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::PrevDayVp,
                    Direction::Long,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }

        let was_above = prior.iter().all(|c| c.close.to_f64().unwrap_or(0.0) > vah + buffer);
        let now_inside_bear = close < vah - buffer && close > val + buffer;
        if was_above && now_inside_bear {
            let strength = ((vah - close) / va_range * 2.0).min(0.7);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "va_reclaim_bearish",
                    "prev_day_poc": poc,
                    "target": poc,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::PrevDayVp,
                    Direction::Short,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }
}

impl Default for PrevDayVp {
    fn default() -> Self {
        Self::new(PrevDayVpConfig::default())
    }
}

impl SignalDetector for PrevDayVp {
    fn detect(&mut self, coin: &str, candles: &[Candle]) -> Option<Signal> {
        let levels = self.levels?;
        if candles.len() < self.config.confirmation_candles + 1 {
            return None;
        }

        let state = self.state.entry(coin.to_string()).or_default();
        state.candle_count += 1;
        state.candles_since_signal += 1;
        if state.session_open.is_none() {
            state.session_open = Some(candles[0].open.to_f64().unwrap_or(0.0));
        }
        if state.candles_since_signal < self.config.cooldown_candles {
            return None;
        }
        let candle_count = state.candle_count;
        let session_open = state.session_open.expect("just set above");

        let current = candles.last()?;
        let close = current.close.to_f64().unwrap_or(0.0);
        let buffer = close * self.config.level_buffer_pct;
        let va_range = if levels.vah > levels.val { levels.vah - levels.val } else { 1.0 };

        let mut signal = None;
        if candle_count <= 15 {
            signal = self.check_opening_drive(
                coin, candles, session_open, levels.vah, levels.val, buffer,
            );
        }
        if signal.is_none() {
            signal = self.check_vah_rejection(coin, candles, levels.vah, buffer, va_range);
        }
        if signal.is_none() {
            signal = self.check_val_rejection(coin, candles, levels.val, buffer, va_range);
        }
        if signal.is_none() {
            signal = self.check_poc_test(
                coin, candles, levels.poc, levels.vah, levels.val, buffer, va_range,
            );
        }
        if signal.is_none() {
            signal = self.check_va_reclaim(
                coin, candles, levels.vah, levels.val, levels.poc, buffer, va_range,
            );
        }

        if signal.is_some() {
            self.state.get_mut(coin).expect("inserted above").candles_since_signal = 0;
        }
        signal
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
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    fn candle(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            coin: "BTC".into(),
            open: Decimal::from_f64(open).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64(close).unwrap(),
            volume: dec!(1),
            trade_count: 1,
            timestamp: i,
        }
    }

    fn levels() -> PrevDayLevels {
        PrevDayLevels {
            poc: 50_000.0,
            vah: 50_100.0,
            val: 49_900.0,
        }
    }

    #[test]
    fn no_levels_yields_no_signal() {
        let mut det = PrevDayVp::default();
        let candles: Vec<Candle> = (0..5).map(|i| candle(i, 50000.0, 50010.0, 49990.0, 50000.0)).collect();
        assert!(det.detect("BTC", &candles).is_none());
    }

    #[test]
    fn poc_test_bearish_detected() {
        let mut det = PrevDayVp::new(PrevDayVpConfig {
            min_strength: 0.0,
            cooldown_candles: 0,
            ..PrevDayVpConfig::default()
        });
        det.set_prev_day_levels(levels());

        let candles = vec![
            candle(0, 50200.0, 50250.0, 50150.0, 50200.0),
            candle(1, 50150.0, 50160.0, 50010.0, 50050.0),
            candle(2, 50050.0, 50060.0, 49980.0, 49990.0),
        ];
        let signal = det.detect("BTC", &candles);
        assert!(signal.is_some());
        let s = signal.unwrap();
        assert_eq!(s.direction, Direction::Short);
        assert!(s.metadata.contains("poc_test_bearish"));
    }

    #[test]
    fn cooldown_blocks_repeat_signal() {
        let mut det = PrevDayVp::new(PrevDayVpConfig {
            min_strength: 0.0,
            cooldown_candles: 50,
            ..PrevDayVpConfig::default()
        });
        det.set_prev_day_levels(levels());
        let candles = vec![
            candle(0, 50200.0, 50250.0, 50150.0, 50200.0),
            candle(1, 50150.0, 50160.0, 50010.0, 50050.0),
            candle(2, 50050.0, 50060.0, 49980.0, 49990.0),
        ];
        assert!(det.detect("BTC", &candles).is_some());

        let mut more = candles.clone();
        more.push(candle(3, 49990.0, 50000.0, 49950.0, 49960.0));
        assert!(det.detect("BTC", &more).is_none());
    }
}
