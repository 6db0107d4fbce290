//! Intraday Volume Profile setups. Requires an externally supplied session
//! `VolumeProfile` snapshot (pushed by the orchestrator from the `VolumeProfileBuilder`)
//! before detection can produce anything, checked in priority order.

use super::SignalDetector;
use crate::application::indicators::volume_profile::{poc, value_area};
use crate::domain::trading::types::{
    Candle, Direction, Signal, SignalType, VolumeProfile as SessionProfile,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct VolumeProfileConfig {
    pub va_buffer_pct: f64,
    pub breakout_candles: usize,
    pub rejection_lookback: usize,
    pub delta_threshold_pct: f64,
    pub min_strength: f64,
    pub cooldown_candles: u32,
    pub value_area_pct: f64,
}

impl Default for VolumeProfileConfig {
    fn default() -> Self {
        Self {
            va_buffer_pct: 0.001,
            breakout_candles: 3,
            rejection_lookback: 5,
            delta_threshold_pct: 30.0,
            min_strength: 0.4,
            cooldown_candles: 5,
            value_area_pct: 0.7,
        }
    }
}

/// Detector for the current-session profile. Named `VolumeProfile`; the session data
/// model of the same name lives in `domain::trading::types` and is imported here
/// under an alias.
pub struct VolumeProfile {
    config: VolumeProfileConfig,
    profile: Option<SessionProfile>,
    candles_since_signal: HashMap<String, u32>,
}

impl VolumeProfile {
    pub fn new(config: VolumeProfileConfig) -> Self {
        Self {
            config,
            profile: None,
            candles_since_signal: HashMap::new(),
        }
    }

    /// Pushed by the orchestrator whenever the session profile is refreshed.
    pub fn update_profile(&mut self, profile: SessionProfile) {
        self.profile = Some(profile);
    }

    fn cooldown_ok(&mut self, coin: &str) -> bool {
        let counter = self.candles_since_signal.entry(coin.to_string()).or_insert(0);
        *counter += 1;
        *counter >= self.config.cooldown_candles
    }

    fn mark_signalled(&mut self, coin: &str) {
        self.candles_since_signal.insert(coin.to_string(), 0);
    }

    fn check_failed_auction_low(
        &self,
        coin: &str,
        candles: &[Candle],
        va_low: f64,
        va_high: f64,
        buffer: f64,
    ) -> Option<Signal> {
        let lookback = self.config.rejection_lookback.min(candles.len());
        let recent = &candles[candles.len() - lookback..];
        let went_below = recent[..recent.len() - 1]
            .iter()
            .any(|c| c.low.to_f64().unwrap_or(0.0) < va_low - buffer);
        let current = candles.last()?;
        let close = current.close.to_f64().unwrap_or(0.0);
        let closed_inside = close > va_low + buffer;

        if went_below && closed_inside {
            let lowest = recent
                .iter()
                .map(|c| c.low.to_f64().unwrap_or(0.0))
                .fold(f64::INFINITY, f64::min);
            let va_range = if va_high > va_low { va_high - va_low } else { 1.0 };
            let strength = ((close - lowest) / va_range).min(1.0);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "failed_auction_low",
                    "va_low": va_low,
                    "va_high": va_high,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::VolumeProfile,
                    Direction::Long,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }

    fn check_failed_auction_high(
        &self,
        coin: &str,
        candles: &[Candle],
        va_low: f64,
        va_high: f64,
        buffer: f64,
    ) -> Option<Signal> {
        let lookback = self.config.rejection_lookback.min(candles.len());
        let recent = &candles[candles.len() - lookback..];
        let went_above = recent[..recent.len() - 1]
            .iter()
            .any(|c| c.high.to_f64().unwrap_or(0.0) > va_high + buffer);
        let current = candles.last()?;
        let close = current.close.to_f64().unwrap_or(0.0);
        let closed_inside = close < va_high - buffer;

        if went_above && closed_inside {
            let highest = recent
                .iter()
                .map(|c| c.high.to_f64().unwrap_or(0.0))
                .fold(f64::NEG_INFINITY, f64::max);
            let va_range = if va_high > va_low { va_high - va_low } else { 1.0 };
            let strength = ((highest - close) / va_range).min(1.0);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "failed_auction_high",
                    "va_low": va_low,
                    "va_high": va_high,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::VolumeProfile,
                    Direction::Short,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }

    fn check_va_breakout_up(
        &self,
        coin: &str,
        candles: &[Candle],
        va_low: f64,
        va_high: f64,
        buffer: f64,
    ) -> Option<Signal> {
        if candles.len() < self.config.breakout_candles {
            return None;
        }
        let recent = &candles[candles.len() - self.config.breakout_candles..];
        let all_above = recent
            .iter()
            .all(|c| c.close.to_f64().unwrap_or(0.0) > va_high + buffer);
        if all_above {
            let current = candles.last()?;
            let close = current.close.to_f64().unwrap_or(0.0);
            let va_range = if va_high > va_low { va_high - va_low } else { 1.0 };
            let strength = ((close - va_high) / va_range * 0.5 + 0.5).min(1.0);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "va_breakout_up",
                    "va_low": va_low,
                    "va_high": va_high,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::VolumeProfile,
                    Direction::Long,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }

    fn check_va_breakout_down(
        &self,
        coin: &str,
        candles: &[Candle],
        va_low: f64,
        va_high: f64,
        buffer: f64,
    ) -> Option<Signal> {
        if candles.len() < self.config.breakout_candles {
            return None;
        }
        let recent = &candles[candles.len() - self.config.breakout_candles..];
        let all_below = recent
            .iter()
            .all(|c| c.close.to_f64().unwrap_or(0.0) < va_low - buffer);
        if all_below {
            let current = candles.last()?;
            let close = current.close.to_f64().unwrap_or(0.0);
            let va_range = if va_high > va_low { va_high - va_low } else { 1.0 };
            let strength = ((va_low - close) / va_range * 0.5 + 0.5).min(1.0);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "va_breakout_down",
                    "va_low": va_low,
                    "va_high": va_high,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::VolumeProfile,
                    Direction::Short,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }

    fn check_poc_bounce(&self, coin: &str, candles: &[Candle], poc: f64, buffer: f64) -> Option<Signal> {
        if candles.len() < 3 {
            return None;
        }
        let current = &candles[candles.len() - 1];
        let prev = &candles[candles.len() - 2];
        let lo = prev.low.to_f64().unwrap_or(0.0).min(current.low.to_f64().unwrap_or(0.0));
        let hi = prev.high.to_f64().unwrap_or(0.0).max(current.high.to_f64().unwrap_or(0.0));
        let touched = lo <= poc + buffer && hi >= poc - buffer;
        if !touched {
            return None;
        }

        let close = current.close.to_f64().unwrap_or(0.0);
        let prev_close = prev.close.to_f64().unwrap_or(0.0);

        if close > poc && close > prev_close {
            let strength = (((close - poc).abs()) / (buffer * 10.0)).min(0.7);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "poc_bounce",
                    "poc": poc,
                    "bounce_direction": "up",
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::VolumeProfile,
                    Direction::Long,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        } else if close < poc && close < prev_close {
            let strength = (((poc - close).abs()) / (buffer * 10.0)).min(0.7);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "poc_bounce",
                    "poc": poc,
                    "bounce_direction": "down",
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::VolumeProfile,
                    Direction::Short,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }

    fn check_delta_divergence(
        &self,
        coin: &str,
        candles: &[Candle],
        total_delta: f64,
        total_volume: f64,
    ) -> Option<Signal> {
        if candles.len() < 5 || total_volume == 0.0 {
            return None;
        }
        let recent = &candles[candles.len() - 5..];
        let start_close = recent[0].close.to_f64().unwrap_or(0.0);
        let price_change_pct = (recent.last()?.close.to_f64().unwrap_or(0.0) - start_close)
            / start_close
            * 100.0;
        let delta_pct = total_delta / total_volume * 100.0;
        let current = candles.last()?;
        let close = current.close.to_f64().unwrap_or(0.0);

        if price_change_pct > 0.1 && delta_pct < -self.config.delta_threshold_pct {
            let strength = (delta_pct.abs() / 100.0).min(0.8);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "delta_divergence_bearish",
                    "price_change_pct": price_change_pct,
                    "delta_pct": delta_pct,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::VolumeProfile,
                    Direction::Short,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        if price_change_pct < -0.1 && delta_pct > self.config.delta_threshold_pct {
            let strength = (delta_pct.abs() / 100.0).min(0.8);
            if strength >= self.config.min_strength {
                let metadata = serde_json::json!({
                    "setup": "delta_divergence_bullish",
                    "price_change_pct": price_change_pct,
                    "delta_pct": delta_pct,
                    "close_price": close,
                })
                .to_string();
                return Some(Signal::new(
                    coin,
                    SignalType::VolumeProfile,
                    Direction::Long,
                    strength,
                    current.timestamp,
                    metadata,
                ));
            }
        }
        None
    }
}

impl Default for VolumeProfile {
    fn default() -> Self {
        Self::new(VolumeProfileConfig::default())
    }
}

impl SignalDetector for VolumeProfile {
    fn detect(&mut self, coin: &str, candles: &[Candle]) -> Option<Signal> {
        let profile = self.profile.clone()?;
        if candles.len() < self.config.rejection_lookback {
            return None;
        }
        if !self.cooldown_ok(coin) {
            return None;
        }

        let (val, vah) = value_area(&profile, self.config.value_area_pct)?;
        let poc_price = poc(&profile)?;
        let va_low = val.to_f64().unwrap_or(0.0);
        let va_high = vah.to_f64().unwrap_or(0.0);
        let poc_value = poc_price.to_f64().unwrap_or(0.0);

        let current_price = candles.last()?.close.to_f64().unwrap_or(0.0);
        let buffer = current_price * self.config.va_buffer_pct;

        let signal = self
            .check_failed_auction_low(coin, candles, va_low, va_high, buffer)
            .or_else(|| self.check_failed_auction_high(coin, candles, va_low, va_high, buffer))
            .or_else(|| self.check_va_breakout_up(coin, candles, va_low, va_high, buffer))
            .or_else(|| self.check_va_breakout_down(coin, candles, va_low, va_high, buffer))
            .or_else(|| self.check_poc_bounce(coin, candles, poc_value, buffer))
            .or_else(|| {
                let total_delta = profile.total_delta().to_f64().unwrap_or(0.0);
                let total_volume = profile.total_volume().to_f64().unwrap_or(0.0);
                self.check_delta_divergence(coin, candles, total_delta, total_volume)
            });

        if signal.is_some() {
            self.mark_signalled(coin);
        }
        signal
    }

    fn reset(&mut self, coin: Option<&str>) {
        match coin {
            Some(c) => {
                self.candles_since_signal.remove(c);
            }
            None => self.candles_since_signal.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::AggressorSide;
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

    fn profile_around(poc_price: Decimal) -> SessionProfile {
        let mut p = SessionProfile::new(0, 86_400, dec!(1));
        p.record_trade(poc_price - dec!(2), dec!(10), AggressorSide::Buy);
        p.record_trade(poc_price - dec!(1), dec!(15), AggressorSide::Buy);
        p.record_trade(poc_price, dec!(30), AggressorSide::Buy);
        p.record_trade(poc_price + dec!(1), dec!(15), AggressorSide::Sell);
        p.record_trade(poc_price + dec!(2), dec!(10), AggressorSide::Sell);
        p
    }

    #[test]
    fn no_profile_yields_no_signal() {
        let mut det = VolumeProfile::default();
        let candles: Vec<Candle> = (0..10).map(|i| candle(i, 100.0, 101.0, 99.0, 100.0)).collect();
        assert!(det.detect("BTC", &candles).is_none());
    }

    #[test]
    fn poc_bearish_bounce_is_detected() {
        let mut det = VolumeProfile::new(VolumeProfileConfig {
            min_strength: 0.0,
            cooldown_candles: 0,
            ..VolumeProfileConfig::default()
        });
        det.update_profile(profile_around(dec!(100)));

        let mut candles: Vec<Candle> = (0..6).map(|i| candle(i, 103.0, 104.0, 102.5, 103.0)).collect();
        candles.push(candle(6, 103.0, 103.5, 99.5, 99.0));
        let signal = det.detect("BTC", &candles);
        assert!(signal.is_some());
        assert_eq!(signal.unwrap().direction, Direction::Short);
    }

    #[test]
    fn cooldown_blocks_immediate_repeat() {
        let mut det = VolumeProfile::new(VolumeProfileConfig {
            min_strength: 0.0,
            cooldown_candles: 10,
            ..VolumeProfileConfig::default()
        });
        det.update_profile(profile_around(dec!(100)));
        let candles: Vec<Candle> = (0..6).map(|i| candle(i, 103.0, 104.0, 102.5, 103.0)).collect();
        assert!(det.detect("BTC", &candles).is_none());
    }
}
