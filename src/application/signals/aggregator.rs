//! Batches signals from multiple detectors and answers windowed queries over them.
//! Every time-windowed query here takes an explicit `now: i64` (unix seconds) instead of
//! calling a wall clock, so a backtest driver and a live driver produce byte-identical
//! results given the same candle stream and the same timestamps.

use super::detectors::prev_day_vp::{PrevDayLevels, PrevDayVp};
use super::detectors::volume_profile::VolumeProfile as VpDetector;
use super::detectors::SignalDetector;
use crate::domain::trading::types::{Direction, Signal, SignalType, VolumeProfile as SessionProfile};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    pub max_signals: usize,
    pub signal_ttl_seconds: i64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_signals: 1000,
            signal_ttl_seconds: 300,
        }
    }
}

/// Owns the registered detectors and the rolling signal history. `detectors` is boxed
/// trait objects since each detector type carries its own config/state shape.
pub struct SignalAggregator {
    detectors: Vec<Box<dyn SignalDetector + Send>>,
    config: AggregatorConfig,
    signals: VecDeque<Signal>,
    pending: Vec<Signal>,
}

impl SignalAggregator {
    pub fn new(detectors: Vec<Box<dyn SignalDetector + Send>>, config: AggregatorConfig) -> Self {
        Self {
            detectors,
            config,
            signals: VecDeque::with_capacity(config.max_signals),
            pending: Vec::new(),
        }
    }

    /// Runs every detector over `candles` (oldest-first, most recent last) and records
    /// whatever fires. Returns just the signals produced from this call.
    pub fn process_candle(
        &mut self,
        coin: &str,
        candles: &[crate::domain::trading::types::Candle],
    ) -> Vec<Signal> {
        let mut new_signals = Vec::new();
        for detector in self.detectors.iter_mut() {
            if let Some(signal) = detector.detect(coin, candles) {
                if self.signals.len() >= self.config.max_signals {
                    self.signals.pop_front();
                }
                self.signals.push_back(signal.clone());
                self.pending.push(signal.clone());
                new_signals.push(signal);
            }
        }
        new_signals
    }

    /// Drains and returns pending signals newer than `now - time_window_seconds`.
    pub fn take_pending_signals(&mut self, now: i64, time_window_seconds: i64) -> Vec<Signal> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let cutoff = now - time_window_seconds;
        let valid: Vec<Signal> = self
            .pending
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect();
        self.pending.clear();
        valid
    }

    /// Signals within the window, without clearing them. Optional coin/type filters.
    pub fn get_recent_signals(
        &self,
        now: i64,
        time_window_seconds: i64,
        coin: Option<&str>,
        signal_type: Option<SignalType>,
    ) -> Vec<Signal> {
        let cutoff = now - time_window_seconds;
        self.signals
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .filter(|s| coin.is_none_or(|c| s.coin == c))
            .filter(|s| signal_type.is_none_or(|t| s.signal_type == t))
            .cloned()
            .collect()
    }

    pub fn get_signal_count(
        &self,
        now: i64,
        time_window_seconds: i64,
        coin: Option<&str>,
    ) -> HashMap<SignalType, usize> {
        let mut counts = HashMap::new();
        for signal in self.get_recent_signals(now, time_window_seconds, coin, None) {
            *counts.entry(signal.signal_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn has_conflicting_signals(&self, now: i64, coin: &str, time_window_seconds: i64) -> bool {
        let signals = self.get_recent_signals(now, time_window_seconds, Some(coin), None);
        let has_long = signals.iter().any(|s| s.direction == Direction::Long);
        let has_short = signals.iter().any(|s| s.direction == Direction::Short);
        has_long && has_short
    }

    /// Earlier signals are weighted higher (they're predictive, not confirmatory): a
    /// 3-region piecewise function of signal age peaking at 15-90s.
    fn timing_weight(signal: &Signal, now: i64) -> f64 {
        let age_seconds = (now - signal.timestamp).max(0) as f64;
        let timing_factor = if age_seconds < 15.0 {
            0.5 + age_seconds / 30.0
        } else if age_seconds < 90.0 {
            1.0
        } else {
            (1.0 - (age_seconds - 90.0) / 180.0).max(0.3)
        };
        signal.strength * timing_factor
    }

    /// Direction with the higher total timing-weighted strength, or `None` on a tie or
    /// no signals.
    pub fn get_consensus_direction(
        &self,
        now: i64,
        coin: &str,
        time_window_seconds: i64,
    ) -> Option<Direction> {
        let signals = self.get_recent_signals(now, time_window_seconds, Some(coin), None);
        if signals.is_empty() {
            return None;
        }

        let long_strength: f64 = signals
            .iter()
            .filter(|s| s.direction == Direction::Long)
            .map(|s| Self::timing_weight(s, now))
            .sum();
        let short_strength: f64 = signals
            .iter()
            .filter(|s| s.direction == Direction::Short)
            .map(|s| Self::timing_weight(s, now))
            .sum();

        if long_strength > short_strength {
            Some(Direction::Long)
        } else if short_strength > long_strength {
            Some(Direction::Short)
        } else {
            None
        }
    }

    pub fn get_weighted_signals(
        &self,
        now: i64,
        time_window_seconds: i64,
        coin: Option<&str>,
    ) -> Vec<(Signal, f64)> {
        self.get_recent_signals(now, time_window_seconds, coin, None)
            .into_iter()
            .map(|s| {
                let weight = Self::timing_weight(&s, now);
                (s, weight)
            })
            .collect()
    }

    /// Drops signals older than the configured TTL. Returns how many were removed.
    pub fn clear_old_signals(&mut self, now: i64) -> usize {
        let cutoff = now - self.config.signal_ttl_seconds;
        let before = self.signals.len();
        self.signals.retain(|s| s.timestamp >= cutoff);
        before - self.signals.len()
    }

    pub fn reset(&mut self, coin: Option<&str>) {
        match coin {
            None => {
                self.signals.clear();
                self.pending.clear();
                for detector in self.detectors.iter_mut() {
                    detector.reset(None);
                }
            }
            Some(c) => {
                self.signals.retain(|s| s.coin != c);
                self.pending.retain(|s| s.coin != c);
                for detector in self.detectors.iter_mut() {
                    detector.reset(Some(c));
                }
            }
        }
    }

    /// Pushes a refreshed session profile into the `VolumeProfile` detector, if one is
    /// registered.
    pub fn set_volume_profile(&mut self, profile: SessionProfile) {
        if let Some(detector) = self
            .detectors
            .iter_mut()
            .find_map(|d| d.as_any_mut().downcast_mut::<VpDetector>())
        {
            detector.update_profile(profile);
        }
    }

    /// Pushes the previous session's POC/VAH/VAL into the `PrevDayVp` detector, if one is
    /// registered.
    pub fn set_prev_day_levels(&mut self, levels: PrevDayLevels) {
        if let Some(detector) = self
            .detectors
            .iter_mut()
            .find_map(|d| d.as_any_mut().downcast_mut::<PrevDayVp>())
        {
            detector.set_prev_day_levels(levels);
        }
    }

    pub fn total_signals(&self) -> usize {
        self.signals.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
