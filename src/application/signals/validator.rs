//! Filters signals by historical prediction accuracy: a signal type (and optionally its
//! strength band) that has consistently predicted the wrong breakout direction gets
//! filtered out, but only once enough samples exist to trust the measurement.

use crate::domain::trading::types::{AccuracyBand, BreakoutDirection, Direction, Signal, SignalType};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    pub min_accuracy: f64,
    pub min_samples: u64,
    pub track_by_strength: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_accuracy: 0.4,
            min_samples: 10,
            track_by_strength: true,
        }
    }
}

/// `[0, 0.25)`, `[0.25, 0.5)`, `[0.5, 0.75)`, `[0.75, 1]`.
fn strength_band_index(strength: f64) -> usize {
    if strength < 0.25 {
        0
    } else if strength < 0.5 {
        1
    } else if strength < 0.75 {
        2
    } else {
        3
    }
}

const STRENGTH_BAND_BOUNDS: [(f64, f64); 4] =
    [(0.0, 0.25), (0.25, 0.5), (0.5, 0.75), (0.75, 1.0)];

pub struct TypeAccuracyReport {
    pub total_signals: u64,
    pub correct_predictions: u64,
    pub accuracy: f64,
    pub strength_bands: Option<[StrengthBandReport; 4]>,
}

#[derive(Clone, Copy)]
pub struct StrengthBandReport {
    pub low: f64,
    pub high: f64,
    pub total: u64,
    pub correct: u64,
    pub accuracy: f64,
}

pub struct SignalValidator {
    config: ValidatorConfig,
    accuracy: HashMap<SignalType, AccuracyBand>,
    strength_bands: HashMap<SignalType, [AccuracyBand; 4]>,
}

impl SignalValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            accuracy: HashMap::new(),
            strength_bands: HashMap::new(),
        }
    }

    /// A signal passes when its type has no tracked history, too few samples to trust,
    /// or accuracy at or above `min_accuracy` (type-level, and strength-band-level when
    /// `track_by_strength` is set and that band itself has enough samples).
    pub fn should_pass(&self, signal: &Signal) -> bool {
        let Some(band) = self.accuracy.get(&signal.signal_type) else {
            return true;
        };
        if band.total_signals < self.config.min_samples {
            return true;
        }
        if band.accuracy() < self.config.min_accuracy {
            return false;
        }

        if self.config.track_by_strength {
            if let Some(bands) = self.strength_bands.get(&signal.signal_type) {
                let idx = strength_band_index(signal.strength);
                let b = &bands[idx];
                if b.total_signals >= self.config.min_samples && b.accuracy() < self.config.min_accuracy {
                    return false;
                }
            }
        }
        true
    }

    /// Called once the outcome of a signal is known (a breakout materialized, or didn't).
    /// `breakout_direction: None` means nothing to correlate with yet, so it's a no-op.
    pub fn record_outcome(&mut self, signal: &Signal, breakout_direction: Option<BreakoutDirection>) {
        let Some(breakout) = breakout_direction else {
            return;
        };
        let expected = match breakout {
            BreakoutDirection::Up => Direction::Long,
            BreakoutDirection::Down => Direction::Short,
        };
        let was_correct = signal.direction == expected;

        let entry = self.accuracy.entry(signal.signal_type).or_default();
        entry.total_signals += 1;
        if was_correct {
            entry.correct_predictions += 1;
        }

        if self.config.track_by_strength {
            let bands = self.strength_bands.entry(signal.signal_type).or_default();
            let idx = strength_band_index(signal.strength);
            bands[idx].total_signals += 1;
            if was_correct {
                bands[idx].correct_predictions += 1;
            }
        }
    }

    pub fn get_accuracy_report(&self) -> HashMap<SignalType, TypeAccuracyReport> {
        let mut report = HashMap::new();
        for (signal_type, band) in self.accuracy.iter() {
            let strength_bands = if self.config.track_by_strength {
                self.strength_bands.get(signal_type).map(|bands| {
                    std::array::from_fn(|i| {
                        let (low, high) = STRENGTH_BAND_BOUNDS[i];
                        StrengthBandReport {
                            low,
                            high,
                            total: bands[i].total_signals,
                            correct: bands[i].correct_predictions,
                            accuracy: bands[i].accuracy(),
                        }
                    })
                })
            } else {
                None
            };

            report.insert(
                *signal_type,
                TypeAccuracyReport {
                    total_signals: band.total_signals,
                    correct_predictions: band.correct_predictions,
                    accuracy: band.accuracy(),
                    strength_bands,
                },
            );
        }
        report
    }

    pub fn reset(&mut self) {
        self.accuracy.clear();
        self.strength_bands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(signal_type: SignalType, direction: Direction, strength: f64) -> Signal {
        Signal::new("BTC", signal_type, direction, strength, 0, "{}")
    }

    #[test]
    fn unknown_type_passes_with_no_history() {
        let v = SignalValidator::new(ValidatorConfig::default());
        assert!(v.should_pass(&signal(SignalType::Rsi, Direction::Long, 0.5)));
    }

    #[test]
    fn insufficient_samples_passes_even_with_bad_accuracy() {
        let mut v = SignalValidator::new(ValidatorConfig::default());
        for _ in 0..5 {
            v.record_outcome(&signal(SignalType::Rsi, Direction::Long, 0.5), Some(BreakoutDirection::Down));
        }
        assert!(v.should_pass(&signal(SignalType::Rsi, Direction::Long, 0.5)));
    }

    #[test]
    fn consistently_wrong_type_is_filtered_after_min_samples() {
        let mut v = SignalValidator::new(ValidatorConfig::default());
        for _ in 0..12 {
            v.record_outcome(&signal(SignalType::Rsi, Direction::Long, 0.5), Some(BreakoutDirection::Down));
        }
        assert!(!v.should_pass(&signal(SignalType::Rsi, Direction::Long, 0.5)));
    }

    #[test]
    fn accurate_type_passes() {
        let mut v = SignalValidator::new(ValidatorConfig::default());
        for _ in 0..12 {
            v.record_outcome(&signal(SignalType::Rsi, Direction::Long, 0.5), Some(BreakoutDirection::Up));
        }
        assert!(v.should_pass(&signal(SignalType::Rsi, Direction::Long, 0.5)));
    }

    #[test]
    fn strength_band_filter_applies_independently_of_overall_accuracy() {
        let mut v = SignalValidator::new(ValidatorConfig::default());
        // Overall: 12 correct highs keep the type accuracy well above threshold...
        for _ in 0..12 {
            v.record_outcome(&signal(SignalType::Rsi, Direction::Long, 0.9), Some(BreakoutDirection::Up));
        }
        // ...but the low-strength band is consistently wrong.
        for _ in 0..12 {
            v.record_outcome(&signal(SignalType::Rsi, Direction::Long, 0.1), Some(BreakoutDirection::Down));
        }
        assert!(v.should_pass(&signal(SignalType::Rsi, Direction::Long, 0.9)));
        assert!(!v.should_pass(&signal(SignalType::Rsi, Direction::Long, 0.1)));
    }

    #[test]
    fn reset_clears_all_tracking() {
        let mut v = SignalValidator::new(ValidatorConfig::default());
        v.record_outcome(&signal(SignalType::Rsi, Direction::Long, 0.5), Some(BreakoutDirection::Up));
        v.reset();
        assert!(v.get_accuracy_report().is_empty());
    }
}
