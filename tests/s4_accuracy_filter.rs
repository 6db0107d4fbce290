//! Accuracy filter: once a signal type's tracked accuracy falls below the configured
//! floor (with enough samples to trust it), the validator starts rejecting further
//! signals of that type regardless of how strong they look.

use cryptotrade_core::application::signals::{SignalValidator, ValidatorConfig};
use cryptotrade_core::domain::trading::types::{BreakoutDirection, Direction, Signal, SignalType};

fn momentum_long(strength: f64) -> Signal {
    Signal::new("BTC", SignalType::Momentum, Direction::Long, strength, 0, "{}")
}

#[tokio::test]
async fn a_consistently_wrong_signal_type_is_filtered_out() {
    let mut validator = SignalValidator::new(ValidatorConfig {
        min_accuracy: 0.4,
        min_samples: 10,
        track_by_strength: true,
    });

    for _ in 0..12 {
        validator.record_outcome(&momentum_long(0.6), Some(BreakoutDirection::Down));
    }

    let thirteenth = momentum_long(0.8);
    assert!(!validator.should_pass(&thirteenth));
}

#[tokio::test]
async fn under_min_samples_everything_still_passes() {
    let mut validator = SignalValidator::new(ValidatorConfig {
        min_accuracy: 0.4,
        min_samples: 10,
        track_by_strength: true,
    });

    for _ in 0..9 {
        validator.record_outcome(&momentum_long(0.6), Some(BreakoutDirection::Down));
    }

    assert!(validator.should_pass(&momentum_long(0.8)));
}
