//! Volume profile POC test, bearish: price pushes above the point of control, then falls
//! back through it and closes below both the POC and the prior candle's close. The
//! detector reads this as rejection at the high-volume node and emits a SHORT.

use cryptotrade_core::application::indicators::volume_profile::poc;
use cryptotrade_core::application::signals::detectors::volume_profile::{VolumeProfile, VolumeProfileConfig};
use cryptotrade_core::application::signals::detectors::SignalDetector;
use cryptotrade_core::domain::trading::types::{AggressorSide, Candle, Direction, VolumeProfile as SessionProfile};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
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

/// A volume-weighted profile with its heaviest node sitting at `poc_price`, built the same
/// way a session's worth of trades would accumulate it.
fn profile_around(poc_price: Decimal) -> SessionProfile {
    let mut p = SessionProfile::new(0, 86_400, dec!(1));
    p.record_trade(poc_price - dec!(20), dec!(10), AggressorSide::Buy);
    p.record_trade(poc_price - dec!(10), dec!(15), AggressorSide::Buy);
    p.record_trade(poc_price, dec!(30), AggressorSide::Buy);
    p.record_trade(poc_price + dec!(10), dec!(15), AggressorSide::Sell);
    p.record_trade(poc_price + dec!(20), dec!(10), AggressorSide::Sell);
    p
}

#[tokio::test]
async fn rejection_at_poc_emits_a_short() {
    let profile = profile_around(dec!(50000));
    assert_eq!(poc(&profile), Some(dec!(50000)));

    let mut detector = VolumeProfile::new(VolumeProfileConfig {
        min_strength: 0.0,
        cooldown_candles: 0,
        ..VolumeProfileConfig::default()
    });
    detector.update_profile(profile);

    // Prior candles hold just inside the value area, above the POC; the latest candle
    // pokes down through the POC's buffer and closes below both the POC and the prior
    // close, without ever breaching the value-area edges (which would instead trip the
    // failed-auction setups ahead of this one in priority order).
    let mut candles: Vec<Candle> = (0..5).map(|i| candle(i, 50020.0, 50030.0, 50010.0, 50020.0)).collect();
    candles.push(candle(5, 50020.0, 50025.0, 49950.0, 49900.0));

    let signal = detector.detect("BTC", &candles).expect("rejection at the POC should fire");
    assert_eq!(signal.direction, Direction::Short);
    assert!(signal.metadata.contains("poc_bounce"));
}
