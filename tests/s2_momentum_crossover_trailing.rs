//! Momentum crossover then trailing: a fast/slow EMA crossover opens a long, and once
//! price pushes past the trail activation level the trailing stop ratchets up and never
//! gives back ground on a subsequent pullback.

use cryptotrade_core::application::position::{PaperFillSimulator, PositionManager, SimulatorConfig};
use cryptotrade_core::application::signals::detectors::momentum::{Momentum, MomentumConfig};
use cryptotrade_core::application::signals::detectors::SignalDetector;
use cryptotrade_core::domain::trading::types::{Candle, Direction, TradeAction, TradePlan};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn candle_at(i: i64, price: f64) -> Candle {
    let price = Decimal::from_f64(price).unwrap();
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

#[tokio::test]
async fn crossover_opens_long_and_trailing_stop_only_ever_rises() {
    let mut candles: Vec<Candle> = (0..25).map(|i| candle_at(i, 100.0)).collect();
    let mut price = 100.0;
    for i in 0..15 {
        price += 0.5;
        candles.push(candle_at(25 + i, price));
    }
    assert!((price - 107.5).abs() < 1e-9);

    let mut detector = Momentum::new(MomentumConfig {
        fast_period: 5,
        slow_period: 10,
        threshold: 1e-4,
    });
    let signal = detector.detect("BTC", &candles).expect("crossover should fire");
    assert_eq!(signal.direction, Direction::Long);

    let mut positions = PositionManager::new(PaperFillSimulator::new(SimulatorConfig::default()));
    let plan = TradePlan {
        action: TradeAction::Long,
        coin: "BTC".to_string(),
        size_pct: 10.0,
        stop_loss: dec!(100),
        take_profit: dec!(150),
        trail_activation: dec!(108.0),
        trail_distance_pct: 0.5,
        confidence: 7,
        reason: "momentum crossover".to_string(),
        signals_considered: vec!["Momentum:LONG".to_string()],
    };
    positions.open_from_plan(&plan, dec!(107.5), 0).unwrap();

    let mut prices = HashMap::new();
    let mut last_stop = Decimal::ZERO;
    for (i, tick) in [dec!(108.2), dec!(108.5), dec!(108.3), dec!(108.1)].into_iter().enumerate() {
        prices.insert("BTC".to_string(), tick);
        positions.check_exits(&prices, i as i64 + 1);
        let managed = positions.position("BTC").expect("stop/target not yet hit");
        assert!(managed.trailing_active, "trailing should be active from the first tick at 108.2");
        assert!(
            managed.trailing_stop >= last_stop,
            "trailing stop must never move down once active"
        );
        last_stop = managed.trailing_stop;
    }

    assert!(
        last_stop >= dec!(107.9575),
        "trailing stop {last_stop} should have risen to at least 107.9575 off the 108.5 high"
    );
}
