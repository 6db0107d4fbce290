//! Average True Range. Wilder-smoothed, same shape as RSI.

use crate::domain::trading::types::Candle;
use rust_decimal::prelude::ToPrimitive;

fn true_range(current: &Candle, previous_close: Option<f64>) -> f64 {
    let high = current.high.to_f64().unwrap_or(0.0);
    let low = current.low.to_f64().unwrap_or(0.0);
    let high_low = high - low;
    match previous_close {
        None => high_low,
        Some(prev_close) => {
            let a = (high - prev_close).abs();
            let b = (low - prev_close).abs();
            high_low.max(a).max(b)
        }
    }
}

fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    out.push(true_range(&candles[0], None));
    for i in 1..candles.len() {
        let prev_close = candles[i - 1].close.to_f64().unwrap_or(0.0);
        out.push(true_range(&candles[i], Some(prev_close)));
    }
    out
}

/// Latest ATR. Always non-negative.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    atr_series(candles, period).last().copied()
}

/// Full Wilder-smoothed ATR series.
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period + 1 {
        return Vec::new();
    }
    let trs = true_ranges(candles);
    let mut result = Vec::with_capacity(trs.len() - period + 1);

    let initial: f64 = trs[..period].iter().sum::<f64>() / period as f64;
    result.push(initial);

    let mut current = initial;
    for &tr in &trs[period..] {
        current = (current * (period as f64 - 1.0) + tr) / period as f64;
        result.push(current);
    }
    result
}
