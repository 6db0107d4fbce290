//! MACD: align the fast EMA series to the slow one, derive the MACD line point-wise,
//! then take the EMA of that as the signal line.

use super::moving_average::ema_series;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

impl MacdResult {
    pub fn is_bullish(&self) -> bool {
        self.histogram > 0.0
    }

    pub fn is_bearish(&self) -> bool {
        self.histogram < 0.0
    }
}

/// Latest MACD point. Requires `len >= slow + signal - 1` and `fast < slow`.
pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdResult> {
    macd_series(prices, fast, slow, signal).last().copied()
}

/// Full MACD series, one point per aligned index, for crossover detection across the
/// last two points.
pub fn macd_series(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<MacdResult> {
    if fast == 0 || slow == 0 || signal == 0 || fast >= slow {
        return Vec::new();
    }
    let min_required = slow + signal - 1;
    if prices.len() < min_required {
        return Vec::new();
    }

    let fast_ema = ema_series(prices, fast);
    let slow_ema = ema_series(prices, slow);
    if fast_ema.is_empty() || slow_ema.is_empty() {
        return Vec::new();
    }

    let offset = slow - fast;
    let aligned_fast = &fast_ema[offset..];
    let macd_line: Vec<f64> = aligned_fast
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();

    if macd_line.len() < signal {
        return Vec::new();
    }
    let signal_series = ema_series(&macd_line, signal);
    if signal_series.is_empty() {
        return Vec::new();
    }

    let macd_offset = signal - 1;
    macd_line[macd_offset..]
        .iter()
        .zip(signal_series.iter())
        .map(|(&m, &s)| MacdResult {
            macd_line: m,
            signal_line: s,
            histogram: m - s,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_is_empty() {
        let prices: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        assert!(macd_series(&prices, 12, 26, 9).is_empty());
    }

    #[test]
    fn fast_must_be_less_than_slow() {
        let prices: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        assert!(macd_series(&prices, 26, 12, 9).is_empty());
    }

    #[test]
    fn rising_prices_yield_bullish_histogram() {
        let prices: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let result = macd(&prices, 12, 26, 9).unwrap();
        assert!(result.is_bullish());
        assert!(!result.is_bearish());
    }
}
