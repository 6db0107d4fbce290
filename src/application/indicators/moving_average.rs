//! Pure functions over borrowed price slices. No OO state: callers own the history buffer,
//! these just fold over it.

/// Arithmetic mean of the last `period` values. `None` if `len < period`.
pub fn sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let window = &prices[prices.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Latest EMA value, seeded with SMA over the first `period` prices.
pub fn ema(prices: &[f64], period: usize) -> Option<f64> {
    ema_series(prices, period).last().copied()
}

/// Full EMA series. Length is `max(0, len(prices) - period + 1)`.
pub fn ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(prices.len() - period + 1);

    let initial_sma: f64 = prices[..period].iter().sum::<f64>() / period as f64;
    result.push(initial_sma);

    for &price in &prices[period..] {
        let prev = *result.last().expect("seeded above");
        result.push((price - prev) * multiplier + prev);
    }
    result
}
