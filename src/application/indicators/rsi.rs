//! Relative Strength Index: a simple (SMA-of-changes) mode and a Wilder-smoothed mode
//! that seeds with SMA then exponentially smooths.

/// Simple RSI: SMA of gains/losses over the last `period` changes. `RSI in [0,100]`.
pub fn rsi_simple(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }
    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &changes[changes.len() - period..];
    let avg_gain: f64 = recent.iter().map(|&c| c.max(0.0)).sum::<f64>() / period as f64;
    let avg_loss: f64 = recent.iter().map(|&c| (-c).max(0.0)).sum::<f64>() / period as f64;
    Some(rsi_from_averages(avg_gain, avg_loss))
}

/// Wilder-smoothed RSI: seed with SMA over the first `period` changes, then update
/// `avg = (avg*(period-1) + cur)/period` for every subsequent change.
pub fn rsi_wilder(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }
    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let mut avg_gain: f64 =
        changes[..period].iter().map(|&c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss: f64 =
        changes[..period].iter().map(|&c| (-c).max(0.0)).sum::<f64>() / period as f64;

    for &change in &changes[period..] {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }
    Some(rsi_from_averages(avg_gain, avg_loss))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { 50.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
