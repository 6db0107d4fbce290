//! End-of-run metrics: final balance/equity, P&L, win rate, max drawdown, profit factor,
//! and an annualised Sharpe ratio over the sampled equity curve. Scoped to exactly what
//! the orchestrator reports (no benchmark alpha/beta, no calmar).

use crate::domain::trading::types::{EquityPoint, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Default)]
pub struct BacktestMetrics {
    pub final_balance: Decimal,
    pub final_equity: Decimal,
    pub total_pnl: Decimal,
    pub total_pnl_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub win_rate: f64,
    /// `gross_profit / gross_loss`; `+inf` when there were no losing trades.
    pub profit_factor: f64,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    /// Number of equity-curve points between the drawdown's peak and its trough.
    pub max_drawdown_duration_points: usize,
    pub sharpe_ratio: f64,
}

/// `periods_per_year` annualises the Sharpe ratio as `sqrt(periods_per_year / N)` applied
/// to the mean/stddev of inter-point equity returns, where `N` is the number of returns.
pub fn calculate(
    trades: &[Trade],
    equity_curve: &[EquityPoint],
    initial_balance: Decimal,
    final_balance: Decimal,
    periods_per_year: f64,
) -> BacktestMetrics {
    let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(final_balance);
    let total_pnl = final_equity - initial_balance;
    let total_pnl_pct = if initial_balance > Decimal::ZERO {
        (total_pnl / initial_balance * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
    } else {
        0.0
    };

    let winning_trades = trades.iter().filter(|t| t.pnl > Decimal::ZERO).count();
    let win_rate = if trades.is_empty() {
        0.0
    } else {
        winning_trades as f64 / trades.len() as f64
    };

    let gross_profit: Decimal = trades.iter().filter(|t| t.pnl > Decimal::ZERO).map(|t| t.pnl).sum();
    let gross_loss: Decimal = trades.iter().filter(|t| t.pnl < Decimal::ZERO).map(|t| -t.pnl).sum();
    let profit_factor = if gross_loss > Decimal::ZERO {
        (gross_profit / gross_loss).to_f64().unwrap_or(f64::INFINITY)
    } else {
        f64::INFINITY
    };

    let (max_drawdown, max_drawdown_pct, max_drawdown_duration_points) = drawdown(equity_curve);
    let sharpe_ratio = sharpe(equity_curve, periods_per_year);

    BacktestMetrics {
        final_balance,
        final_equity,
        total_pnl,
        total_pnl_pct,
        total_trades: trades.len(),
        winning_trades,
        win_rate,
        profit_factor,
        max_drawdown,
        max_drawdown_pct,
        max_drawdown_duration_points,
        sharpe_ratio,
    }
}

fn drawdown(equity_curve: &[EquityPoint]) -> (Decimal, f64, usize) {
    if equity_curve.is_empty() {
        return (Decimal::ZERO, 0.0, 0);
    }
    let mut peak = equity_curve[0].equity;
    let mut peak_index = 0;
    let mut worst = Decimal::ZERO;
    let mut worst_pct = 0.0;
    let mut worst_duration = 0;

    for (i, point) in equity_curve.iter().enumerate() {
        if point.equity > peak {
            peak = point.equity;
            peak_index = i;
        }
        let dd = peak - point.equity;
        if dd > worst {
            worst = dd;
            worst_pct = if peak > Decimal::ZERO {
                (dd / peak * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
            } else {
                0.0
            };
            worst_duration = i - peak_index;
        }
    }
    (worst, worst_pct, worst_duration)
}

fn sharpe(equity_curve: &[EquityPoint], periods_per_year: f64) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].equity.to_f64()?;
            let curr = w[1].equity.to_f64()?;
            if prev == 0.0 {
                None
            } else {
                Some((curr - prev) / prev)
            }
        })
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev <= 1e-12 {
        return 0.0;
    }
    (mean / std_dev) * (periods_per_year / n).sqrt()
}
