use rust_decimal::Decimal;
use thiserror::Error;

/// Error taxonomy for the pipeline. Structural violations propagate up and stop the
/// run; `InsufficientData`/oracle-cancellation are recovered locally and never reach here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("tick at {tick_timestamp} is earlier than current candle interval start {interval_start}")]
    TickOutOfOrder {
        tick_timestamp: i64,
        interval_start: i64,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid position state for {coin}: {reason}")]
    InvalidPositionState { coin: String, reason: String },

    #[error("insufficient balance for {coin}: need {need}, available {available}")]
    InsufficientBalance {
        coin: String,
        need: Decimal,
        available: Decimal,
    },

    #[error("position too large for {coin}: notional {notional} exceeds cap {cap}")]
    PositionTooLarge {
        coin: String,
        notional: Decimal,
        cap: Decimal,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tick_out_of_order_formats_both_timestamps() {
        let err = PipelineError::TickOutOfOrder {
            tick_timestamp: 10,
            interval_start: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains('1') && msg.contains("10") && msg.contains("20"));
    }

    #[test]
    fn insufficient_balance_formats_amounts() {
        let err = PipelineError::InsufficientBalance {
            coin: "BTC".into(),
            need: dec!(100),
            available: dec!(50),
        };
        let msg = err.to_string();
        assert!(msg.contains("BTC") && msg.contains("100") && msg.contains("50"));
    }
}
