//! The pluggable confirmation gate between the score/threshold decision and plan
//! emission. An LLM-backed or other external oracle is an outside collaborator that
//! would implement this trait; none is provided here.

use crate::domain::trading::types::{Direction, MarketContext, Position, Signal};
use async_trait::async_trait;
use std::collections::HashMap;

/// `confirm` may suspend (an LLM call, a remote policy check) and must be cancellable;
/// a cancelled call is equivalent to "not confirmed" at the call site.
#[async_trait]
pub trait ConfirmationOracle: Send + Sync {
    async fn confirm(
        &self,
        direction: Direction,
        score: f64,
        signals: &[Signal],
        positions: &HashMap<String, Position>,
        context: &MarketContext,
    ) -> (bool, u8, String);
}

/// Default oracle: always confirms with a fixed mid confidence. Used when no external
/// gate is wired in, and in parity tests since it introduces no non-determinism.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirmOracle;

#[async_trait]
impl ConfirmationOracle for AutoConfirmOracle {
    async fn confirm(
        &self,
        _direction: Direction,
        _score: f64,
        _signals: &[Signal],
        _positions: &HashMap<String, Position>,
        _context: &MarketContext,
    ) -> (bool, u8, String) {
        (true, 7, "auto".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn auto_confirm_always_confirms_with_fixed_confidence() {
        let oracle = AutoConfirmOracle;
        let ctx = MarketContext::new("BTC", dec!(100), dec!(1));
        let (confirmed, confidence, reason) = oracle
            .confirm(Direction::Long, 0.9, &[], &HashMap::new(), &ctx)
            .await;
        assert!(confirmed);
        assert_eq!(confidence, 7);
        assert_eq!(reason, "auto");
    }
}
