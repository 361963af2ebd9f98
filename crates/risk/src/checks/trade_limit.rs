//! Session traded-volume limit.

use rg_core::types::OrderRequest;

use crate::pipeline::{RiskContext, RiskReject, RiskRule};

/// Rejects every request once cumulative traded volume reaches
/// `trade_limit`.
pub struct TradeLimitCheck;

impl RiskRule for TradeLimitCheck {
    fn name(&self) -> &str {
        "trade_limit"
    }

    fn check(&self, _req: &OrderRequest, ctx: &RiskContext) -> Result<(), RiskReject> {
        let traded = ctx.counters.trade_count();
        let limit = ctx.config.trade_limit;
        if traded >= limit {
            return Err(RiskReject::TradeLimit { traded, limit });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::*;
    use rg_core::types::Direction;

    #[test]
    fn test_rejects_at_limit() {
        let mut fx = Fixture::new();
        fx.config.trade_limit = 10;
        let req = make_request(Direction::Long, 3850, 1);

        fx.counters.add_trade(9);
        assert!(TradeLimitCheck.check(&req, &fx.ctx()).is_ok());

        fx.counters.add_trade(1);
        let result = TradeLimitCheck.check(&req, &fx.ctx());
        assert_eq!(result, Err(RiskReject::TradeLimit { traded: 10, limit: 10 }));
    }
}
