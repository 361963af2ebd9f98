//! Order flow control.
//!
//! The gate increments the flow counter for every request that passes the
//! whole chain; the timer resets it every `order_flow_clear` ticks. This
//! check only compares the current count against the limit.

use rg_core::types::OrderRequest;

use crate::pipeline::{RiskContext, RiskReject, RiskRule};

/// Rejects requests once `order_flow_limit` requests have passed in the
/// current window.
pub struct FlowLimitCheck;

impl RiskRule for FlowLimitCheck {
    fn name(&self) -> &str {
        "order_flow_limit"
    }

    fn check(&self, _req: &OrderRequest, ctx: &RiskContext) -> Result<(), RiskReject> {
        let count = ctx.counters.flow_count();
        let limit = ctx.config.order_flow_limit;
        if count >= limit {
            return Err(RiskReject::FlowLimit {
                count,
                limit,
                window: ctx.config.order_flow_clear,
            });
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
    fn test_flow_limit_and_reset() {
        let mut fx = Fixture::new();
        fx.config.order_flow_limit = 2;
        let req = make_request(Direction::Long, 3850, 1);

        fx.counters.increment_flow();
        assert!(FlowLimitCheck.check(&req, &fx.ctx()).is_ok());
        fx.counters.increment_flow();
        assert!(matches!(
            FlowLimitCheck.check(&req, &fx.ctx()),
            Err(RiskReject::FlowLimit { count: 2, limit: 2, .. })
        ));

        fx.counters.on_timer(fx.config.order_flow_clear);
        assert!(FlowLimitCheck.check(&req, &fx.ctx()).is_ok());
    }
}
