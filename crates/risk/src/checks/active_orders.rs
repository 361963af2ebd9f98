//! Live order count limit, queried from the engine snapshot.

use rg_core::types::OrderRequest;

use crate::pipeline::{RiskContext, RiskReject, RiskRule};

/// Rejects requests while `active_order_limit` orders are live.
pub struct ActiveOrderLimitCheck;

impl RiskRule for ActiveOrderLimitCheck {
    fn name(&self) -> &str {
        "active_order_limit"
    }

    fn check(&self, _req: &OrderRequest, ctx: &RiskContext) -> Result<(), RiskReject> {
        let active = ctx.snapshot.active_order_count();
        let limit = ctx.config.active_order_limit;
        if active >= limit {
            return Err(RiskReject::ActiveOrderLimit { active, limit });
        }
        Ok(())
    }
}
