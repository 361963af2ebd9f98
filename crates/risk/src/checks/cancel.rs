//! Per-instrument cancellation limit.

use rg_core::types::OrderRequest;

use crate::pipeline::{RiskContext, RiskReject, RiskRule};

/// Rejects requests on an instrument once it has seen
/// `order_cancel_limit` cancellations this session.
pub struct CancelLimitCheck;

impl RiskRule for CancelLimitCheck {
    fn name(&self) -> &str {
        "order_cancel_limit"
    }

    fn check(&self, req: &OrderRequest, ctx: &RiskContext) -> Result<(), RiskReject> {
        let instrument = req.instrument();
        let count = ctx.counters.cancel_count(&instrument);
        let limit = ctx.config.order_cancel_limit;
        if count >= limit {
            return Err(RiskReject::CancelLimit {
                instrument: instrument.to_string(),
                count,
                limit,
            });
        }
        Ok(())
    }
}
