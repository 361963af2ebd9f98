//! Order volume checks: volume must be positive and within the size limit.

use rg_core::types::OrderRequest;

use crate::pipeline::{RiskContext, RiskReject, RiskRule};

/// Rejects requests with zero or negative volume.
pub struct VolumeCheck;

impl RiskRule for VolumeCheck {
    fn name(&self) -> &str {
        "invalid_volume"
    }

    fn check(&self, req: &OrderRequest, _ctx: &RiskContext) -> Result<(), RiskReject> {
        if req.volume <= 0 {
            return Err(RiskReject::InvalidVolume { volume: req.volume });
        }
        Ok(())
    }
}

/// Rejects requests larger than `order_size_limit`.
pub struct OrderSizeCheck;

impl RiskRule for OrderSizeCheck {
    fn name(&self) -> &str {
        "order_size_limit"
    }

    fn check(&self, req: &OrderRequest, ctx: &RiskContext) -> Result<(), RiskReject> {
        let limit = ctx.config.order_size_limit;
        if req.volume > limit {
            return Err(RiskReject::SizeLimit {
                volume: req.volume,
                limit,
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
    fn test_non_positive_volume_rejected() {
        let fx = Fixture::new();
        for volume in [0, -1, -100] {
            let result = VolumeCheck.check(&make_request(Direction::Long, 3850, volume), &fx.ctx());
            assert!(matches!(result, Err(RiskReject::InvalidVolume { .. })));
        }
        assert!(VolumeCheck.check(&make_request(Direction::Long, 3850, 1), &fx.ctx()).is_ok());
    }

    #[test]
    fn test_size_limit_boundary() {
        let mut fx = Fixture::new();
        fx.config.order_size_limit = 100;

        assert!(OrderSizeCheck
            .check(&make_request(Direction::Long, 3850, 100), &fx.ctx())
            .is_ok());
        let result = OrderSizeCheck.check(&make_request(Direction::Long, 3850, 101), &fx.ctx());
        assert_eq!(result, Err(RiskReject::SizeLimit { volume: 101, limit: 100 }));
    }
}
