//! Notional value cap scaled by account equity.
//!
//! The cap is `equity / base_account_value * base_max_order_value`, so an
//! account half the baseline size may send orders half the baseline
//! notional. Notional is `volume * price * contract size`. A missing or
//! zero-equity account and a missing contract both reject the order.

use anyhow::Result;

use rg_core::config::OrderValueConfig;
use rg_core::types::OrderRequest;

use crate::pipeline::{RiskContext, RiskReject, RiskRule};
use crate::rejection::LogSink;

pub const NAME: &str = "order_value_limit";

pub struct OrderValueLimit {
    base_account_value: f64,
    base_max_order_value: f64,
}

impl OrderValueLimit {
    pub fn new(config: &OrderValueConfig) -> Self {
        Self {
            base_account_value: config.base_account_value,
            base_max_order_value: config.base_max_order_value,
        }
    }

    /// Largest notional allowed for an account with `equity`.
    pub fn max_order_value(&self, equity: f64) -> f64 {
        equity / self.base_account_value * self.base_max_order_value
    }
}

impl RiskRule for OrderValueLimit {
    fn name(&self) -> &str {
        NAME
    }

    fn setup(&self, log: &dyn LogSink) -> Result<()> {
        log.write_log(&format!(
            "order value limit loaded, base account value {}, base max order value {}",
            self.base_account_value, self.base_max_order_value
        ));
        Ok(())
    }

    fn check(&self, req: &OrderRequest, ctx: &RiskContext) -> Result<(), RiskReject> {
        let equity = match ctx.snapshot.balance(ctx.gateway) {
            Some(b) if b > 0.0 => b,
            _ => {
                return Err(RiskReject::AccountUnavailable {
                    gateway: ctx.gateway.to_string(),
                })
            }
        };

        let instrument = req.instrument();
        let contract = ctx
            .snapshot
            .contract(&instrument)
            .ok_or_else(|| RiskReject::ContractUnavailable {
                instrument: instrument.to_string(),
            })?;

        let value = req.volume as f64 * req.price.to_f64() * contract.size;
        let max = self.max_order_value(equity);
        if value > max {
            return Err(RiskReject::OrderValueLimit { value, max });
        }
        Ok(())
    }
}
