//! Self-trade avoidance against the firm's own resting orders.

use rg_core::types::{Direction, OrderRequest};

use crate::pipeline::{RiskContext, RiskReject, RiskRule};

/// Rejects a buy priced at or above our best resting ask, and a sell priced
/// at or below our best resting bid.
pub struct SelfTradeCheck;

impl RiskRule for SelfTradeCheck {
    fn name(&self) -> &str {
        "self_trade"
    }

    fn check(&self, req: &OrderRequest, ctx: &RiskContext) -> Result<(), RiskReject> {
        let book = ctx.books.book(&req.instrument());
        let book = book.lock();
        match req.direction {
            Direction::Long => {
                if let Some(best_ask) = book.best_ask() {
                    if req.price >= best_ask {
                        return Err(RiskReject::CrossesOwnAsk {
                            price: req.price,
                            best_ask,
                        });
                    }
                }
            }
            Direction::Short => {
                if let Some(best_bid) = book.best_bid() {
                    if req.price <= best_bid {
                        return Err(RiskReject::CrossesOwnBid {
                            price: req.price,
                            best_bid,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
