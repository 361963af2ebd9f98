//! Routes trading-engine events into the gate's bookkeeping.
//!
//! - order updates maintain the active order books, count cancellations, and
//!   turn exchange rejections into [`RejectionRecord`]s;
//! - trade fills accumulate traded volume and reach every rule's trade hook;
//! - timer ticks drive the flow-control window.

use std::sync::Arc;

use parking_lot::RwLock;

use rg_core::config::RiskConfig;
use rg_core::types::{OrderStatus, OrderUpdate, TradeFill};

use crate::book::OrderBooks;
use crate::counters::CounterStore;
use crate::pipeline::RuleChain;
use crate::rejection::{LogSink, RejectionRecord, RejectionSink};

pub struct EventDispatcher {
    pub(crate) config: Arc<RwLock<RiskConfig>>,
    pub(crate) counters: Arc<CounterStore>,
    pub(crate) books: Arc<OrderBooks>,
    pub(crate) rules: Arc<RuleChain>,
    pub(crate) sink: Arc<dyn RejectionSink>,
    pub(crate) log: Arc<dyn LogSink>,
}

impl EventDispatcher {
    /// Handle an order update.
    pub fn on_order(&self, order: &OrderUpdate) {
        self.books.update(order);

        match order.status {
            OrderStatus::Cancelled => {
                let count = self.counters.record_cancel(&order.instrument());
                tracing::debug!(order_id = %order.order_id, cancels = count, "cancel counted");
            }
            OrderStatus::Rejected => {
                let record = RejectionRecord::from_exchange(order);
                self.log.write_log(&format!(
                    "order {} on {} rejected by exchange: [{}] {}",
                    order.order_id,
                    order.instrument(),
                    record.error_code,
                    record.message
                ));
                self.sink.record(record);
            }
            _ => {}
        }
    }

    /// Handle a trade fill.
    pub fn on_trade(&self, trade: &TradeFill) {
        let total = self.counters.add_trade(trade.volume);
        tracing::debug!(trade_id = %trade.trade_id, volume = trade.volume, total, "trade counted");
        self.rules.on_trade(trade);
    }

    /// Handle one timer tick.
    pub fn on_timer(&self) {
        let clear_after = self.config.read().order_flow_clear;
        if self.counters.on_timer(clear_after) {
            tracing::trace!("order flow window reset");
        }
    }
}
