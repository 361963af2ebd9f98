//! Engine event loop.
//!
//! Gateway callbacks and the timer arrive as [`EngineEvent`]s on a crossbeam
//! channel and are processed on a dedicated OS thread (not a tokio task), one
//! at a time, in arrival order. Each event updates the OMS snapshot first so
//! that the gate's rules see the same state the engine does, then reaches the
//! gate's dispatcher.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use tokio_util::sync::CancellationToken;

use rg_core::types::*;
use rg_oms::Oms;
use rg_risk::RiskGate;

/// Events delivered to the engine thread.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Order status change reported by a gateway.
    Order(OrderUpdate),
    /// Trade fill.
    Trade(TradeFill),
    /// Periodic timer tick.
    Timer(Timestamp),
    Account(AccountData),
    Contract(ContractData),
    Tick(TickData),
}

/// Applies events to the OMS snapshot and the risk gate.
#[derive(Clone)]
pub struct EventRouter {
    oms: Arc<Oms>,
    gate: Arc<RiskGate>,
}

impl EventRouter {
    pub fn new(oms: Arc<Oms>, gate: Arc<RiskGate>) -> Self {
        Self { oms, gate }
    }

    /// Process one event.
    pub fn handle(&self, event: EngineEvent) {
        match event {
            EngineEvent::Order(order) => match self.oms.on_order(&order) {
                Ok(true) => self.gate.on_order(&order),
                Ok(false) => {
                    tracing::debug!(
                        order_id = %order.order_id,
                        status = ?order.status,
                        "duplicate terminal update ignored"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        order_id = %order.order_id,
                        status = ?order.status,
                        error = %e,
                        "order update refused by OMS"
                    );
                    // The venue still reported it: cancel counts and the
                    // book must see terminal states the OMS will not store.
                    if order.status.is_terminal() {
                        self.gate.on_order(&order);
                    }
                }
            },
            EngineEvent::Trade(trade) => self.gate.on_trade(&trade),
            EngineEvent::Timer(_) => self.gate.on_timer(),
            EngineEvent::Account(account) => self.oms.on_account(account),
            EngineEvent::Contract(contract) => self.oms.on_contract(contract),
            EngineEvent::Tick(tick) => self.oms.on_tick(tick),
        }
    }

    /// Process every event already queued on `rx`, without blocking.
    pub fn drain(&self, rx: &Receiver<EngineEvent>) -> usize {
        let mut n = 0;
        for event in rx.try_iter() {
            self.handle(event);
            n += 1;
        }
        n
    }
}

/// Engine loop, run on a dedicated OS thread.
///
/// Returns when `cancel` fires or every sender is dropped.
pub fn event_loop(router: EventRouter, rx: Receiver<EngineEvent>, cancel: CancellationToken) {
    tracing::info!("engine event thread started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        // Block with a timeout so cancellation is noticed.
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => router.handle(event),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("engine event channel disconnected");
                break;
            }
        }
    }

    // Apply whatever the gateway already reported before stopping.
    let remaining = router.drain(&rx);
    tracing::info!(remaining, "engine event thread stopped");
}
