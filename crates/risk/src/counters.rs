//! Rolling session counters read by the built-in checks.
//!
//! Each counter category synchronizes on its own: the flow and trade
//! counters are atomics, and cancel counts live in a `DashMap` keyed by
//! instrument.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use rg_core::types::{Instrument, Volume};

/// Flow, trade, and cancel counters for one trading session.
#[derive(Debug, Default)]
pub struct CounterStore {
    flow_count: AtomicU64,
    flow_ticks: AtomicU64,
    trade_count: AtomicI64,
    cancel_counts: DashMap<Instrument, u64>,
}

/// Point-in-time copy of the counters, for the control API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterSnapshot {
    pub order_flow_count: u64,
    pub order_flow_timer: u64,
    pub trade_count: Volume,
    /// Keyed by `symbol.EXCHANGE`.
    pub order_cancel_counts: BTreeMap<String, u64>,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests accepted in the current flow window.
    pub fn flow_count(&self) -> u64 {
        self.flow_count.load(Ordering::Acquire)
    }

    /// Count one accepted request.
    pub fn increment_flow(&self) -> u64 {
        self.flow_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Advance the flow timer by one tick. When `clear_after` ticks have
    /// elapsed the flow count and the tick counter both return to zero.
    ///
    /// Returns `true` if the window was reset.
    pub fn on_timer(&self, clear_after: u64) -> bool {
        let ticks = self.flow_ticks.fetch_add(1, Ordering::AcqRel) + 1;
        if ticks >= clear_after {
            self.flow_ticks.store(0, Ordering::Release);
            self.flow_count.store(0, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Cumulative traded volume this session.
    pub fn trade_count(&self) -> Volume {
        self.trade_count.load(Ordering::Acquire)
    }

    pub fn add_trade(&self, volume: Volume) -> Volume {
        self.trade_count.fetch_add(volume, Ordering::AcqRel) + volume
    }

    /// Count one cancellation on `instrument`, returning the new total.
    pub fn record_cancel(&self, instrument: &Instrument) -> u64 {
        let mut count = self.cancel_counts.entry(instrument.clone()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn cancel_count(&self, instrument: &Instrument) -> u64 {
        self.cancel_counts.get(instrument).map(|c| *c).unwrap_or(0)
    }

    /// Clear all counters at session start.
    pub fn reset_session(&self) {
        self.flow_count.store(0, Ordering::Release);
        self.flow_ticks.store(0, Ordering::Release);
        self.trade_count.store(0, Ordering::Release);
        self.cancel_counts.clear();
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            order_flow_count: self.flow_count(),
            order_flow_timer: self.flow_ticks.load(Ordering::Acquire),
            trade_count: self.trade_count(),
            order_cancel_counts: self
                .cancel_counts
                .iter()
                .map(|e| (e.key().to_string(), *e.value()))
                .collect(),
        }
    }
}
