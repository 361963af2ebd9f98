//! # rg-risk
//!
//! Pre-trade risk gate. Every order request passes through a chain of
//! checks before reaching the gateway: volume validation, order size,
//! session trade volume, order flow, active order count, per-instrument
//! cancels, and self-trade prevention, followed by any configured plugins.
//! The gate also consumes order, trade, and timer events to keep its
//! counters and active order books current, records every rejection, and
//! exposes an operator control API.

pub mod book;
pub mod checks;
pub mod control;
pub mod counters;
pub mod dispatcher;
pub mod gate;
pub mod pipeline;
pub mod plugins;
pub mod rejection;
pub mod settings;

pub use book::{ActiveOrderBook, OrderBooks};
pub use control::{control_router, ControlState};
pub use counters::{CounterSnapshot, CounterStore};
pub use dispatcher::EventDispatcher;
pub use gate::{RiskGate, RiskGateBuilder};
pub use pipeline::{RejectKind, RiskContext, RiskReject, RiskRule, RuleChain};
pub use plugins::build_plugins;
pub use rejection::{
    parse_reject_payload, LogSink, NullSink, RejectionRecord, RejectionSink, TracingLog,
    RISK_ERROR_CODE, UNKNOWN_ERROR_CODE,
};
pub use settings::{SettingsError, SettingsStore};
