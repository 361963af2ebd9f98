//! # rg-oms
//!
//! The trading engine's in-memory state as the risk gate sees it: the live
//! order table, account equity per gateway, contract metadata, and the latest
//! tick per instrument. Exposed to the gate through [`EngineSnapshot`].

pub mod order;
pub mod snapshot;

pub use order::{OrderError, OrderManager};
pub use snapshot::{EngineSnapshot, Oms};
