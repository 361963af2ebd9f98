//! Core types for the riskgate platform.
//!
//! Prices are fixed-point so that best-price comparisons on the gate's hot
//! path never touch floating point. Volumes are whole contract lots (`i64`);
//! a signed type lets malformed non-positive requests reach the validation
//! check instead of failing at construction.

pub mod order;
pub mod price;
pub mod timestamp;
pub mod trading;

// Re-export primary types for convenient access via `rg_core::types::*`.
pub use order::{Direction, Exchange, Instrument, Offset, OrderId, OrderStatus, OrderType, Symbol};
pub use price::Price;
pub use timestamp::Timestamp;
pub use trading::{AccountData, ContractData, OrderRequest, OrderUpdate, TickData, TradeFill};

/// Order and trade volume in whole contract lots.
pub type Volume = i64;
