//! Built-in risk checks, evaluated in this order ahead of any plugin.

pub mod active_orders;
pub mod cancel;
pub mod flow;
pub mod self_trade;
pub mod trade_limit;
pub mod volume;

pub use active_orders::ActiveOrderLimitCheck;
pub use cancel::CancelLimitCheck;
pub use flow::FlowLimitCheck;
pub use self_trade::SelfTradeCheck;
pub use trade_limit::TradeLimitCheck;
pub use volume::{OrderSizeCheck, VolumeCheck};
