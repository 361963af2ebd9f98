//! # rg-execution
//!
//! The order-submission seam between the trading engine and its exchange
//! connectors: the raw [`OrderSubmitter`] primitive and the
//! [`InterceptorChain`] that pre-trade checks plug into.

pub mod gateway;

pub use gateway::{ChainError, InterceptorChain, OrderSubmitter, SubmitInterceptor, SubmitOutcome};
