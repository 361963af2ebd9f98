//! # rg-core
//!
//! Shared types, configuration, and logging for the riskgate pre-trade risk
//! gate.
//!
//! Every other crate in the workspace builds on these: instrument and order
//! enums, the fixed-point [`types::Price`], wall-clock [`types::Timestamp`]s,
//! the order/trade/account/contract records exchanged with the trading
//! engine, the layered [`config::AppConfig`], and [`logging::init_tracing`].

pub mod config;
pub mod logging;
pub mod types;
