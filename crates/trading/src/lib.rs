//! riskgate trading engine: library interface for integration tests.

pub mod engine;
pub mod event_loop;
pub mod paper_gateway;
pub mod server;
