//! # rg-recorder
//!
//! Rejection recording to QuestDB via the InfluxDB Line Protocol. The gate
//! hands each [`rg_risk::RejectionRecord`] to a non-blocking
//! [`RecorderHandle`]; a background task batches the records into the
//! `order_error` table.

pub mod questdb;
pub mod recorder;

pub use questdb::{QuestDbClient, QuestDbError};
pub use recorder::{Recorder, RecorderHandle, RecorderMetrics};
