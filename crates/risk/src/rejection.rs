//! Rejected-order diagnostics and the log sink.
//!
//! Every rejection, whether raised by the gate before submission or reported
//! by the exchange afterwards, becomes a [`RejectionRecord`] handed to a
//! [`RejectionSink`]. Sinks are fire-and-forget: `record` must return
//! immediately and never fail back into the gate.

use serde::{Deserialize, Serialize};

use rg_core::types::{Exchange, OrderId, OrderRequest, OrderUpdate, Symbol, Timestamp};

/// Error code carried by rejections the gate itself produced.
pub const RISK_ERROR_CODE: &str = "RISK";

/// Error code used when an exchange rejection payload is absent or malformed.
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN";

/// Log target for messages written through [`TracingLog`].
pub const LOG_TARGET: &str = "riskgate";

/// A rejected order, ready for the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub symbol: Symbol,
    pub exchange: Exchange,
    /// [`RISK_ERROR_CODE`] for gate rejections, otherwise the exchange code.
    pub error_code: String,
    pub message: String,
    /// Absent for rejections that happened before submission.
    pub order_id: Option<OrderId>,
    pub gateway: String,
    pub timestamp: Timestamp,
}

impl RejectionRecord {
    /// Record for a request the gate refused.
    pub fn from_risk(req: &OrderRequest, gateway: &str, message: impl Into<String>) -> Self {
        Self {
            symbol: req.symbol.clone(),
            exchange: req.exchange,
            error_code: RISK_ERROR_CODE.to_string(),
            message: message.into(),
            order_id: None,
            gateway: gateway.to_string(),
            timestamp: Timestamp::now(),
        }
    }

    /// Record for an order the exchange rejected, parsed from its payload.
    pub fn from_exchange(order: &OrderUpdate) -> Self {
        let (error_code, message) = parse_reject_payload(order.reject_payload.as_deref());
        Self {
            symbol: order.symbol.clone(),
            exchange: order.exchange,
            error_code,
            message,
            order_id: Some(order.order_id.clone()),
            gateway: order.gateway.clone(),
            timestamp: order.timestamp,
        }
    }

    pub fn is_risk(&self) -> bool {
        self.error_code == RISK_ERROR_CODE
    }
}

/// Structured exchange rejection, as gateways report it.
#[derive(Debug, Deserialize)]
struct RejectPayload {
    #[serde(alias = "ErrorID", alias = "error_code")]
    code: Option<serde_json::Value>,
    #[serde(alias = "ErrorMsg", alias = "msg")]
    message: Option<String>,
}

/// Split an exchange rejection payload into `(code, message)`.
///
/// Accepts `{"code": .., "message": ..}` with `ErrorID` / `ErrorMsg`
/// aliases. Anything else yields [`UNKNOWN_ERROR_CODE`] with the raw text as
/// the message.
pub fn parse_reject_payload(payload: Option<&str>) -> (String, String) {
    let raw = match payload.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return (UNKNOWN_ERROR_CODE.to_string(), "unknown rejection".to_string()),
    };

    match serde_json::from_str::<RejectPayload>(raw) {
        Ok(parsed) => {
            let code = match parsed.code {
                Some(serde_json::Value::String(s)) if !s.is_empty() => s,
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => UNKNOWN_ERROR_CODE.to_string(),
            };
            let message = parsed.message.unwrap_or_else(|| raw.to_string());
            (code, message)
        }
        Err(_) => (UNKNOWN_ERROR_CODE.to_string(), raw.to_string()),
    }
}

/// Consumer of rejection records.
pub trait RejectionSink: Send + Sync {
    /// Hand over a record. Must not block.
    fn record(&self, record: RejectionRecord);
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NullSink;

impl RejectionSink for NullSink {
    fn record(&self, _record: RejectionRecord) {}
}

/// Receiver of human-readable state-change and rejection messages.
pub trait LogSink: Send + Sync {
    fn write_log(&self, msg: &str);
}

/// Forwards log messages to `tracing` under the `riskgate` target.
#[derive(Debug, Default)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn write_log(&self, msg: &str) {
        tracing::info!(target: LOG_TARGET, "{msg}");
    }
}
