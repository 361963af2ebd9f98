//! HTTP server: merges the risk control routes with engine endpoints.
//!
//! Exposes `/orders` and `/metrics` alongside the control routes
//! (`/health`, `/config`, `/counters`).

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;

use rg_core::types::OrderUpdate;
use rg_oms::{EngineSnapshot, Oms};
use rg_risk::{control_router, ControlState, RiskGate};

/// State for the engine-side routes.
pub struct EngineView {
    pub oms: Arc<Oms>,
    pub gate: Arc<RiskGate>,
}

/// `GET /orders`: every active order.
async fn orders_handler(State(view): State<Arc<EngineView>>) -> Json<Vec<OrderUpdate>> {
    let mut orders = view.oms.orders().get_active_orders();
    orders.sort_by(|a, b| a.order_id.cmp(&b.order_id));
    Json(orders)
}

/// `GET /metrics`: simple Prometheus-style text metrics.
async fn metrics_handler(State(view): State<Arc<EngineView>>) -> String {
    let counters = view.gate.counters().snapshot();
    let active = view.gate.get_config().active;

    let mut out = String::new();
    out.push_str(&format!(
        "# HELP riskgate_active Whether the risk gate is evaluating orders\n\
         # TYPE riskgate_active gauge\n\
         riskgate_active {}\n",
        u8::from(active)
    ));
    out.push_str(&format!(
        "# HELP riskgate_active_orders Number of active orders\n\
         # TYPE riskgate_active_orders gauge\n\
         riskgate_active_orders {}\n",
        view.oms.active_order_count()
    ));
    out.push_str(&format!(
        "# HELP riskgate_order_flow Orders counted in the current flow window\n\
         # TYPE riskgate_order_flow gauge\n\
         riskgate_order_flow {}\n",
        counters.order_flow_count
    ));
    out.push_str(&format!(
        "# HELP riskgate_trade_volume Volume traded this session\n\
         # TYPE riskgate_trade_volume counter\n\
         riskgate_trade_volume {}\n",
        counters.trade_count
    ));
    for (instrument, count) in &counters.order_cancel_counts {
        out.push_str(&format!(
            "riskgate_cancels{{instrument=\"{instrument}\"}} {count}\n"
        ));
    }
    out
}

/// Build the combined router.
pub fn router(view: Arc<EngineView>, token: Option<String>) -> Router {
    let control = control_router(Arc::new(ControlState {
        gate: view.gate.clone(),
        token,
    }));
    let engine = Router::new()
        .route("/orders", get(orders_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(view);
    engine.merge(control)
}

/// Serve the combined router until `cancel` fires.
pub async fn run_server(
    view: Arc<EngineView>,
    port: u16,
    token: Option<String>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(view, token);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await?;

    Ok(())
}
