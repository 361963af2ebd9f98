//! Trading engine: wires all components and manages lifecycle.
//!
//! [`TradingEngine`] owns the OMS snapshot, the risk gate, the paper gateway
//! and the submission chain that routes every order through the gate. `run`
//! spawns the event thread, timer, recorder, and HTTP server, then waits for
//! Ctrl-C and persists gate state on the way out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use rg_core::config::AppConfig;
use rg_core::types::{OrderId, OrderRequest, Timestamp};
use rg_execution::{InterceptorChain, OrderSubmitter, SubmitOutcome};
use rg_oms::Oms;
use rg_recorder::Recorder;
use rg_risk::{build_plugins, NullSink, RejectionSink, RiskGate, SettingsStore};

use crate::event_loop::{self, EngineEvent, EventRouter};
use crate::paper_gateway::PaperGateway;
use crate::server::{self, EngineView};

/// The risk-gated trading engine.
pub struct TradingEngine {
    config: AppConfig,
    oms: Arc<Oms>,
    gate: Arc<RiskGate>,
    gateway: Arc<PaperGateway>,
    chain: Arc<InterceptorChain>,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
    recorder: Option<Recorder>,
    cancel: CancellationToken,
}

impl TradingEngine {
    /// Build the engine from configuration.
    ///
    /// Fails if any configured risk plugin cannot load its state.
    pub fn new(config: AppConfig) -> Result<Self> {
        let oms = Arc::new(Oms::new());
        let (event_tx, event_rx) = channel::unbounded::<EngineEvent>();

        let (recorder, sink): (Option<Recorder>, Arc<dyn RejectionSink>) =
            if config.recorder.enabled {
                let (recorder, handle) = Recorder::new(config.recorder.clone());
                (Some(recorder), Arc::new(handle) as Arc<dyn RejectionSink>)
            } else {
                (None, Arc::new(NullSink) as Arc<dyn RejectionSink>)
            };

        let plugins = build_plugins(&config.plugins)?;
        let gate = RiskGate::builder(oms.clone())
            .config(config.risk.clone())
            .plugins(plugins)
            .settings(SettingsStore::new(&config.settings.path))
            .sink(sink)
            .build()
            .context("risk gate failed to start")?;
        let gate = Arc::new(gate);

        let gateway = Arc::new(PaperGateway::new(
            config.trading.gateway.clone(),
            &config.paper,
            event_tx.clone(),
        )?);

        let mut chain = InterceptorChain::new(gateway.clone());
        chain.add_interceptor(gate.clone());

        tracing::info!(
            gateway = %config.trading.gateway,
            rules = ?gate.rule_names(),
            "engine built"
        );

        Ok(Self {
            config,
            oms,
            gate,
            gateway,
            chain: Arc::new(chain),
            event_tx,
            event_rx,
            recorder,
            cancel: CancellationToken::new(),
        })
    }

    /// Submit an order to the configured gateway through the risk gate.
    pub fn send_order(&self, req: &OrderRequest) -> SubmitOutcome {
        self.chain.submit(req, &self.config.trading.gateway)
    }

    /// Cancel an order on the configured gateway.
    pub fn cancel_order(&self, order_id: &OrderId) -> Result<()> {
        self.chain.cancel_order(order_id, &self.config.trading.gateway)
    }

    pub fn gate(&self) -> &Arc<RiskGate> {
        &self.gate
    }

    pub fn oms(&self) -> &Arc<Oms> {
        &self.oms
    }

    pub fn gateway(&self) -> &Arc<PaperGateway> {
        &self.gateway
    }

    /// Router that applies events to this engine's OMS and gate.
    pub fn router(&self) -> EventRouter {
        EventRouter::new(self.oms.clone(), self.gate.clone())
    }

    /// Receiver of engine events, for driving the router by hand.
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.event_rx
    }

    /// Token that stops `run` when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until Ctrl-C or cancellation, then persist gate state.
    pub async fn run(mut self) -> Result<()> {
        let cancel = self.cancel.clone();

        // ── 1. Recorder task ─────────────────────────────────────
        let recorder_task = self.recorder.take().map(|mut recorder| {
            tokio::spawn(async move {
                if let Err(e) = recorder.run().await {
                    tracing::error!(error = %e, "recorder failed");
                }
            })
        });

        // ── 2. Engine event thread ───────────────────────────────
        let router = self.router();
        let rx = self.event_rx.clone();
        let loop_cancel = cancel.clone();
        let event_thread = std::thread::Builder::new()
            .name("engine-events".into())
            .spawn(move || event_loop::event_loop(router, rx, loop_cancel))?;

        // ── 3. Gateway login ─────────────────────────────────────
        self.gateway.connect();

        // ── 4. HTTP server ───────────────────────────────────────
        let server_task = if self.config.control.enabled {
            let view = Arc::new(EngineView {
                oms: self.oms.clone(),
                gate: self.gate.clone(),
            });
            let port = self.config.control.port;
            let token = self.config.control.token.clone();
            let server_cancel = cancel.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = server::run_server(view, port, token, server_cancel).await {
                    tracing::error!(error = %e, "HTTP server failed");
                }
            }))
        } else {
            None
        };

        // ── 5. Timer task ────────────────────────────────────────
        let timer_tx = self.event_tx.clone();
        let timer_cancel = cancel.clone();
        let timer_ms = self.config.trading.timer_interval_ms;
        let timer_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(timer_ms));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if timer_tx.send(EngineEvent::Timer(Timestamp::now())).is_err() {
                            break;
                        }
                    }
                    _ = timer_cancel.cancelled() => break,
                }
            }
        });

        tracing::info!(
            gateway = %self.config.trading.gateway,
            active = self.gate.get_config().active,
            "engine running"
        );

        // ── Shutdown signal ──────────────────────────────────────
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = cancel.cancelled() => {
                tracing::info!("cancellation token triggered");
            }
        }
        cancel.cancel();

        let _ = timer_task.await;
        if let Some(task) = server_task {
            let _ = task.await;
        }
        if event_thread.join().is_err() {
            tracing::error!("engine event thread panicked");
        }

        let closed = self.gate.close();

        // Dropping the last gate reference closes the recorder channel.
        drop(self);
        if let Some(task) = recorder_task {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                tracing::warn!("recorder did not drain within 5 s");
            }
        }

        closed?;
        tracing::info!("engine stopped");
        Ok(())
    }
}
