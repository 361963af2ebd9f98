//! The risk gate: the intercepted order-submission entry point.
//!
//! [`RiskGate`] evaluates each request against the rule chain. On a full
//! pass it counts the request toward the flow window and forwards it
//! verbatim to the underlying submitter; on rejection it emits a
//! [`RejectionRecord`] and never contacts the exchange.
//!
//! Evaluation and the flow-count increment happen under one lock, so two
//! concurrent submissions can never both take the last slot in a window.

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};

use rg_core::config::RiskConfig;
use rg_core::types::{OrderRequest, OrderUpdate, TradeFill};
use rg_execution::{OrderSubmitter, SubmitInterceptor, SubmitOutcome};
use rg_oms::EngineSnapshot;

use crate::book::OrderBooks;
use crate::counters::CounterStore;
use crate::dispatcher::EventDispatcher;
use crate::pipeline::{RiskContext, RiskReject, RiskRule, RuleChain};
use crate::rejection::{LogSink, NullSink, RejectionRecord, RejectionSink, TracingLog};
use crate::settings::{self, SettingsError, SettingsStore};

pub struct RiskGate {
    config: Arc<RwLock<RiskConfig>>,
    counters: Arc<CounterStore>,
    books: Arc<OrderBooks>,
    rules: Arc<RuleChain>,
    dispatcher: EventDispatcher,
    snapshot: Arc<dyn EngineSnapshot>,
    sink: Arc<dyn RejectionSink>,
    log: Arc<dyn LogSink>,
    settings: Option<SettingsStore>,
    submit_lock: Mutex<()>,
}

/// Assembles a [`RiskGate`].
pub struct RiskGateBuilder {
    config: RiskConfig,
    snapshot: Arc<dyn EngineSnapshot>,
    plugins: Vec<Box<dyn RiskRule>>,
    settings: Option<SettingsStore>,
    sink: Arc<dyn RejectionSink>,
    log: Arc<dyn LogSink>,
}

impl RiskGateBuilder {
    /// Limits to start with. A saved settings file, if configured and
    /// present, takes precedence.
    pub fn config(mut self, config: RiskConfig) -> Self {
        self.config = config;
        self
    }

    /// Append extension rules, evaluated after the built-ins in this order.
    pub fn plugins(mut self, plugins: Vec<Box<dyn RiskRule>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    pub fn plugin(mut self, plugin: impl RiskRule + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn settings(mut self, store: SettingsStore) -> Self {
        self.settings = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn RejectionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// Load saved settings, set up every rule, and return the gate.
    ///
    /// Fails if the settings file is unreadable or any rule's setup fails;
    /// the gate never starts with a rule silently missing.
    pub fn build(self) -> Result<RiskGate> {
        let mut config = self.config;
        if let Some(store) = &self.settings {
            if let Some(saved) = store.load().context("failed to load risk settings")? {
                self.log.write_log(&format!(
                    "risk settings loaded from {}",
                    store.path().display()
                ));
                config = saved;
            }
        }
        settings::validate(&config)?;

        let mut chain = RuleChain::with_builtins();
        let plugin_count = self.plugins.len();
        for plugin in self.plugins {
            chain.add_boxed(plugin);
        }
        chain.setup(self.log.as_ref())?;
        self.log
            .write_log(&format!("{plugin_count} risk plugins loaded"));
        self.log.write_log(active_message(config.active));

        let config = Arc::new(RwLock::new(config));
        let counters = Arc::new(CounterStore::new());
        let books = Arc::new(OrderBooks::new());
        let rules = Arc::new(chain);
        let dispatcher = EventDispatcher {
            config: config.clone(),
            counters: counters.clone(),
            books: books.clone(),
            rules: rules.clone(),
            sink: self.sink.clone(),
            log: self.log.clone(),
        };

        Ok(RiskGate {
            config,
            counters,
            books,
            rules,
            dispatcher,
            snapshot: self.snapshot,
            sink: self.sink,
            log: self.log,
            settings: self.settings,
            submit_lock: Mutex::new(()),
        })
    }
}

fn active_message(active: bool) -> &'static str {
    if active {
        "risk control started"
    } else {
        "risk control stopped"
    }
}

impl RiskGate {
    /// Start building a gate that reads live state from `snapshot`.
    pub fn builder(snapshot: Arc<dyn EngineSnapshot>) -> RiskGateBuilder {
        RiskGateBuilder {
            config: RiskConfig::default(),
            snapshot,
            plugins: Vec::new(),
            settings: None,
            sink: Arc::new(NullSink),
            log: Arc::new(TracingLog),
        }
    }

    /// Evaluate a request without forwarding it.
    ///
    /// On a pass the request is counted toward the flow window. On rejection
    /// a record is emitted. A disabled gate passes everything and counts
    /// nothing.
    pub fn check(&self, req: &OrderRequest, gateway: &str) -> Result<(), RiskReject> {
        let _guard = self.submit_lock.lock();
        let config = self.config.read().clone();
        if !config.active {
            return Ok(());
        }

        let ctx = RiskContext {
            gateway,
            config: &config,
            counters: &self.counters,
            books: &self.books,
            snapshot: self.snapshot.as_ref(),
        };
        match self.rules.evaluate(req, &ctx) {
            Ok(()) => {
                self.counters.increment_flow();
                Ok(())
            }
            Err((rule, reject)) => {
                self.reject(req, gateway, &rule, &reject);
                Err(reject)
            }
        }
    }

    /// Check a request and, if it passes, send it through `submitter`.
    pub fn submit(
        &self,
        req: &OrderRequest,
        gateway: &str,
        submitter: &dyn OrderSubmitter,
    ) -> SubmitOutcome {
        if let Err(reject) = self.check(req, gateway) {
            return SubmitOutcome::Rejected {
                reason: reject.to_string(),
            };
        }
        match submitter.send_order(req, gateway) {
            Ok(order_id) => SubmitOutcome::Accepted(order_id),
            Err(e) => {
                tracing::warn!(
                    instrument = %req.instrument(),
                    gateway,
                    error = %e,
                    "order passed risk but submission failed"
                );
                SubmitOutcome::Rejected {
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    fn reject(&self, req: &OrderRequest, gateway: &str, rule: &str, reject: &RiskReject) {
        let instrument = req.instrument();
        tracing::warn!(
            instrument = %instrument,
            gateway,
            rule,
            kind = ?reject.kind(),
            reason = %reject,
            "order rejected by risk gate"
        );
        self.log
            .write_log(&format!("order on {instrument} rejected by {rule}: {reject}"));
        self.sink
            .record(RejectionRecord::from_risk(req, gateway, reject.to_string()));
    }

    /// Current limits.
    pub fn get_config(&self) -> RiskConfig {
        self.config.read().clone()
    }

    /// Replace the limits and persist them.
    pub fn update_config(&self, config: RiskConfig) -> Result<(), SettingsError> {
        settings::validate(&config)?;
        let active = config.active;
        if let Some(store) = &self.settings {
            store.save(&config)?;
        }
        *self.config.write() = config;
        self.log.write_log("risk settings updated");
        self.log.write_log(active_message(active));
        Ok(())
    }

    /// Event entry points for the trading engine.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn on_order(&self, order: &OrderUpdate) {
        self.dispatcher.on_order(order);
    }

    pub fn on_trade(&self, trade: &TradeFill) {
        self.dispatcher.on_trade(trade);
    }

    pub fn on_timer(&self) {
        self.dispatcher.on_timer();
    }

    pub fn counters(&self) -> &CounterStore {
        &self.counters
    }

    pub fn books(&self) -> &OrderBooks {
        &self.books
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.rule_names()
    }

    /// Persist settings and plugin state at end of session.
    pub fn close(&self) -> Result<()> {
        if let Some(store) = &self.settings {
            store
                .save(&self.get_config())
                .context("failed to save risk settings")?;
        }
        self.rules.persist()?;
        self.log.write_log("risk gate closed");
        Ok(())
    }
}

impl SubmitInterceptor for RiskGate {
    fn name(&self) -> &str {
        "risk_gate"
    }

    fn intercept(
        &self,
        req: &OrderRequest,
        gateway: &str,
        next: &dyn OrderSubmitter,
    ) -> SubmitOutcome {
        self.submit(req, gateway, next)
    }
}
