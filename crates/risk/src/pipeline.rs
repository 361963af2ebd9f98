//! Risk rule chain.
//!
//! Every order request passes through a sequence of [`RiskRule`]
//! implementations before it is allowed to reach the exchange connector.
//! Built-in checks come first, then extension rules in registration order.
//! The first rule that fails short-circuits the chain and returns the
//! rejection reason.

use rg_core::config::RiskConfig;
use rg_core::types::*;
use rg_oms::EngineSnapshot;

use crate::book::OrderBooks;
use crate::counters::CounterStore;
use crate::rejection::LogSink;

/// Context available to rules on each evaluation.
pub struct RiskContext<'a> {
    /// Gateway the request is routed to.
    pub gateway: &'a str,
    /// Limits in force for this evaluation.
    pub config: &'a RiskConfig,
    pub counters: &'a CounterStore,
    pub books: &'a OrderBooks,
    /// Live engine state: active orders, accounts, contracts.
    pub snapshot: &'a dyn EngineSnapshot,
}

/// How a rejection should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// The request itself is malformed or forbidden; resubmitting it
    /// unchanged will fail again.
    Validation,
    /// A session limit is currently exhausted; a later resubmission may pass.
    LimitExceeded,
    /// Data the rule needs is missing, so the gate fails closed.
    DependencyUnavailable,
}

/// Reason for rejecting an order during pre-trade evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskReject {
    #[error("invalid volume: {volume} must be positive")]
    InvalidVolume { volume: Volume },
    #[error("size limit: volume {volume} exceeds {limit}")]
    SizeLimit { volume: Volume, limit: Volume },
    #[error("daily trade limit: traded {traded} reached {limit}")]
    TradeLimit { traded: Volume, limit: Volume },
    #[error("flow limit: {count} orders reached {limit} per {window} s")]
    FlowLimit { count: u64, limit: u64, window: u64 },
    #[error("active order limit: {active} active orders reached {limit}")]
    ActiveOrderLimit { active: usize, limit: usize },
    #[error("cancel limit: {count} cancels on {instrument} reached {limit}")]
    CancelLimit {
        instrument: String,
        count: u64,
        limit: u64,
    },
    #[error("crosses own ask: buy at {price} >= resting ask {best_ask}")]
    CrossesOwnAsk { price: Price, best_ask: Price },
    #[error("crosses own bid: sell at {price} <= resting bid {best_bid}")]
    CrossesOwnBid { price: Price, best_bid: Price },
    #[error("symbol restricted: {symbol} {reason}")]
    SymbolRestricted { symbol: String, reason: &'static str },
    #[error("open limit: no opening allowance left for {key} (remaining {remaining})")]
    OpenLimit { key: String, remaining: Volume },
    #[error("order value limit: notional {value:.2} exceeds {max:.2}")]
    OrderValueLimit { value: f64, max: f64 },
    #[error("account unavailable: no equity for gateway {gateway}")]
    AccountUnavailable { gateway: String },
    #[error("contract unavailable: no metadata for {instrument}")]
    ContractUnavailable { instrument: String },
}

impl RiskReject {
    pub fn kind(&self) -> RejectKind {
        match self {
            RiskReject::InvalidVolume { .. }
            | RiskReject::SizeLimit { .. }
            | RiskReject::SymbolRestricted { .. } => RejectKind::Validation,
            RiskReject::AccountUnavailable { .. } | RiskReject::ContractUnavailable { .. } => {
                RejectKind::DependencyUnavailable
            }
            _ => RejectKind::LimitExceeded,
        }
    }
}

/// A single pre-trade rule.
///
/// Built-in checks only implement `check`. Extension rules may also load
/// state at startup (`setup`), react to fills (`on_trade`), and write their
/// state back at shutdown (`persist`). Rules own their state behind their
/// own locks; `check` must not block on I/O.
pub trait RiskRule: Send + Sync {
    /// Name used in configuration, logs, and diagnostics.
    fn name(&self) -> &str;

    /// Load state once, before the gate accepts requests.
    fn setup(&self, _log: &dyn LogSink) -> anyhow::Result<()> {
        Ok(())
    }

    /// Evaluate a request.
    fn check(&self, req: &OrderRequest, ctx: &RiskContext) -> Result<(), RiskReject>;

    /// Observe a trade fill.
    fn on_trade(&self, _trade: &TradeFill) {}

    /// Write state back to storage.
    fn persist(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ordered sequence of rules with short-circuit evaluation.
pub struct RuleChain {
    rules: Vec<Box<dyn RiskRule>>,
}

impl RuleChain {
    /// Create a new, empty chain.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// A chain holding the built-in checks in their fixed order.
    pub fn with_builtins() -> Self {
        use crate::checks::*;

        let mut chain = Self::new();
        chain.add_rule(VolumeCheck);
        chain.add_rule(OrderSizeCheck);
        chain.add_rule(TradeLimitCheck);
        chain.add_rule(FlowLimitCheck);
        chain.add_rule(ActiveOrderLimitCheck);
        chain.add_rule(CancelLimitCheck);
        chain.add_rule(SelfTradeCheck);
        chain
    }

    /// Append a rule to the end of the chain.
    pub fn add_rule(&mut self, rule: impl RiskRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn add_boxed(&mut self, rule: Box<dyn RiskRule>) {
        self.rules.push(rule);
    }

    /// Run every rule against the request.
    ///
    /// Returns `Ok(())` if every rule passes, or the first `RiskReject`
    /// with the name of the rule that raised it.
    pub fn evaluate(
        &self,
        req: &OrderRequest,
        ctx: &RiskContext,
    ) -> Result<(), (String, RiskReject)> {
        for rule in &self.rules {
            rule.check(req, ctx).map_err(|r| (rule.name().to_string(), r))?;
        }
        Ok(())
    }

    /// Forward a fill to every rule's trade hook.
    pub fn on_trade(&self, trade: &TradeFill) {
        for rule in &self.rules {
            rule.on_trade(trade);
        }
    }

    /// Run every rule's setup hook, stopping at the first failure.
    pub fn setup(&self, log: &dyn LogSink) -> anyhow::Result<()> {
        for rule in &self.rules {
            rule.setup(log)
                .map_err(|e| e.context(format!("risk rule '{}' failed to load", rule.name())))?;
        }
        Ok(())
    }

    /// Persist every rule's state. All rules are attempted; the first error
    /// is returned.
    pub fn persist(&self) -> anyhow::Result<()> {
        let mut first_err = None;
        for rule in &self.rules {
            if let Err(e) = rule.persist() {
                tracing::error!(rule = rule.name(), error = %e, "failed to persist rule state");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Returns the number of rules in the chain.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for RuleChain {
    fn default() -> Self {
        Self::new()
    }
}
