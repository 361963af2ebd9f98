//! Layered configuration for the riskgate workspace.
//!
//! Configuration is loaded in layers with increasing priority:
//! 1. Compiled-in defaults (gate inactive, conservative limits)
//! 2. TOML configuration file (if provided)
//! 3. Environment variable overrides (prefix `RISKGATE_`, nested with `__`)
//!
//! The risk limits loaded here are only the starting point. When the
//! persisted settings file named by [`SettingsConfig::path`] exists, the
//! gate overrides the `risk` section with its contents at startup.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Plugin names accepted in `plugins.enabled`.
pub const KNOWN_PLUGINS: &[&str] = &[
    "symbol_restriction",
    "intraday_max_open",
    "order_value_limit",
];

// ── Default value functions ────────────────────────────────────────────

fn default_order_flow_limit() -> u64 {
    50
}

fn default_order_flow_clear() -> u64 {
    1
}

fn default_order_size_limit() -> i64 {
    100
}

fn default_trade_limit() -> i64 {
    1_000
}

fn default_active_order_limit() -> usize {
    50
}

fn default_order_cancel_limit() -> u64 {
    500
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("risk_manager_setting.json")
}

fn default_symbol_max_open_path() -> PathBuf {
    PathBuf::from("symbol_max_open.json")
}

fn default_contract_max_open_path() -> PathBuf {
    PathBuf::from("contract_max_open.json")
}

/// Default equity baseline for the value-limit plugin: 1 000 000.
fn default_base_account_value() -> f64 {
    1_000_000.0
}

/// Default notional cap at the equity baseline: 8 000.
fn default_base_max_order_value() -> f64 {
    8_000.0
}

/// Default recorder batch size: 1 000 rows.
fn default_batch_size() -> usize {
    1_000
}

/// Default recorder flush interval: 1 000 ms.
fn default_flush_interval_ms() -> u64 {
    1_000
}

/// Default recorder queue capacity: 10 000 records.
fn default_channel_capacity() -> usize {
    10_000
}

fn default_control_port() -> u16 {
    8081
}

fn default_gateway() -> String {
    "PAPER".to_string()
}

/// Default timer interval: 1 000 ms, so `order_flow_clear` is in seconds.
fn default_timer_interval_ms() -> u64 {
    1_000
}

fn default_paper_account_id() -> String {
    "paper".to_string()
}

fn default_paper_balance() -> f64 {
    1_000_000.0
}

// ── Configuration structs ──────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Risk limits enforced by the built-in checks.
    pub risk: RiskConfig,
    /// Persisted runtime settings location.
    pub settings: SettingsConfig,
    /// Extension rules, in evaluation order.
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// QuestDB rejection recorder.
    pub recorder: RecorderConfig,
    /// Operator HTTP control API.
    pub control: ControlConfig,
    /// Engine harness settings.
    pub trading: TradingConfig,
    /// Paper gateway simulation parameters.
    #[serde(default)]
    pub paper: PaperConfig,
}

/// Risk limits for the built-in rule chain.
///
/// Also the flat record persisted by the settings store, so field names are
/// part of the on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// When `false` every request is accepted without evaluation.
    #[serde(default)]
    pub active: bool,
    /// Requests allowed per flow window.
    #[serde(default = "default_order_flow_limit")]
    pub order_flow_limit: u64,
    /// Flow window length in timer ticks (seconds at the default interval).
    #[serde(default = "default_order_flow_clear")]
    pub order_flow_clear: u64,
    /// Largest volume a single request may carry.
    #[serde(default = "default_order_size_limit")]
    pub order_size_limit: i64,
    /// Cumulative traded volume allowed per session.
    #[serde(default = "default_trade_limit")]
    pub trade_limit: i64,
    /// Live orders allowed at once.
    #[serde(default = "default_active_order_limit")]
    pub active_order_limit: usize,
    /// Cancellations allowed per instrument per session.
    #[serde(default = "default_order_cancel_limit")]
    pub order_cancel_limit: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            active: false,
            order_flow_limit: default_order_flow_limit(),
            order_flow_clear: default_order_flow_clear(),
            order_size_limit: default_order_size_limit(),
            trade_limit: default_trade_limit(),
            active_order_limit: default_active_order_limit(),
            order_cancel_limit: default_order_cancel_limit(),
        }
    }
}

/// Location of the persisted [`RiskConfig`] record.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

/// Extension rule configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginsConfig {
    /// Plugin names in evaluation order. Unknown names fail validation.
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub symbol_restriction: SymbolRestrictionConfig,
    #[serde(default)]
    pub intraday_max_open: MaxOpenConfig,
    #[serde(default)]
    pub order_value_limit: OrderValueConfig,
}

/// Allow-list or deny-list mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionMode {
    /// Only listed symbols may trade.
    #[default]
    Allow,
    /// Listed symbols may not trade.
    Deny,
}

/// Symbol restriction plugin settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolRestrictionConfig {
    #[serde(default)]
    pub mode: RestrictionMode,
    /// JSON list file (`{"white_list": [...]}` or `{"black_list": [...]}`).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Inline symbols, merged with the file contents.
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Intraday open-interest plugin settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MaxOpenConfig {
    #[serde(default = "default_symbol_max_open_path")]
    pub symbol_path: PathBuf,
    #[serde(default = "default_contract_max_open_path")]
    pub contract_path: PathBuf,
}

impl Default for MaxOpenConfig {
    fn default() -> Self {
        Self {
            symbol_path: default_symbol_max_open_path(),
            contract_path: default_contract_max_open_path(),
        }
    }
}

/// Notional value-limit plugin settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderValueConfig {
    /// Equity `E0` at which the cap equals `base_max_order_value`.
    #[serde(default = "default_base_account_value")]
    pub base_account_value: f64,
    /// Notional cap `V0` at the baseline equity.
    #[serde(default = "default_base_max_order_value")]
    pub base_max_order_value: f64,
}

impl Default for OrderValueConfig {
    fn default() -> Self {
        Self {
            base_account_value: default_base_account_value(),
            base_max_order_value: default_base_max_order_value(),
        }
    }
}

/// QuestDB recorder configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    /// Start the recorder task.
    #[serde(default)]
    pub enabled: bool,
    /// QuestDB ILP endpoint (`host:port`).
    pub questdb_ilp_addr: String,
    /// Batch size before flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Flush interval in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Bounded queue size between the gate and the recorder task.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Operator HTTP control API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_control_port")]
    pub port: u16,
    /// Shared token required by `PUT /config`. Updates are refused when unset.
    #[serde(default)]
    pub token: Option<String>,
}

/// Engine harness configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Gateway name requests are routed to.
    #[serde(default = "default_gateway")]
    pub gateway: String,
    /// Timer event period in milliseconds.
    #[serde(default = "default_timer_interval_ms")]
    pub timer_interval_ms: u64,
}

/// A contract the paper gateway lists at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperContract {
    /// `symbol.EXCHANGE`, e.g. `rb2405.SHFE`.
    pub instrument: String,
    pub size: f64,
    pub pricetick: f64,
}

/// Paper gateway simulation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_paper_account_id")]
    pub account_id: String,
    /// Starting account equity.
    #[serde(default = "default_paper_balance")]
    pub balance: f64,
    #[serde(default)]
    pub contracts: Vec<PaperContract>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            account_id: default_paper_account_id(),
            balance: default_paper_balance(),
            contracts: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration using layered sources.
    ///
    /// 1. Compiled-in defaults.
    /// 2. TOML file at `config_path` (if `Some`).
    /// 3. Environment variable overrides with prefix `RISKGATE_` and `__` as
    ///    the nesting separator (e.g., `RISKGATE_RISK__ORDER_SIZE_LIMIT=20`).
    ///
    /// The result is validated before it is returned.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder()
            // ── Layer 1: compiled-in defaults ───────────────────────
            // Risk
            .set_default("risk.active", false)?
            .set_default("risk.order_flow_limit", 50i64)?
            .set_default("risk.order_flow_clear", 1i64)?
            .set_default("risk.order_size_limit", 100i64)?
            .set_default("risk.trade_limit", 1000i64)?
            .set_default("risk.active_order_limit", 50i64)?
            .set_default("risk.order_cancel_limit", 500i64)?
            // Settings
            .set_default("settings.path", "risk_manager_setting.json")?
            // Recorder
            .set_default("recorder.enabled", false)?
            .set_default("recorder.questdb_ilp_addr", "localhost:9009")?
            .set_default("recorder.batch_size", 1000i64)?
            .set_default("recorder.flush_interval_ms", 1000i64)?
            .set_default("recorder.channel_capacity", 10000i64)?
            // Control API
            .set_default("control.enabled", false)?
            .set_default("control.port", 8081i64)?
            // Trading
            .set_default("trading.gateway", "PAPER")?
            .set_default("trading.timer_interval_ms", 1000i64)?;

        // ── Layer 2: TOML file ─────────────────────────────────────
        if let Some(path) = config_path {
            let path_str = path
                .to_str()
                .context("config path is not valid UTF-8")?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        // ── Layer 3: env var overrides (RISKGATE_ prefix) ──────────
        // The prefix separator must be set explicitly to `_`; the `config`
        // crate otherwise reuses the nesting separator for the prefix.
        builder = builder.add_source(
            Environment::with_prefix("RISKGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration invariants.
    fn validate(&self) -> Result<()> {
        for name in &self.plugins.enabled {
            if !KNOWN_PLUGINS.contains(&name.as_str()) {
                bail!("unknown plugin '{name}' in plugins.enabled (known: {KNOWN_PLUGINS:?})");
            }
        }
        if self.trading.timer_interval_ms == 0 {
            bail!("trading.timer_interval_ms must be positive");
        }
        if self.risk.order_flow_clear == 0 {
            bail!("risk.order_flow_clear must be at least one timer tick");
        }
        let value = &self.plugins.order_value_limit;
        if !(value.base_account_value.is_finite() && value.base_account_value > 0.0) {
            bail!("plugins.order_value_limit.base_account_value must be a positive number");
        }
        if !(value.base_max_order_value.is_finite() && value.base_max_order_value >= 0.0) {
            bail!("plugins.order_value_limit.base_max_order_value must not be negative");
        }
        Ok(())
    }
}
