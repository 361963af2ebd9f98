//! Intraday opening-volume allowance per product and per contract.
//!
//! Two flat JSON files map a key to the opening volume still allowed this
//! session: `symbol_max_open.json` is keyed by product prefix (`RB`, `IF`),
//! `contract_max_open.json` by exact contract (`EC2406`). Keys absent from
//! both files are unrestricted. Opening trades draw the allowance down, and
//! the remaining values are written back to the same files at shutdown so the
//! next start resumes where this session left off.
//!
//! An allowance never goes below zero. A fill larger than what remains
//! (possible when several opening orders were in flight at once) pins the
//! key at zero and logs the overshoot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use rg_core::config::MaxOpenConfig;
use rg_core::types::{OrderRequest, TradeFill, Volume};

use crate::pipeline::{RiskContext, RiskReject, RiskRule};
use crate::rejection::LogSink;
use crate::settings::write_atomic;

pub const NAME: &str = "intraday_max_open";

#[derive(Debug, Default)]
struct Allowances {
    by_product: BTreeMap<String, Volume>,
    by_contract: BTreeMap<String, Volume>,
}

pub struct IntradayMaxOpen {
    symbol_path: PathBuf,
    contract_path: PathBuf,
    state: Mutex<Allowances>,
}

impl IntradayMaxOpen {
    pub fn new(config: &MaxOpenConfig) -> Self {
        Self {
            symbol_path: config.symbol_path.clone(),
            contract_path: config.contract_path.clone(),
            state: Mutex::new(Allowances::default()),
        }
    }

    /// Remaining allowance for a product prefix, if tracked.
    pub fn product_remaining(&self, product: &str) -> Option<Volume> {
        self.state.lock().by_product.get(product).copied()
    }

    /// Remaining allowance for a contract, if tracked.
    pub fn contract_remaining(&self, contract: &str) -> Option<Volume> {
        self.state.lock().by_contract.get(contract).copied()
    }
}

fn load_map(path: &Path) -> Result<BTreeMap<String, Volume>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: BTreeMap<String, Volume> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k.to_ascii_uppercase(), v))
        .collect())
}

fn save_map(path: &Path, map: &BTreeMap<String, Volume>) -> Result<()> {
    let text = serde_json::to_string_pretty(map)?;
    write_atomic(path, text.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Draw `volume` from `key`'s allowance if the key is tracked.
fn draw(map: &mut BTreeMap<String, Volume>, key: &str, volume: Volume) {
    if let Some(remaining) = map.get_mut(key) {
        let next = *remaining - volume;
        if next < 0 {
            tracing::warn!(
                key,
                remaining = *remaining,
                volume,
                "opening fill exceeds remaining allowance; pinning at zero"
            );
        }
        *remaining = next.max(0);
    }
}

impl RiskRule for IntradayMaxOpen {
    fn name(&self) -> &str {
        NAME
    }

    fn setup(&self, log: &dyn LogSink) -> Result<()> {
        let by_product = load_map(&self.symbol_path)?;
        let by_contract = load_map(&self.contract_path)?;
        log.write_log(&format!(
            "intraday max open loaded, {} products from {}, {} contracts from {}",
            by_product.len(),
            self.symbol_path.display(),
            by_contract.len(),
            self.contract_path.display()
        ));

        let mut state = self.state.lock();
        state.by_product = by_product;
        state.by_contract = by_contract;
        Ok(())
    }

    fn check(&self, req: &OrderRequest, _ctx: &RiskContext) -> Result<(), RiskReject> {
        if !req.offset.is_open() {
            return Ok(());
        }
        let product = req.symbol.product();
        let contract = req.symbol.contract();

        let state = self.state.lock();
        if let Some(&remaining) = state.by_product.get(&product) {
            if remaining <= 0 {
                return Err(RiskReject::OpenLimit {
                    key: product,
                    remaining,
                });
            }
        }
        if let Some(&remaining) = state.by_contract.get(&contract) {
            if remaining <= 0 {
                return Err(RiskReject::OpenLimit {
                    key: contract,
                    remaining,
                });
            }
        }
        Ok(())
    }

    fn on_trade(&self, trade: &TradeFill) {
        if !trade.offset.is_open() {
            return;
        }
        let mut state = self.state.lock();
        draw(&mut state.by_product, &trade.symbol.product(), trade.volume);
        draw(&mut state.by_contract, &trade.symbol.contract(), trade.volume);
    }

    fn persist(&self) -> Result<()> {
        let state = self.state.lock();
        save_map(&self.symbol_path, &state.by_product)?;
        save_map(&self.contract_path, &state.by_contract)?;
        tracing::info!(
            symbol_path = %self.symbol_path.display(),
            contract_path = %self.contract_path.display(),
            "open allowances saved"
        );
        Ok(())
    }
}
