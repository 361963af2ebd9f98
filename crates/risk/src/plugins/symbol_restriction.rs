//! Symbol allow-list / deny-list.
//!
//! The list is fixed at startup: it comes from a JSON file
//! (`{"white_list": [...]}` in allow mode, `{"black_list": [...]}` in deny
//! mode) plus any symbols given inline in the configuration. Symbols are
//! compared by their bare contract code, e.g. `rb2405` for `rb2405.SHFE`.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;

use rg_core::config::{RestrictionMode, SymbolRestrictionConfig};
use rg_core::types::OrderRequest;

use crate::pipeline::{RiskContext, RiskReject, RiskRule};
use crate::rejection::LogSink;

pub const NAME: &str = "symbol_restriction";

pub struct SymbolRestriction {
    mode: RestrictionMode,
    path: Option<PathBuf>,
    inline: Vec<String>,
    symbols: RwLock<HashSet<String>>,
}

impl SymbolRestriction {
    pub fn new(config: &SymbolRestrictionConfig) -> Self {
        Self {
            mode: config.mode,
            path: config.path.clone(),
            inline: config.symbols.clone(),
            symbols: RwLock::new(HashSet::new()),
        }
    }

    fn list_key(&self) -> &'static str {
        match self.mode {
            RestrictionMode::Allow => "white_list",
            RestrictionMode::Deny => "black_list",
        }
    }

    fn load_file(&self, path: &Path) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let doc: Value = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let key = self.list_key();
        let list = doc
            .get(key)
            .and_then(Value::as_array)
            .with_context(|| format!("{} has no '{key}' array", path.display()))?;
        list.iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .with_context(|| format!("non-string entry in '{key}': {v}"))
            })
            .collect()
    }
}

impl RiskRule for SymbolRestriction {
    fn name(&self) -> &str {
        NAME
    }

    fn setup(&self, log: &dyn LogSink) -> Result<()> {
        let mut loaded: HashSet<String> = self.inline.iter().cloned().collect();
        if let Some(path) = &self.path {
            loaded.extend(self.load_file(path)?);
        }

        let listed: BTreeSet<&String> = loaded.iter().collect();
        let label = match self.mode {
            RestrictionMode::Allow => "allow-list",
            RestrictionMode::Deny => "deny-list",
        };
        log.write_log(&format!("symbol restriction loaded, using {label}: {listed:?}"));
        if self.mode == RestrictionMode::Allow && loaded.is_empty() {
            tracing::warn!("symbol allow-list is empty; every order will be rejected");
        }

        *self.symbols.write() = loaded;
        Ok(())
    }

    fn check(&self, req: &OrderRequest, _ctx: &RiskContext) -> Result<(), RiskReject> {
        let symbol = req.symbol.as_str();
        let listed = self.symbols.read().contains(symbol);
        match (self.mode, listed) {
            (RestrictionMode::Allow, false) => Err(RiskReject::SymbolRestricted {
                symbol: symbol.to_string(),
                reason: "is not on the allow-list",
            }),
            (RestrictionMode::Deny, true) => Err(RiskReject::SymbolRestricted {
                symbol: symbol.to_string(),
                reason: "is on the deny-list",
            }),
            _ => Ok(()),
        }
    }
}
