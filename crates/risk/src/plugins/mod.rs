//! Extension rules and the registry that builds them from configuration.
//!
//! Plugins run after the built-in checks, in the order `plugins.enabled`
//! lists them. Each one may load state at startup, observe fills, and write
//! its state back at shutdown.

pub mod max_open;
pub mod order_value;
pub mod symbol_restriction;

use anyhow::{bail, Result};

use rg_core::config::PluginsConfig;

use crate::pipeline::RiskRule;

pub use max_open::IntradayMaxOpen;
pub use order_value::OrderValueLimit;
pub use symbol_restriction::SymbolRestriction;

/// Build one rule per entry in `config.enabled`, preserving order.
///
/// Plugin state is not loaded here; the gate runs each rule's setup hook.
pub fn build_plugins(config: &PluginsConfig) -> Result<Vec<Box<dyn RiskRule>>> {
    config
        .enabled
        .iter()
        .map(|name| build_plugin(name, config))
        .collect()
}

fn build_plugin(name: &str, config: &PluginsConfig) -> Result<Box<dyn RiskRule>> {
    let rule: Box<dyn RiskRule> = match name {
        symbol_restriction::NAME => Box::new(SymbolRestriction::new(&config.symbol_restriction)),
        max_open::NAME => Box::new(IntradayMaxOpen::new(&config.intraday_max_open)),
        order_value::NAME => Box::new(OrderValueLimit::new(&config.order_value_limit)),
        other => bail!("unknown plugin '{other}'"),
    };
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_preserves_order() {
        let config = PluginsConfig {
            enabled: vec![
                "order_value_limit".to_string(),
                "symbol_restriction".to_string(),
            ],
            ..PluginsConfig::default()
        };
        let rules = build_plugins(&config).unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["order_value_limit", "symbol_restriction"]);
    }

    #[test]
    fn test_registry_rejects_unknown_name() {
        let config = PluginsConfig {
            enabled: vec!["symbol_frozen".to_string()],
            ..PluginsConfig::default()
        };
        let err = build_plugins(&config).err().unwrap();
        assert!(err.to_string().contains("symbol_frozen"));
    }

    #[test]
    fn test_empty_registry() {
        assert!(build_plugins(&PluginsConfig::default()).unwrap().is_empty());
    }
}
