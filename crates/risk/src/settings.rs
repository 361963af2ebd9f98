//! Persisted risk settings.
//!
//! The gate's limits survive restarts as a flat JSON record of
//! [`RiskConfig`] fields (`risk_manager_setting.json` by default). Fields
//! missing from the file take their defaults.

use std::io::Write;
use std::path::{Path, PathBuf};

use rg_core::config::RiskConfig;

/// Settings storage errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Check a config before it is applied or saved.
pub fn validate(config: &RiskConfig) -> Result<(), SettingsError> {
    if config.order_flow_clear == 0 {
        return Err(SettingsError::Invalid(
            "order_flow_clear must be at least one timer tick".to_string(),
        ));
    }
    Ok(())
}

/// Replace `path` with `contents` in one step.
///
/// The bytes go to a temp file beside `path`, which is then renamed over it,
/// so a crash mid-write leaves the previous file intact.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Reads and writes the flat settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved config. `Ok(None)` when no file has been written yet.
    pub fn load(&self) -> Result<Option<RiskConfig>, SettingsError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        let config: RiskConfig = serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        validate(&config)?;
        Ok(Some(config))
    }

    /// Write `config` to the settings file.
    pub fn save(&self, config: &RiskConfig) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(config).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, text.as_bytes()).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("risk_manager_setting.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_loads_none() {
        let (_dir, store) = make_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, store) = make_store();
        let config = RiskConfig {
            active: true,
            order_flow_limit: 2,
            ..RiskConfig::default()
        };
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), Some(config));
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let (dir, store) = make_store();
        std::fs::write(store.path(), "{active: yes}").unwrap();

        let config = RiskConfig {
            order_size_limit: 7,
            ..RiskConfig::default()
        };
        store.save(&config).unwrap();
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), Some(config));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("risk_manager_setting.json")]);
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("absent").join("settings.json"));
        let err = store.save(&RiskConfig::default()).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let (_dir, store) = make_store();
        std::fs::write(store.path(), r#"{"active": true, "order_size_limit": 5}"#).unwrap();
        let config = store.load().unwrap().unwrap();
        assert!(config.active);
        assert_eq!(config.order_size_limit, 5);
        assert_eq!(config.trade_limit, 1000);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let (_dir, store) = make_store();
        std::fs::write(store.path(), "{active: yes}").unwrap();
        assert!(matches!(store.load(), Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn test_zero_flow_window_is_invalid() {
        let config = RiskConfig {
            order_flow_clear: 0,
            ..RiskConfig::default()
        };
        assert!(matches!(validate(&config), Err(SettingsError::Invalid(_))));
    }
}
