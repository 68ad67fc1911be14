//! Vault configuration
//!
//! Loaded from JSON. Every field has a default, so an empty object is a
//! valid config describing an in-memory vault.
//!
//! ```json
//! {
//!   "layout_id": "treasury",
//!   "store_dir": "/var/lib/custody",
//!   "v2_defaults": { "max_per_operation": "5000", "min_interval": 3600 }
//! }
//! ```
//!
//! Amounts are decimal strings.

use custody_types::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{ConfigError, StoreError};
use crate::migration::MigrateToV2;
use crate::store::{FileStore, LayoutId, LayoutStore, MemoryStore};

/// Default record identifier.
pub const DEFAULT_LAYOUT_ID: &str = "custody-vault";

/// Default minimum interval between withdrawals of one asset (24h).
pub const DEFAULT_MIN_INTERVAL: u64 = 86_400;

/// Seed values for the v2 migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct V2Defaults {
    /// `0` disables the cap.
    pub max_per_operation: Amount,
    /// Seconds. `0` disables the interval rule.
    pub min_interval: u64,
}

impl Default for V2Defaults {
    fn default() -> Self {
        Self {
            max_per_operation: Decimal::ZERO,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl From<&V2Defaults> for MigrateToV2 {
    fn from(defaults: &V2Defaults) -> Self {
        MigrateToV2::new(defaults.max_per_operation, defaults.min_interval)
    }
}

/// Configuration for a custody vault instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Identifier of the layout record.
    pub layout_id: String,
    /// Directory for the file store. `None` keeps the layout in memory.
    pub store_dir: Option<PathBuf>,
    pub v2_defaults: V2Defaults,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            layout_id: DEFAULT_LAYOUT_ID.to_string(),
            store_dir: None,
            v2_defaults: V2Defaults::default(),
        }
    }
}

impl VaultConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&json)
    }

    pub fn layout_id(&self) -> Result<LayoutId, StoreError> {
        LayoutId::new(self.layout_id.clone())
    }

    /// Build the configured store.
    pub fn open_store(&self) -> Result<Box<dyn LayoutStore>, StoreError> {
        match &self.store_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Box::new(FileStore::new(dir.clone())))
            }
            None => Ok(Box::new(MemoryStore::new())),
        }
    }

    /// The v2 migration seeded from `v2_defaults`.
    pub fn v2_migration(&self) -> MigrateToV2 {
        MigrateToV2::from(&self.v2_defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_object_is_default() {
        let config = VaultConfig::from_json_str("{}").unwrap();
        assert_eq!(config, VaultConfig::default());
        assert_eq!(config.v2_defaults.min_interval, DEFAULT_MIN_INTERVAL);
    }

    #[test]
    fn test_parse_full_config() {
        let config = VaultConfig::from_json_str(
            r#"{
                "layout_id": "treasury",
                "store_dir": "/tmp/custody",
                "v2_defaults": { "max_per_operation": "5000", "min_interval": 3600 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.layout_id().unwrap().as_str(), "treasury");
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/custody")));
        let migration = config.v2_migration();
        assert_eq!(migration.max_per_operation, Decimal::from(5000));
        assert_eq!(migration.min_interval, 3600);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = VaultConfig::from_json_str(r#"{ "layoutid": "x" }"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_layout_id_surfaces_on_use() {
        let config = VaultConfig {
            layout_id: "bad id".to_string(),
            ..VaultConfig::default()
        };
        assert!(config.layout_id().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.json");
        fs::write(&path, r#"{ "layout_id": "cold" }"#).unwrap();
        let config = VaultConfig::load(&path).unwrap();
        assert_eq!(config.layout_id, "cold");
    }

    #[test]
    fn test_load_missing_file() {
        let result = VaultConfig::load(Path::new("/nonexistent/custody/vault.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_open_file_store_creates_dir() {
        let dir = TempDir::new().unwrap();
        let config = VaultConfig {
            store_dir: Some(dir.path().join("layouts")),
            ..VaultConfig::default()
        };
        config.open_store().unwrap();
        assert!(dir.path().join("layouts").is_dir());
    }
}
