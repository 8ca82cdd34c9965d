//! # Configuration
//!
//! Relaygate configuration is managed by [`clapfig`], which handles layered
//! loading from TOML files, environment variables, and programmatic overrides.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `RELAYGATE__MAX_LOGS_PER_DEVICE`, etc.
//! 2. **Data directory config**: `<data_dir>/relaygate.toml`.
//! 3. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `max_logs_per_device` | `200` | Log entries kept per device bucket |
//! | `default_device_password` | `1234` | Password for devices that arrive without one |
//! | `backup_dir` | `<data_dir>/backups` | Where `relaygate backup` writes files |
//! | `log_json` | `false` | Emit diagnostics as JSON lines |

use crate::model::MAX_LOGS_PER_DEVICE;
use crate::store::StoreOptions;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for relaygate, stored in `relaygate.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RelayGateConfig {
    /// Log entries kept per device before the oldest are dropped.
    #[config(default = 200)]
    pub max_logs_per_device: usize,

    /// Password assigned to devices migrated or imported without one.
    #[config(default = "1234")]
    pub default_device_password: String,

    /// Directory for backup files. Defaults to `backups/` under the data dir.
    pub backup_dir: Option<PathBuf>,

    /// Emit diagnostics as JSON lines instead of text.
    #[config(default = false)]
    pub log_json: bool,
}

impl Default for RelayGateConfig {
    fn default() -> Self {
        Self {
            max_logs_per_device: MAX_LOGS_PER_DEVICE,
            default_device_password: "1234".to_string(),
            backup_dir: None,
            log_json: false,
        }
    }
}

impl RelayGateConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            // A zero cap would drop every entry as it is written.
            max_logs_per_device: self.max_logs_per_device.max(1),
            default_device_password: self.default_device_password.clone(),
        }
    }

    pub fn backup_dir(&self, data_dir: &Path) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("backups"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayGateConfig::default();
        assert_eq!(config.max_logs_per_device, 200);
        assert_eq!(config.default_device_password, "1234");
        assert!(!config.log_json);
    }

    #[test]
    fn test_store_options_follow_config() {
        let config = RelayGateConfig {
            max_logs_per_device: 50,
            default_device_password: "9999".to_string(),
            ..Default::default()
        };
        let options = config.store_options();
        assert_eq!(options.max_logs_per_device, 50);
        assert_eq!(options.default_device_password, "9999");
    }

    #[test]
    fn test_zero_log_cap_is_raised() {
        let config = RelayGateConfig {
            max_logs_per_device: 0,
            ..Default::default()
        };
        assert_eq!(config.store_options().max_logs_per_device, 1);
    }

    #[test]
    fn test_backup_dir_defaults_under_data_dir() {
        let config = RelayGateConfig::default();
        assert_eq!(
            config.backup_dir(Path::new("/data")),
            PathBuf::from("/data/backups")
        );

        let custom = RelayGateConfig {
            backup_dir: Some(PathBuf::from("/elsewhere")),
            ..Default::default()
        };
        assert_eq!(
            custom.backup_dir(Path::new("/data")),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn test_config_parses_from_toml() {
        let config: RelayGateConfig =
            toml::from_str("max_logs_per_device = 10\ndefault_device_password = \"0000\"\nlog_json = true\n")
                .unwrap();
        assert_eq!(config.max_logs_per_device, 10);
        assert!(config.log_json);
        assert!(config.backup_dir.is_none());
    }
}
