//! # Context Setup
//!
//! Relaygate keeps all of its state in one data directory:
//!
//! ```text
//! <data_dir>/
//!   relaygate.toml   # optional config
//!   store/           # one file per storage key
//!   backups/         # default backup destination
//! ```
//!
//! ## Data Directory Resolution
//!
//! [`data_dir`] picks, in order:
//! 1. An explicit override (the CLI's `--data` flag).
//! 2. The `RELAYGATE_DATA` environment variable, used by tests to isolate state.
//! 3. The OS data directory via the `directories` crate.
//! 4. `./.relaygate` when the OS gives no home directory.
//!
//! [`initialize`] then loads config from the data directory, opens the
//! file-backed store and loads (or migrates) the stored document.

use crate::api::RelayGateApi;
use crate::config::RelayGateConfig;
use crate::store::fs_backend::FsBackend;
use crate::store::{AppStore, InitOutcome};
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::{info, warn};

pub const DATA_DIR_ENV: &str = "RELAYGATE_DATA";
pub const CONFIG_FILE_NAME: &str = "relaygate.toml";

pub struct RelayGateContext {
    pub api: RelayGateApi<FsBackend>,
    pub config: RelayGateConfig,
    pub data_dir: PathBuf,
    pub init_outcome: InitOutcome,
}

pub fn data_dir(data_override: Option<PathBuf>) -> PathBuf {
    if let Some(path) = data_override {
        return path;
    }
    if let Some(path) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "relaygate", "relaygate")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".relaygate"))
}

/// Load the config found in `data_dir`, falling back to defaults.
pub fn load_config(data_dir: &std::path::Path) -> RelayGateConfig {
    Clapfig::builder()
        .app_name("relaygate")
        .file_name(CONFIG_FILE_NAME)
        .search_paths(vec![SearchPath::Path(data_dir.to_path_buf())])
        .search_mode(SearchMode::Merge)
        .load()
        .unwrap_or_default()
}

/// Build the context and load the store.
///
/// An unreadable stored document does not abort startup: the store comes up
/// empty and the outcome is returned for the caller to report.
pub async fn initialize(data_override: Option<PathBuf>) -> RelayGateContext {
    let data_dir = data_dir(data_override);
    let config = load_config(&data_dir);

    let backend = FsBackend::new(data_dir.join("store"));
    let store = AppStore::with_options(backend, config.store_options());
    let api = RelayGateApi::new(store, config.backup_dir(&data_dir));

    let init_outcome = api.initialize().await;
    match &init_outcome {
        InitOutcome::Unreadable(reason) => {
            warn!(data_dir = %data_dir.display(), %reason, "stored data could not be read")
        }
        InitOutcome::Migrated(report) => {
            info!(devices = report.devices, users = report.users, "migrated legacy data")
        }
        _ => {}
    }

    RelayGateContext {
        api,
        config,
        data_dir,
        init_outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewDevice;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_override_wins() {
        let dir = data_dir(Some(PathBuf::from("/tmp/relaygate-test")));
        assert_eq!(dir, PathBuf::from("/tmp/relaygate-test"));
    }

    #[test]
    fn test_config_read_from_data_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "max_logs_per_device = 5\n",
        )
        .unwrap();
        let config = load_config(temp.path());
        assert_eq!(config.max_logs_per_device, 5);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        assert_eq!(load_config(temp.path()), RelayGateConfig::default());
    }

    #[tokio::test]
    async fn test_initialize_persists_between_contexts() {
        let temp = TempDir::new().unwrap();
        let ctx = initialize(Some(temp.path().to_path_buf())).await;
        assert_eq!(ctx.init_outcome, InitOutcome::Empty);
        ctx.api
            .add_device(NewDevice::new("Gate", "0400000000"))
            .await
            .unwrap();

        let again = initialize(Some(temp.path().to_path_buf())).await;
        assert_eq!(again.init_outcome, InitOutcome::Loaded);
        assert_eq!(again.api.store().get_devices().len(), 1);
        assert_eq!(again.api.backup_dir(), temp.path().join("backups"));
    }
}
