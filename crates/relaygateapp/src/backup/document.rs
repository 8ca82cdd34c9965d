use crate::error::{GateError, Result};
use crate::store::{AppStore, KeyValueStore};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const BACKUP_VERSION: &str = "1.0";

/// A portable snapshot of every storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Storage key → decoded JSON, or the raw string when it isn't JSON.
    pub data: Map<String, Value>,
}

impl BackupDocument {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read every key from the adapter into a [`BackupDocument`].
///
/// A key that fails to read is skipped with a warning; failing to list keys
/// fails the backup.
pub async fn snapshot_backend<B>(backend: &B) -> Result<BackupDocument>
where
    B: KeyValueStore + ?Sized,
{
    let keys = backend.list_keys().await?;
    let mut data = Map::new();

    for key in keys {
        match backend.get(&key).await {
            Ok(Some(raw)) => {
                let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                data.insert(key, value);
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "skipping unreadable key in backup"),
        }
    }

    Ok(BackupDocument {
        version: BACKUP_VERSION.to_string(),
        timestamp: Utc::now(),
        data,
    })
}

/// Serialize the store's durable state as a backup document.
///
/// Waits for any in-flight save first so the snapshot includes it.
pub async fn create_backup<B: KeyValueStore + 'static>(store: &AppStore<B>) -> Result<String> {
    store.flush().await;
    let document = snapshot_backend(store.backend()).await?;
    info!(keys = document.data.len(), "created backup");
    document.to_json()
}

/// Deterministic file name for a backup taken on `date`.
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("relaygate-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Write today's backup into `dir`, creating it if needed. Returns the path.
pub async fn write_backup_file<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    dir: &Path,
) -> Result<PathBuf> {
    let json = create_backup(store).await?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(backup_file_name(Utc::now().date_naive()));
    tokio::fs::write(&path, json).await.map_err(|e| {
        GateError::Storage(format!("failed to write {}: {}", path.display(), e))
    })?;
    info!(path = %path.display(), "backup written");
    Ok(path)
}
