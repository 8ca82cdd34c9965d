use super::merge::merge_app_data;
use super::normalize::{normalize, to_storage_string, BackupShape};
use super::recover::{recover, ParseTier};
use super::sanitize::{ensure_loadable, sanitize_app_data};
use crate::error::{GateError, Result};
use crate::keys::{is_log_key, APP_DATA_KEY};
use crate::model::AppData;
use crate::store::{AppStore, InitOutcome, KeyValueStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// What a restore did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub keys_written: usize,
    pub tier: ParseTier,
    pub shape: BackupShape,
    /// Whether the incoming AppData was merged with an on-device one.
    pub merged: bool,
    pub devices_added: usize,
    pub devices_skipped: usize,
    pub users_added: usize,
    pub logs_adopted: usize,
    /// Backup records dropped because the store could not have loaded them.
    pub entries_dropped: usize,
    /// On-device log keys the backup didn't cover, written back after the clear.
    pub preserved_log_keys: usize,
}

/// On-device log history captured before anything is cleared.
///
/// The on-device AppData is kept whole rather than just the incoming
/// document's `logs`: the merge unions log buckets from both sides, so every
/// on-device bucket survives without caching it separately.
#[derive(Debug, Default)]
struct PreservedLogs {
    /// Raw values of top-level keys with "logs" in the name.
    keys: BTreeMap<String, String>,
    /// The on-device AppData document, when it exists and loads.
    app_data: Option<Value>,
}

/// Restore durable state from backup text.
///
/// Nothing is written until the text has been parsed, normalized and merged in
/// memory. On success the store reloads from the freshly written state.
pub async fn restore_from_backup<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    input: &str,
) -> Result<RestoreReport> {
    let (value, tier) = recover(input)?;
    let (mut mapping, shape) = normalize(value)?;
    if mapping.is_empty() {
        return Err(GateError::EmptyBackup);
    }
    debug!(keys = mapping.len(), tier = tier.as_str(), shape = shape.as_str(), "backup parsed");

    // Let any in-flight save land before reading on-device state.
    store.flush().await;
    let backend = store.backend();
    let existing_keys = backend.list_keys().await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to list keys before restore");
        Vec::new()
    });
    let preserved = preserve_logs(backend, &existing_keys).await;

    let mut report = RestoreReport {
        keys_written: 0,
        tier,
        shape,
        merged: false,
        devices_added: 0,
        devices_skipped: 0,
        users_added: 0,
        logs_adopted: 0,
        entries_dropped: 0,
        preserved_log_keys: 0,
    };

    if let Some(incoming) = mapping.remove(APP_DATA_KEY) {
        let mut incoming = as_document(incoming);
        report.entries_dropped = sanitize_app_data(&mut incoming)?;
        let document = match &preserved.app_data {
            Some(on_device) => {
                let (merged, stats) = merge_app_data(on_device, incoming);
                report.merged = true;
                report.devices_added = stats.devices_added;
                report.devices_skipped = stats.devices_skipped;
                report.users_added = stats.users_added;
                report.logs_adopted = stats.logs_adopted;
                info!(
                    devices_added = stats.devices_added,
                    devices_skipped = stats.devices_skipped,
                    users_added = stats.users_added,
                    "merged backup with on-device data"
                );
                merged
            }
            None => incoming,
        };
        // Last check before anything is cleared.
        ensure_loadable(&document)?;
        mapping.insert(APP_DATA_KEY.to_string(), document);
    }

    clear_existing(backend, &existing_keys, report.merged).await;
    report.keys_written = write_mapping(backend, &mapping).await;

    for (key, raw) in &preserved.keys {
        if mapping.contains_key(key) {
            continue;
        }
        match backend.set(key, raw).await {
            Ok(()) => report.preserved_log_keys += 1,
            Err(e) => warn!(key = %key, error = %e, "failed to re-write preserved log key"),
        }
    }

    if report.keys_written == 0 {
        return Err(GateError::RestoreFailed(
            "no keys could be written".to_string(),
        ));
    }

    if let InitOutcome::Unreadable(reason) = store.force_reinitialization().await {
        return Err(GateError::RestoreFailed(format!(
            "restored data could not be loaded: {}",
            reason
        )));
    }
    info!(
        keys_written = report.keys_written,
        merged = report.merged,
        "restore complete"
    );
    Ok(report)
}

/// Read a backup file and restore from it.
pub async fn restore_from_file<B: KeyValueStore + 'static>(
    store: &AppStore<B>,
    path: &Path,
) -> Result<RestoreReport> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8_lossy(&bytes);
    restore_from_backup(store, &text).await
}

async fn preserve_logs<B: KeyValueStore + ?Sized>(backend: &B, keys: &[String]) -> PreservedLogs {
    let mut preserved = PreservedLogs::default();
    for key in keys {
        let wanted = is_log_key(key) || key == APP_DATA_KEY;
        if !wanted {
            continue;
        }
        let raw = match backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                warn!(key = %key, error = %e, "could not read key to preserve");
                continue;
            }
        };
        if key == APP_DATA_KEY {
            match serde_json::from_str::<Value>(&raw) {
                Ok(doc) if AppData::deserialize(&doc).is_ok() => preserved.app_data = Some(doc),
                Ok(_) | Err(_) => {
                    warn!("on-device app data is unreadable; backup will replace it")
                }
            }
        } else {
            preserved.keys.insert(key.clone(), raw);
        }
    }
    preserved
}

/// Backups from some builds carry the AppData document as a JSON string.
fn as_document(value: Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

async fn clear_existing<B: KeyValueStore + ?Sized>(backend: &B, keys: &[String], keep_app_data: bool) {
    let doomed: Vec<String> = keys
        .iter()
        .filter(|k| !(keep_app_data && k.as_str() == APP_DATA_KEY))
        .cloned()
        .collect();
    if let Err(e) = backend.multi_remove(&doomed).await {
        warn!(error = %e, "failed to clear every key before restore");
    }
}

async fn write_mapping<B: KeyValueStore + ?Sized>(backend: &B, mapping: &Map<String, Value>) -> usize {
    let mut written = 0;
    for (key, value) in mapping {
        match backend.set(key, &to_storage_string(value)).await {
            Ok(()) => written += 1,
            Err(e) => warn!(key = %key, error = %e, "failed to write restored key"),
        }
    }
    written
}
