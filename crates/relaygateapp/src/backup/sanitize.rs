//! Making sure an incoming AppData document will load before it is written.
//!
//! The merge works on raw JSON, so nothing upstream guarantees the result
//! deserializes as [`AppData`]. A document the store can't load comes back
//! empty after the restore and the next save would overwrite everything. So
//! records that would not load (no id, wrong shape) are dropped one by one,
//! and a document that still doesn't load is rejected before the clear.

use crate::error::{GateError, Result};
use crate::model::{AppData, Device, GlobalSettings, LogEntry, RelaySettings, User};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Drop the records the store could not load. Returns how many were dropped.
///
/// Unreadable relay settings are removed from their device rather than
/// dropping the device.
pub fn sanitize_app_data(doc: &mut Value) -> Result<usize> {
    let Value::Object(map) = doc else {
        return Err(GateError::BackupFormat(
            "app data in the backup is not an object".to_string(),
        ));
    };

    let mut dropped = 0;
    if let Some(devices) = map.get_mut("devices") {
        dropped += retain_loadable::<Device>(devices, "device", repair_device);
    }
    if let Some(users) = map.get_mut("users") {
        dropped += retain_loadable::<User>(users, "user", |_| {});
    }
    if let Some(logs) = map.get_mut("logs") {
        match logs {
            Value::Object(buckets) => {
                for entries in buckets.values_mut() {
                    dropped += retain_loadable::<LogEntry>(entries, "log entry", |_| {});
                }
            }
            _ => {
                warn!("logs in the backup are not a map of buckets; dropping them");
                *logs = Value::Object(Map::new());
                dropped += 1;
            }
        }
    }
    let bad_settings = map
        .get("globalSettings")
        .is_some_and(|settings| !loads::<GlobalSettings>(settings));
    if bad_settings {
        warn!("global settings in the backup are unreadable; using defaults");
        map.remove("globalSettings");
        dropped += 1;
    }
    Ok(dropped)
}

/// Fail unless `doc` deserializes as [`AppData`].
pub fn ensure_loadable(doc: &Value) -> Result<()> {
    AppData::deserialize(doc)
        .map(|_| ())
        .map_err(|e| GateError::BackupFormat(format!("app data would not load: {}", e)))
}

fn retain_loadable<T: DeserializeOwned>(
    value: &mut Value,
    what: &'static str,
    repair: fn(&mut Value),
) -> usize {
    let Value::Array(entries) = value else {
        warn!(what, "expected a list in the backup; dropping it");
        *value = Value::Array(Vec::new());
        return 1;
    };

    let before = entries.len();
    entries.retain_mut(|entry| {
        repair(entry);
        let ok = loads::<T>(entry);
        if !ok {
            let id = entry.get("id").and_then(Value::as_str).unwrap_or("<none>");
            warn!(what, id, "dropping a record that would not load");
        }
        ok
    });
    before - entries.len()
}

fn repair_device(device: &mut Value) {
    let Some(fields) = device.as_object_mut() else {
        return;
    };
    let bad = fields
        .get("relaySettings")
        .is_some_and(|s| !s.is_null() && !loads::<RelaySettings>(s));
    if bad {
        warn!("dropping unreadable relay settings from a restored device");
        fields.remove("relaySettings");
    }
}

fn loads<T: DeserializeOwned>(value: &Value) -> bool {
    T::deserialize(value).is_ok()
}
