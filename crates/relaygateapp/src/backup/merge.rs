//! Reconciling an incoming AppData document with the one already on-device.
//!
//! Works on raw JSON so fields this release doesn't know about survive the
//! round trip. Rules:
//!
//! - **Devices** and **users**: union by id. On-device records keep their
//!   position and win on id collision; unseen backup records are appended.
//!   Keeping on-device users keeps every authorization edge of a kept device
//!   pointing at a user. Backup records without an id are skipped.
//! - **Logs**: per bucket. A bucket only the backup has is adopted whole. When
//!   both sides have one, backup entries with unseen ids go first, followed by
//!   every on-device entry. Buckets only the device has are kept.
//! - **Everything else** (settings) comes from the backup.

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub devices_added: usize,
    pub devices_skipped: usize,
    pub users_added: usize,
    pub logs_adopted: usize,
}

/// Merge `backup` onto `on_device`, returning the document to write.
pub fn merge_app_data(on_device: &Value, backup: Value) -> (Value, MergeStats) {
    let mut stats = MergeStats::default();
    let mut merged = match backup {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let (devices, added, skipped) = union_by_id(
        array_field(on_device, "devices"),
        merged.get("devices").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]),
    );
    stats.devices_added = added;
    stats.devices_skipped = skipped;
    let (users, added, _) = union_by_id(
        array_field(on_device, "users"),
        merged.get("users").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]),
    );
    stats.users_added = added;
    let logs = merge_logs(
        object_field(on_device, "logs"),
        merged.get("logs").and_then(Value::as_object),
        &mut stats,
    );

    merged.insert("devices".to_string(), Value::Array(devices));
    merged.insert("users".to_string(), Value::Array(users));
    merged.insert("logs".to_string(), Value::Object(logs));
    debug!(
        devices_added = stats.devices_added,
        devices_skipped = stats.devices_skipped,
        users_added = stats.users_added,
        logs_adopted = stats.logs_adopted,
        "merged app data"
    );
    (Value::Object(merged), stats)
}

/// Returns the union plus how many backup records were added and skipped.
fn union_by_id(on_device: &[Value], backup: &[Value]) -> (Vec<Value>, usize, usize) {
    let mut seen: HashSet<&str> = on_device.iter().filter_map(entity_id).collect();
    let mut records = on_device.to_vec();
    let (mut added, mut skipped) = (0, 0);

    for record in backup {
        match entity_id(record) {
            Some(id) if seen.contains(id) => skipped += 1,
            Some(id) => {
                seen.insert(id);
                records.push(record.clone());
                added += 1;
            }
            None => debug!("skipping backup record without an id"),
        }
    }
    (records, added, skipped)
}

fn merge_logs(
    on_device: Option<&Map<String, Value>>,
    backup: Option<&Map<String, Value>>,
    stats: &mut MergeStats,
) -> Map<String, Value> {
    let mut logs = on_device.cloned().unwrap_or_default();
    let Some(backup) = backup else {
        return logs;
    };

    for (bucket, incoming) in backup {
        let incoming = incoming.as_array().map(Vec::as_slice).unwrap_or(&[]);
        match logs.get(bucket).and_then(Value::as_array) {
            None => {
                stats.logs_adopted += incoming.len();
                logs.insert(bucket.clone(), Value::Array(incoming.to_vec()));
            }
            Some(existing) => {
                let known: HashSet<&str> = existing.iter().filter_map(entity_id).collect();
                let mut combined: Vec<Value> = incoming
                    .iter()
                    .filter(|entry| entity_id(entry).map_or(true, |id| !known.contains(id)))
                    .cloned()
                    .collect();
                stats.logs_adopted += combined.len();
                combined.extend(existing.iter().cloned());
                logs.insert(bucket.clone(), Value::Array(combined));
            }
        }
    }
    logs
}

fn entity_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

fn array_field<'a>(doc: &'a Value, field: &str) -> &'a [Value] {
    doc.get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn object_field<'a>(doc: &'a Value, field: &str) -> Option<&'a Map<String, Value>> {
    doc.get(field).and_then(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_devices_union_with_on_device_winning() {
        let on_device = json!({"devices": [{"id": "a", "name": "Mine"}]});
        let backup = json!({"devices": [{"id": "a", "name": "Theirs"}, {"id": "b", "name": "B"}]});

        let (merged, stats) = merge_app_data(&on_device, backup);

        assert_eq!(
            merged["devices"],
            json!([{"id": "a", "name": "Mine"}, {"id": "b", "name": "B"}])
        );
        assert_eq!(stats.devices_added, 1);
        assert_eq!(stats.devices_skipped, 1);
    }

    #[test]
    fn test_logs_are_unioned_by_entry_id() {
        let on_device = json!({"logs": {
            "a": [{"id": "2"}, {"id": "1"}],
            "only-here": [{"id": "x"}]
        }});
        let backup = json!({"logs": {
            "a": [{"id": "3"}, {"id": "2"}],
            "b": [{"id": "9"}]
        }});

        let (merged, stats) = merge_app_data(&on_device, backup);

        assert_eq!(merged["logs"]["a"], json!([{"id": "3"}, {"id": "2"}, {"id": "1"}]));
        assert_eq!(merged["logs"]["b"], json!([{"id": "9"}]));
        assert_eq!(merged["logs"]["only-here"], json!([{"id": "x"}]));
        assert_eq!(stats.logs_adopted, 2);
    }

    #[test]
    fn test_users_union_keeps_on_device_users() {
        let on_device = json!({
            "devices": [{"id": "a", "authorizedUsers": [{"userId": "u1", "serialNumber": "001"}]}],
            "users": [{"id": "u1", "name": "Ann"}]
        });
        let backup = json!({
            "devices": [{"id": "b", "authorizedUsers": ["u2"]}],
            "users": [{"id": "u2", "name": "Vic"}, {"id": "u1", "name": "Renamed"}]
        });

        let (merged, stats) = merge_app_data(&on_device, backup);

        assert_eq!(
            merged["users"],
            json!([{"id": "u1", "name": "Ann"}, {"id": "u2", "name": "Vic"}])
        );
        assert_eq!(stats.users_added, 1);
    }

    #[test]
    fn test_backup_records_without_ids_are_skipped() {
        let on_device = json!({"devices": [{"id": "a"}]});
        let backup = json!({"devices": [{"name": "NoId"}], "users": [{"name": "Anon"}]});

        let (merged, stats) = merge_app_data(&on_device, backup);

        assert_eq!(merged["devices"], json!([{"id": "a"}]));
        assert_eq!(merged["users"], json!([]));
        assert_eq!(stats, MergeStats::default());
    }

    #[test]
    fn test_settings_come_from_backup() {
        let on_device = json!({"globalSettings": {"adminNumber": "1"}});
        let backup = json!({"globalSettings": {"adminNumber": "2"}, "extra": true});

        let (merged, _) = merge_app_data(&on_device, backup);

        assert_eq!(merged["globalSettings"]["adminNumber"], "2");
        assert_eq!(merged["extra"], true);
    }

    #[test]
    fn test_missing_sections_are_tolerated() {
        let (merged, stats) = merge_app_data(&json!({}), json!({}));
        assert_eq!(merged, json!({"devices": [], "users": [], "logs": {}}));
        assert_eq!(stats, MergeStats::default());
    }
}
