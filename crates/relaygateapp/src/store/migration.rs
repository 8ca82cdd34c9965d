//! Legacy single-key data → canonical AppData.
//!
//! Releases before the canonical document kept one device's worth of state in
//! separate keys:
//!
//! ```text
//! @unit_number        "0400000000"
//! @device_password    "1234"
//! @admin_number       "0411111111"
//! @authorized_users   [{"phone":"...","serial":"001","name":"...","startTime":"...","endTime":"..."}]
//! @app_logs           [LogEntry, ...]
//! @completed_steps    ["step1", ...]
//! ```
//!
//! Migration is best effort. Each key is read and parsed on its own; a failure
//! is recorded in [`MigrationReport::diagnostics`] and that part is skipped.
//! The function never fails as a whole.

use super::backend::KeyValueStore;
use crate::keys;
use crate::model::{new_id, AppData, Authorization, Device, LogEntry, User};
use crate::validation::{format_serial, validate_password};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

/// Name given to the device synthesized from legacy data.
pub const LEGACY_DEVICE_NAME: &str = "My Gate";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Whether any legacy data was adopted.
    pub migrated: bool,
    pub devices: usize,
    pub users: usize,
    pub logs: usize,
    pub skipped_users: usize,
    pub skipped_logs: usize,
    pub diagnostics: Vec<String>,
}

impl MigrationReport {
    fn note(&mut self, message: String) {
        warn!(%message, "legacy migration");
        self.diagnostics.push(message);
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyUser {
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    serial: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
}

/// Build an AppData from legacy keys, if any are present.
pub async fn migrate_legacy<B>(backend: &B, default_password: &str) -> (AppData, MigrationReport)
where
    B: KeyValueStore + ?Sized,
{
    let mut data = AppData::default();
    let mut report = MigrationReport::default();

    let unit_number = read_string(backend, keys::LEGACY_UNIT_NUMBER_KEY, &mut report).await;
    let admin_number = read_string(backend, keys::LEGACY_ADMIN_NUMBER_KEY, &mut report).await;
    let steps = read_json(backend, keys::LEGACY_COMPLETED_STEPS_KEY, &mut report).await;

    if let Some(admin) = admin_number {
        data.global_settings.admin_number = admin;
        report.migrated = true;
    }

    if let Some(Value::Array(items)) = steps {
        for step in items.iter().filter_map(Value::as_str) {
            data.global_settings.complete_step(step);
        }
        report.migrated = true;
    } else if steps.is_some() {
        report.note("legacy completed steps are not a list; skipped".to_string());
    }

    let Some(unit_number) = unit_number else {
        return (data, report);
    };

    let password = match read_string(backend, keys::LEGACY_PASSWORD_KEY, &mut report).await {
        Some(p) if validate_password(&p).is_ok() => p,
        Some(p) => {
            report.note(format!(
                "legacy password has {} characters, expected 4 digits; using default",
                p.len()
            ));
            default_password.to_string()
        }
        None => default_password.to_string(),
    };

    let now = Utc::now();
    let mut device = Device {
        id: new_id(),
        name: LEGACY_DEVICE_NAME.to_string(),
        unit_number,
        password,
        authorized_users: Vec::new(),
        relay_settings: None,
        created_at: now,
        updated_at: now,
    };

    if let Some(value) = read_json(backend, keys::LEGACY_AUTHORIZED_USERS_KEY, &mut report).await {
        migrate_users(value, &mut device, &mut data, &mut report);
    }

    if let Some(value) = read_json(backend, keys::LEGACY_LOGS_KEY, &mut report).await {
        let entries = migrate_logs(value, &device.id, &mut report);
        report.logs = entries.len();
        if !entries.is_empty() {
            data.logs.insert(device.id.clone(), entries);
        }
    }

    data.global_settings.active_device_id = Some(device.id.clone());
    data.devices.push(device);
    report.devices = 1;
    report.migrated = true;

    info!(
        users = report.users,
        logs = report.logs,
        "migrated legacy single-device data"
    );
    (data, report)
}

fn migrate_users(value: Value, device: &mut Device, data: &mut AppData, report: &mut MigrationReport) {
    let Value::Array(items) = value else {
        report.note("legacy authorized users are not a list; skipped".to_string());
        return;
    };

    for item in items {
        let legacy: LegacyUser = match serde_json::from_value(item) {
            Ok(u) => u,
            Err(e) => {
                report.skipped_users += 1;
                report.note(format!("unreadable legacy user record: {}", e));
                continue;
            }
        };

        let phone = legacy.phone.filter(|p| !p.trim().is_empty());
        let serial = legacy.serial.and_then(serial_from_value);
        if phone.is_none() && serial.is_none() {
            report.skipped_users += 1;
            continue;
        }

        let phone = phone.unwrap_or_default();
        let serial = serial.unwrap_or_default();
        let user = User {
            id: new_id(),
            name: legacy
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| phone.clone()),
            phone_number: phone,
            serial_number: serial.clone(),
            start_time: legacy.start_time.filter(|t| !t.is_empty()),
            end_time: legacy.end_time.filter(|t| !t.is_empty()),
        };
        let edge_serial = (!serial.is_empty()).then_some(serial);
        device
            .authorized_users
            .push(Authorization::new(user.id.clone(), edge_serial));
        data.users.push(user);
        report.users += 1;
    }
}

// Serials were stored both as "007" and as 7.
fn serial_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            let trimmed = s.trim();
            match trimmed.parse::<u16>() {
                Ok(n) => Some(format_serial(n)),
                Err(_) => Some(trimmed.to_string()),
            }
        }
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()).map(format_serial),
        _ => None,
    }
}

fn migrate_logs(value: Value, device_id: &str, report: &mut MigrationReport) -> Vec<LogEntry> {
    let Value::Array(items) = value else {
        report.note("legacy logs are not a list; skipped".to_string());
        return Vec::new();
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<LogEntry>(item) {
            Ok(mut entry) => {
                entry.device_id = Some(device_id.to_string());
                entries.push(entry);
            }
            Err(_) => report.skipped_logs += 1,
        }
    }
    if report.skipped_logs > 0 {
        report.note(format!("skipped {} unreadable legacy logs", report.skipped_logs));
    }
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}

async fn read_string<B>(backend: &B, key: &str, report: &mut MigrationReport) -> Option<String>
where
    B: KeyValueStore + ?Sized,
{
    match backend.get(key).await {
        Ok(Some(v)) => {
            // Some builds stored strings JSON-encoded.
            let v = match serde_json::from_str::<String>(&v) {
                Ok(decoded) => decoded,
                Err(_) => v,
            };
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        }
        Ok(None) => None,
        Err(e) => {
            report.note(format!("failed to read {}: {}", key, e));
            None
        }
    }
}

async fn read_json<B>(backend: &B, key: &str, report: &mut MigrationReport) -> Option<Value>
where
    B: KeyValueStore + ?Sized,
{
    let raw = match backend.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            report.note(format!("failed to read {}: {}", key, e));
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            report.note(format!("failed to parse {}: {}", key, e));
            None
        }
    }
}
