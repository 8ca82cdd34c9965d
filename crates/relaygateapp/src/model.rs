//! # Domain Model
//!
//! This module defines the persisted shape of everything relaygate knows about:
//! [`Device`], [`User`], [`LogEntry`], [`GlobalSettings`] and the root aggregate
//! [`AppData`].
//!
//! ## Wire Format
//!
//! The whole of [`AppData`] is stored as one JSON document under
//! [`crate::keys::APP_DATA_KEY`]. Field names are camelCase on the wire
//! (`unitNumber`, `authorizedUsers`, `globalSettings`, ...) because the same
//! documents travel inside backups and must stay readable by older installs.
//!
//! ## Tolerant Reads
//!
//! Backups come from handsets running different releases, so deserialization is
//! deliberately forgiving:
//! - Missing strings default to empty, missing lists to empty.
//! - Missing timestamps default to "now".
//! - Unknown log categories collapse to [`LogCategory::System`].
//! - `authorizedUsers` accepts both the legacy plain-id array and the current
//!   edge objects (see [`Authorization`]).
//!
//! ## Serial Numbers
//!
//! A GSM relay keeps a position-indexed user table (001–200). The position is a
//! property of the *(device, user)* pair, so it lives on the [`Authorization`]
//! edge. [`User::serial_number`] remains as the user's default position, used
//! when an authorization is created without an explicit serial and when older
//! documents carry no per-edge serial.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Log bucket used for entries with no (valid) device attribution.
pub const SYSTEM_LOG_BUCKET: &str = "system";

/// Default per-device cap on retained log entries.
pub const MAX_LOGS_PER_DEVICE: usize = 200;

/// Generate a fresh opaque identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Return a timestamp strictly later than `previous`.
///
/// Two mutations inside the same clock tick must still produce ordered
/// `updatedAt` values.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessControl {
    #[serde(rename = "authorized-only")]
    AuthorizedOnly,
    #[serde(rename = "allow-all")]
    AllowAll,
}

impl AccessControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessControl::AuthorizedOnly => "authorized-only",
            AccessControl::AllowAll => "allow-all",
        }
    }
}

impl std::str::FromStr for AccessControl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorized-only" => Ok(AccessControl::AuthorizedOnly),
            "allow-all" => Ok(AccessControl::AllowAll),
            other => Err(format!("unknown access control mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySettings {
    pub access_control: AccessControl,
    /// Seconds the relay stays closed, as the 3-digit string the device expects.
    pub latch_time: String,
}

/// A (device, user) authorization edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl Authorization {
    pub fn new(user_id: impl Into<String>, serial_number: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            serial_number,
        }
    }
}

// Older documents store `authorizedUsers` as a bare list of user ids.
impl<'de> Deserialize<'de> for Authorization {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match AuthorizationHelper::deserialize(deserializer)? {
            AuthorizationHelper::Id(user_id) => Ok(Authorization {
                user_id,
                serial_number: None,
            }),
            AuthorizationHelper::Edge {
                user_id,
                serial_number,
            } => Ok(Authorization {
                user_id,
                serial_number: serial_number.filter(|s| !s.is_empty()),
            }),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AuthorizationHelper {
    Id(String),
    Edge {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(default, rename = "serialNumber")]
        serial_number: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit_number: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub authorized_users: Vec<Authorization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_settings: Option<RelaySettings>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Device {
    pub fn is_authorized(&self, user_id: &str) -> bool {
        self.authorized_users.iter().any(|a| a.user_id == user_id)
    }

    pub fn authorization(&self, user_id: &str) -> Option<&Authorization> {
        self.authorized_users.iter().find(|a| a.user_id == user_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = next_timestamp(self.updated_at);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone_number: String,
    /// Default position (001–200) for new authorizations of this user.
    #[serde(default)]
    pub serial_number: String,
    /// Access window start, `YYMMDDHHMM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Access window end, `YYMMDDHHMM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Relay,
    Settings,
    User,
    #[serde(other)]
    System,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Relay => "relay",
            LogCategory::Settings => "settings",
            LogCategory::User => "user",
            LogCategory::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default = "default_category")]
    pub category: LogCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

fn default_category() -> LogCategory {
    LogCategory::System
}

impl LogEntry {
    pub fn new(
        device_id: Option<String>,
        action: impl Into<String>,
        details: impl Into<String>,
        success: bool,
        category: LogCategory,
    ) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            action: action.into(),
            details: details.into(),
            success,
            category,
            device_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    #[serde(default)]
    pub admin_number: String,
    #[serde(default)]
    pub active_device_id: Option<String>,
    #[serde(default)]
    pub completed_steps: Vec<String>,
}

impl GlobalSettings {
    /// Record an onboarding step. Returns false if it was already recorded.
    pub fn complete_step(&mut self, step: impl Into<String>) -> bool {
        let step = step.into();
        if self.completed_steps.contains(&step) {
            return false;
        }
        self.completed_steps.push(step);
        true
    }
}

/// Root aggregate persisted under the canonical key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub logs: BTreeMap<String, Vec<LogEntry>>,
    #[serde(default)]
    pub global_settings: GlobalSettings,
}

impl AppData {
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn device_mut(&mut self, id: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.id == id)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_mut(&mut self, id: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    pub fn has_device(&self, id: &str) -> bool {
        self.device(id).is_some()
    }
}

/// Fields for a new device. Id and timestamps are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewDevice {
    pub name: String,
    pub unit_number: String,
    pub password: Option<String>,
    pub relay_settings: Option<RelaySettings>,
}

impl NewDevice {
    pub fn new(name: impl Into<String>, unit_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit_number: unit_number.into(),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Partial update applied by `update_device`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub unit_number: Option<String>,
    pub password: Option<String>,
    pub relay_settings: Option<RelaySettings>,
    pub authorized_users: Option<Vec<Authorization>>,
}

impl DeviceUpdate {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn apply(self, device: &mut Device) {
        if let Some(name) = self.name {
            device.name = name;
        }
        if let Some(unit_number) = self.unit_number {
            device.unit_number = unit_number;
        }
        if let Some(password) = self.password {
            device.password = password;
        }
        if let Some(relay_settings) = self.relay_settings {
            device.relay_settings = Some(relay_settings);
        }
        if let Some(authorized_users) = self.authorized_users {
            device.authorized_users = authorized_users;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub phone_number: String,
    pub serial_number: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl NewUser {
    pub fn new(
        name: impl Into<String>,
        phone_number: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phone_number: phone_number.into(),
            serial_number: serial_number.into(),
            ..Default::default()
        }
    }
}

/// Partial user update. The access window fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub serial_number: Option<String>,
    pub start_time: Option<Option<String>>,
    pub end_time: Option<Option<String>>,
}

impl UserUpdate {
    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(phone_number) = self.phone_number {
            user.phone_number = phone_number;
        }
        if let Some(serial_number) = self.serial_number {
            user.serial_number = serial_number;
        }
        if let Some(start_time) = self.start_time {
            user.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            user.end_time = end_time;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalSettingsUpdate {
    pub admin_number: Option<String>,
    pub active_device_id: Option<Option<String>>,
    pub completed_steps: Option<Vec<String>>,
}

impl GlobalSettingsUpdate {
    pub fn apply(self, settings: &mut GlobalSettings) {
        if let Some(admin_number) = self.admin_number {
            settings.admin_number = admin_number;
        }
        if let Some(active_device_id) = self.active_device_id {
            settings.active_device_id = active_device_id;
        }
        if let Some(completed_steps) = self.completed_steps {
            settings.completed_steps = completed_steps;
        }
    }
}
