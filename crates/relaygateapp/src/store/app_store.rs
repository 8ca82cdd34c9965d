use super::backend::KeyValueStore;
use super::lock;
use super::migration::{migrate_legacy, MigrationReport};
use crate::error::{GateError, Result};
use crate::keys::APP_DATA_KEY;
use crate::model::{
    new_id, AppData, Authorization, Device, DeviceUpdate, GlobalSettings, GlobalSettingsUpdate,
    LogCategory, LogEntry, NewDevice, NewUser, User, UserUpdate, MAX_LOGS_PER_DEVICE,
    SYSTEM_LOG_BUCKET,
};
use crate::sms;
use crate::validation::{
    format_serial, validate_access_time, validate_password, validate_phone_number,
    validate_serial, FieldError, MAX_SERIAL, MIN_SERIAL,
};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

type SaveHandle = Shared<BoxFuture<'static, bool>>;

/// Tunables for an [`AppStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub max_logs_per_device: usize,
    /// Password given to devices created without one (legacy migration).
    pub default_device_password: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_logs_per_device: MAX_LOGS_PER_DEVICE,
            default_device_password: "1234".to_string(),
        }
    }
}

/// What `initialize` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    AlreadyInitialized,
    /// The canonical document was read.
    Loaded,
    /// No canonical document; legacy keys were adopted.
    Migrated(MigrationReport),
    /// Nothing stored yet.
    Empty,
    /// The canonical document existed but could not be read or parsed.
    Unreadable(String),
}

struct StoreState {
    data: AppData,
    initialized: bool,
    /// Bumped on every in-memory change; lets the writer detect stale snapshots.
    generation: u64,
}

struct Inner<B> {
    backend: B,
    options: StoreOptions,
    state: Mutex<StoreState>,
    pending_save: Mutex<Option<SaveHandle>>,
    init_gate: tokio::sync::Mutex<()>,
}

/// The single source of truth for devices, users, logs and settings.
///
/// Construct one per running app and hand clones of it to whoever needs it;
/// clones share the same state. Reads are synchronous over the in-memory copy.
/// Mutators are async: they change memory, then persist the whole document
/// before returning.
pub struct AppStore<B: KeyValueStore + 'static> {
    inner: Arc<Inner<B>>,
}

impl<B: KeyValueStore + 'static> Clone for AppStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: KeyValueStore + 'static> AppStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    pub fn with_options(backend: B, options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                options,
                state: Mutex::new(StoreState {
                    data: AppData::default(),
                    initialized: false,
                    generation: 0,
                }),
                pending_save: Mutex::new(None),
                init_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.inner.state).initialized
    }

    // --- Lifecycle ---

    /// Load durable state into memory. Idempotent; never fails.
    pub async fn initialize(&self) -> InitOutcome {
        let _gate = self.inner.init_gate.lock().await;
        if self.is_initialized() {
            return InitOutcome::AlreadyInitialized;
        }

        let (data, outcome) = match self.inner.backend.get(APP_DATA_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<AppData>(&raw) {
                Ok(data) => (data, InitOutcome::Loaded),
                Err(e) => {
                    warn!(error = %e, "stored app data is corrupt; starting empty");
                    (AppData::default(), InitOutcome::Unreadable(e.to_string()))
                }
            },
            Ok(None) => {
                let (data, report) =
                    migrate_legacy(&self.inner.backend, &self.inner.options.default_device_password)
                        .await;
                if report.migrated {
                    (data, InitOutcome::Migrated(report))
                } else {
                    (data, InitOutcome::Empty)
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read app data; starting empty");
                (AppData::default(), InitOutcome::Unreadable(e.to_string()))
            }
        };

        {
            let mut state = lock(&self.inner.state);
            state.data = data;
            state.initialized = true;
            state.generation += 1;
        }

        if matches!(outcome, InitOutcome::Migrated(_)) {
            // Persist so migration runs once.
            self.save().await;
        }

        debug!(?outcome, "store initialized");
        outcome
    }

    /// Drop the in-memory copy and reload from durable state.
    pub async fn force_reinitialization(&self) -> InitOutcome {
        self.flush().await;
        lock(&self.inner.state).initialized = false;
        self.initialize().await
    }

    async fn ensure_initialized(&self) {
        if !self.is_initialized() {
            self.initialize().await;
        }
    }

    /// Remove every stored key and start over with empty data.
    pub async fn reset(&self) -> bool {
        self.flush().await;
        let removed = match self.inner.backend.list_keys().await {
            Ok(keys) => match self.inner.backend.multi_remove(&keys).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "failed to remove stored keys during reset");
                    false
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to list stored keys during reset");
                false
            }
        };
        let mut state = lock(&self.inner.state);
        state.data = AppData::default();
        state.initialized = true;
        state.generation += 1;
        removed
    }

    // --- Persistence ---

    /// Persist the current AppData. Returns false if the write failed.
    ///
    /// Joins the in-flight write when there is one. The writer loops until the
    /// snapshot it wrote is the latest state, so a caller that mutated while
    /// another write was running still gets its change persisted.
    pub async fn save(&self) -> bool {
        let handle = {
            let mut pending = lock(&self.inner.pending_save);
            match pending.as_ref() {
                Some(handle) => {
                    debug!("joining in-flight save");
                    handle.clone()
                }
                None => {
                    let handle = write_loop(Arc::clone(&self.inner)).boxed().shared();
                    *pending = Some(handle.clone());
                    handle
                }
            }
        };
        handle.await
    }

    /// Wait for any in-flight save to settle.
    pub async fn flush(&self) -> bool {
        let handle = lock(&self.inner.pending_save).clone();
        match handle {
            Some(handle) => handle.await,
            None => true,
        }
    }

    /// Apply `f` to the in-memory data. `None` means nothing changed.
    fn mutate<R>(&self, f: impl FnOnce(&mut AppData) -> Option<R>) -> Option<R> {
        let mut state = lock(&self.inner.state);
        let result = f(&mut state.data)?;
        state.generation += 1;
        Some(result)
    }

    // --- Reads ---

    /// A deep, independent copy of the current data.
    pub fn get_store(&self) -> AppData {
        lock(&self.inner.state).data.clone()
    }

    pub fn get_devices(&self) -> Vec<Device> {
        lock(&self.inner.state).data.devices.clone()
    }

    pub fn get_users(&self) -> Vec<User> {
        lock(&self.inner.state).data.users.clone()
    }

    pub fn get_device_by_id(&self, id: &str) -> Option<Device> {
        lock(&self.inner.state).data.device(id).cloned()
    }

    pub fn get_user_by_id(&self, id: &str) -> Option<User> {
        lock(&self.inner.state).data.user(id).cloned()
    }

    pub fn get_active_device(&self) -> Option<Device> {
        let state = lock(&self.inner.state);
        let id = state.data.global_settings.active_device_id.as_deref()?;
        state.data.device(id).cloned()
    }

    pub fn get_global_settings(&self) -> GlobalSettings {
        lock(&self.inner.state).data.global_settings.clone()
    }

    /// Users authorized on a device, in authorization order.
    ///
    /// Each user's `serial_number` is the position on *this* device. Edges whose
    /// user no longer exists are skipped.
    pub fn get_device_users(&self, device_id: &str) -> Vec<User> {
        let state = lock(&self.inner.state);
        let Some(device) = state.data.device(device_id) else {
            return Vec::new();
        };
        device
            .authorized_users
            .iter()
            .filter_map(|edge| {
                let mut user = state.data.user(&edge.user_id)?.clone();
                if let Some(serial) = &edge.serial_number {
                    user.serial_number = serial.clone();
                }
                Some(user)
            })
            .collect()
    }

    /// Lowest table position not yet taken on a device.
    pub fn next_free_serial(&self, device_id: &str) -> Option<String> {
        if self.get_device_by_id(device_id).is_none() {
            return None;
        }
        let taken: HashSet<u16> = self
            .get_device_users(device_id)
            .iter()
            .filter_map(|u| validate_serial(&u.serial_number).ok())
            .collect();
        (MIN_SERIAL..=MAX_SERIAL)
            .find(|n| !taken.contains(n))
            .map(format_serial)
    }

    /// Logs for a device, newest first. Unknown or blank ids read the system bucket.
    pub fn get_device_logs(&self, device_id: &str) -> Vec<LogEntry> {
        let state = lock(&self.inner.state);
        let bucket = log_bucket(&state.data, device_id);
        state.data.logs.get(bucket).cloned().unwrap_or_default()
    }

    /// Every bucket merged, newest first.
    pub fn get_all_logs(&self) -> Vec<LogEntry> {
        let state = lock(&self.inner.state);
        let mut all: Vec<LogEntry> = state.data.logs.values().flatten().cloned().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all
    }

    // --- Devices ---

    pub async fn add_device(&self, fields: NewDevice) -> Result<Device> {
        self.ensure_initialized().await;

        if fields.name.trim().is_empty() {
            return Err(FieldError::Required("device name").into());
        }
        if fields.unit_number.trim().is_empty() {
            return Err(FieldError::Required("unit number").into());
        }
        let password = match fields.password {
            Some(p) => {
                validate_password(&p)?;
                p
            }
            None => self.inner.options.default_device_password.clone(),
        };

        let now = Utc::now();
        let device = Device {
            id: new_id(),
            name: fields.name.trim().to_string(),
            unit_number: fields.unit_number.trim().to_string(),
            password,
            authorized_users: Vec::new(),
            relay_settings: fields.relay_settings,
            created_at: now,
            updated_at: now,
        };

        let created = self.mutate(|data| {
            data.devices.push(device.clone());
            Some(device)
        });
        self.save().await;
        created.ok_or_else(|| GateError::Storage("device was not recorded".to_string()))
    }

    /// Merge `update` onto a device. Ok(None) if the id is unknown.
    pub async fn update_device(&self, id: &str, update: DeviceUpdate) -> Result<Option<Device>> {
        self.ensure_initialized().await;

        if let Some(password) = &update.password {
            validate_password(password)?;
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(FieldError::Required("device name").into());
            }
        }

        let updated = self.mutate(|data| {
            let device = data.device_mut(id)?;
            update.apply(device);
            device.touch();
            Some(device.clone())
        });
        if updated.is_some() {
            self.save().await;
        }
        Ok(updated)
    }

    /// Remove a device and its log bucket. Reassigns the active device if needed.
    pub async fn delete_device(&self, id: &str) -> bool {
        self.ensure_initialized().await;

        let deleted = self.mutate(|data| {
            let pos = data.devices.iter().position(|d| d.id == id)?;
            data.devices.remove(pos);
            data.logs.remove(id);
            if data.global_settings.active_device_id.as_deref() == Some(id) {
                data.global_settings.active_device_id = data.devices.first().map(|d| d.id.clone());
            }
            Some(())
        });
        if deleted.is_some() {
            self.save().await;
        }
        deleted.is_some()
    }

    pub async fn set_active_device(&self, id: &str) -> bool {
        self.ensure_initialized().await;

        let changed = self.mutate(|data| {
            if !data.has_device(id) {
                return None;
            }
            data.global_settings.active_device_id = Some(id.to_string());
            Some(())
        });
        if changed.is_some() {
            self.save().await;
        }
        changed.is_some()
    }

    // --- Users ---

    pub async fn add_user(&self, fields: NewUser) -> Result<User> {
        self.ensure_initialized().await;
        validate_user_fields(
            Some(fields.phone_number.as_str()),
            Some(fields.serial_number.as_str()),
            fields.start_time.as_deref(),
            fields.end_time.as_deref(),
        )?;

        let user = User {
            id: new_id(),
            name: fields.name.trim().to_string(),
            phone_number: fields.phone_number,
            serial_number: fields.serial_number,
            start_time: fields.start_time,
            end_time: fields.end_time,
        };
        let created = self.mutate(|data| {
            data.users.push(user.clone());
            Some(user)
        });
        self.save().await;
        created.ok_or_else(|| GateError::Storage("user was not recorded".to_string()))
    }

    pub async fn update_user(&self, id: &str, update: UserUpdate) -> Result<Option<User>> {
        self.ensure_initialized().await;
        validate_user_fields(
            update.phone_number.as_deref(),
            update.serial_number.as_deref(),
            update.start_time.as_ref().and_then(|t| t.as_deref()),
            update.end_time.as_ref().and_then(|t| t.as_deref()),
        )?;

        let updated = self.mutate(|data| {
            let user = data.user_mut(id)?;
            update.apply(user);
            Some(user.clone())
        });
        if updated.is_some() {
            self.save().await;
        }
        Ok(updated)
    }

    /// Remove a user and every authorization that references it.
    pub async fn delete_user(&self, id: &str) -> bool {
        self.ensure_initialized().await;

        let deleted = self.mutate(|data| {
            let pos = data.users.iter().position(|u| u.id == id)?;
            data.users.remove(pos);
            for device in data.devices.iter_mut() {
                let before = device.authorized_users.len();
                device.authorized_users.retain(|a| a.user_id != id);
                if device.authorized_users.len() != before {
                    device.touch();
                }
            }
            Some(())
        });
        if deleted.is_some() {
            self.save().await;
        }
        deleted.is_some()
    }

    /// Authorize a user on a device at the user's default serial.
    /// Returns false if already authorized or either id is unknown.
    pub async fn authorize_user_for_device(&self, device_id: &str, user_id: &str) -> bool {
        self.authorize_user_with_serial(device_id, user_id, None)
            .await
            .unwrap_or(false)
    }

    /// Authorize a user on a device at an explicit table position.
    pub async fn authorize_user_with_serial(
        &self,
        device_id: &str,
        user_id: &str,
        serial: Option<String>,
    ) -> Result<bool> {
        self.ensure_initialized().await;
        if let Some(serial) = &serial {
            validate_serial(serial)?;
        }

        let changed = self.mutate(|data| {
            let default_serial = data.user(user_id)?.serial_number.clone();
            let device = data.device_mut(device_id)?;
            if device.is_authorized(user_id) {
                return None;
            }
            let serial = serial.or_else(|| (!default_serial.is_empty()).then_some(default_serial));
            device
                .authorized_users
                .push(Authorization::new(user_id, serial));
            device.touch();
            Some(())
        });
        if changed.is_some() {
            self.save().await;
        }
        Ok(changed.is_some())
    }

    /// Returns false if the user was not authorized or the device is unknown.
    pub async fn deauthorize_user_for_device(&self, device_id: &str, user_id: &str) -> bool {
        self.ensure_initialized().await;

        let changed = self.mutate(|data| {
            let device = data.device_mut(device_id)?;
            let pos = device
                .authorized_users
                .iter()
                .position(|a| a.user_id == user_id)?;
            device.authorized_users.remove(pos);
            device.touch();
            Some(())
        });
        if changed.is_some() {
            self.save().await;
        }
        changed.is_some()
    }

    // --- Logs ---

    /// Prepend a log entry to a device's bucket, capped at the configured limit.
    /// Blank or unknown device ids go to the system bucket.
    pub async fn add_device_log(
        &self,
        device_id: &str,
        action: impl Into<String>,
        details: impl Into<String>,
        success: bool,
        category: LogCategory,
    ) -> LogEntry {
        self.ensure_initialized().await;
        let (action, details) = (action.into(), details.into());
        let cap = self.inner.options.max_logs_per_device;

        let entry = self.mutate(|data| {
            let bucket = log_bucket(data, device_id).to_string();
            let attributed = (bucket != SYSTEM_LOG_BUCKET).then(|| bucket.clone());
            let entry = LogEntry::new(attributed, action, details, success, category);
            let logs = data.logs.entry(bucket).or_default();
            logs.insert(0, entry.clone());
            logs.truncate(cap);
            Some(entry)
        });
        self.save().await;
        entry.unwrap_or_else(|| LogEntry::new(None, "", "", success, category))
    }

    /// Describe a raw SMS command body and log it against a device.
    /// The password prefix never reaches the log.
    pub async fn log_command(&self, device_id: &str, command: &str, success: bool) -> LogEntry {
        let described = sms::describe(command);
        self.add_device_log(
            device_id,
            described.action,
            described.details,
            success,
            described.category,
        )
        .await
    }

    /// Empty a device's log bucket. False for an unknown device.
    pub async fn clear_device_logs(&self, device_id: &str) -> bool {
        self.ensure_initialized().await;

        let cleared = self.mutate(|data| {
            if device_id != SYSTEM_LOG_BUCKET && !data.has_device(device_id) {
                return None;
            }
            data.logs.insert(device_id.to_string(), Vec::new());
            Some(())
        });
        if cleared.is_some() {
            self.save().await;
        }
        cleared.is_some()
    }

    // --- Settings ---

    pub async fn update_global_settings(&self, update: GlobalSettingsUpdate) -> GlobalSettings {
        self.ensure_initialized().await;
        let settings = self.mutate(|data| {
            update.apply(&mut data.global_settings);
            Some(data.global_settings.clone())
        });
        self.save().await;
        settings.unwrap_or_default()
    }

    /// Mark an onboarding step done. False if it already was.
    pub async fn complete_step(&self, step: &str) -> bool {
        self.ensure_initialized().await;
        let changed = self.mutate(|data| data.global_settings.complete_step(step).then_some(()));
        if changed.is_some() {
            self.save().await;
        }
        changed.is_some()
    }
}

fn log_bucket<'a>(data: &AppData, device_id: &'a str) -> &'a str {
    let id = device_id.trim();
    if id.is_empty() || !data.has_device(id) {
        SYSTEM_LOG_BUCKET
    } else {
        id
    }
}

fn validate_user_fields(
    phone: Option<&str>,
    serial: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
) -> std::result::Result<(), FieldError> {
    if let Some(phone) = phone {
        validate_phone_number(phone)?;
    }
    if let Some(serial) = serial.filter(|s| !s.is_empty()) {
        validate_serial(serial)?;
    }
    if let Some(start) = start {
        validate_access_time(start)?;
    }
    if let Some(end) = end {
        validate_access_time(end)?;
    }
    Ok(())
}

async fn write_loop<B: KeyValueStore + 'static>(inner: Arc<Inner<B>>) -> bool {
    loop {
        let (generation, payload) = {
            let state = lock(&inner.state);
            (state.generation, serde_json::to_string(&state.data))
        };

        let ok = match payload {
            Ok(json) => match inner.backend.set(APP_DATA_KEY, &json).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "failed to persist app data");
                    false
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to serialize app data");
                false
            }
        };

        if settle(&inner, generation, ok) {
            return ok;
        }
        debug!("app data changed during save; writing again");
    }
}

/// Clear the pending slot unless the state moved past `generation`.
/// Checked under the slot lock so a new mutation either sees the slot empty
/// or is covered by another loop iteration.
fn settle<B>(inner: &Inner<B>, generation: u64, ok: bool) -> bool {
    let mut pending = lock(&inner.pending_save);
    let current = lock(&inner.state).generation;
    if !ok || current == generation {
        *pending = None;
        if ok {
            info!(generation, "app data saved");
        }
        true
    } else {
        false
    }
}
