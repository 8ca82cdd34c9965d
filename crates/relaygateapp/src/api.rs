//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer and the single
//! entry point for every relaygate operation, whichever UI is driving it.
//!
//! ## Role and Responsibilities
//!
//! - **Dispatches** to the matching command function.
//! - **Owns** the [`AppStore`] for the running app. There is one store per
//!   context; clones of it share state.
//! - **Returns structured types** (`Result<CmdResult>`).
//!
//! ## What the API Does NOT Do
//!
//! - **Business logic**: that lives in `commands/*.rs`.
//! - **I/O**: no stdout, stderr, or SMS delivery.
//!
//! ## Generic Over the Key-Value Adapter
//!
//! `RelayGateApi<B: KeyValueStore>`:
//! - Production: `RelayGateApi<FsBackend>`
//! - Testing: `RelayGateApi<MemBackend>`

use crate::commands;
use crate::error::Result;
use crate::model::{AccessControl, DeviceUpdate, NewDevice, NewUser, UserUpdate};
use crate::sms::RelayCommand;
use crate::store::{AppStore, InitOutcome, KeyValueStore};
use std::path::{Path, PathBuf};

pub struct RelayGateApi<B: KeyValueStore + 'static> {
    store: AppStore<B>,
    backup_dir: PathBuf,
}

impl<B: KeyValueStore + 'static> RelayGateApi<B> {
    pub fn new(store: AppStore<B>, backup_dir: PathBuf) -> Self {
        Self { store, backup_dir }
    }

    pub fn store(&self) -> &AppStore<B> {
        &self.store
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub async fn initialize(&self) -> InitOutcome {
        self.store.initialize().await
    }

    // --- Devices ---

    pub async fn add_device(&self, fields: NewDevice) -> Result<CmdResult> {
        commands::devices::add(&self.store, fields).await
    }

    pub fn list_devices(&self) -> Result<CmdResult> {
        commands::devices::list(&self.store)
    }

    pub async fn update_device(
        &self,
        device: Option<&str>,
        update: DeviceUpdate,
    ) -> Result<CmdResult> {
        commands::devices::update(&self.store, device, update).await
    }

    pub async fn delete_device(&self, device: &str) -> Result<CmdResult> {
        commands::devices::delete(&self.store, device).await
    }

    pub async fn activate_device(&self, device: &str) -> Result<CmdResult> {
        commands::devices::activate(&self.store, device).await
    }

    pub async fn send_command(
        &self,
        device: Option<&str>,
        command: RelayCommand,
    ) -> Result<CmdResult> {
        commands::devices::send(&self.store, device, command).await
    }

    pub async fn configure_relay(
        &self,
        device: Option<&str>,
        access_control: Option<AccessControl>,
        latch_time: Option<String>,
    ) -> Result<CmdResult> {
        commands::devices::configure_relay(&self.store, device, access_control, latch_time).await
    }

    // --- Users ---

    pub async fn add_user(&self, fields: NewUser) -> Result<CmdResult> {
        commands::users::add(&self.store, fields).await
    }

    pub fn list_users(&self, device: Option<&str>) -> Result<CmdResult> {
        commands::users::list(&self.store, device)
    }

    pub async fn update_user(&self, user: &str, update: UserUpdate) -> Result<CmdResult> {
        commands::users::update(&self.store, user, update).await
    }

    pub async fn delete_user(&self, user: &str) -> Result<CmdResult> {
        commands::users::delete(&self.store, user).await
    }

    pub async fn authorize_user(
        &self,
        device: Option<&str>,
        user: &str,
        serial: Option<String>,
    ) -> Result<CmdResult> {
        commands::users::authorize(&self.store, device, user, serial).await
    }

    pub async fn deauthorize_user(&self, device: Option<&str>, user: &str) -> Result<CmdResult> {
        commands::users::deauthorize(&self.store, device, user).await
    }

    // --- Logs ---

    pub fn list_logs(&self, filter: LogFilter) -> Result<CmdResult> {
        commands::logs::list(&self.store, filter)
    }

    pub async fn clear_logs(&self, device: &str) -> Result<CmdResult> {
        commands::logs::clear(&self.store, device).await
    }

    // --- Settings ---

    pub fn settings(&self) -> Result<CmdResult> {
        commands::settings::show(&self.store)
    }

    pub async fn set_admin_number(&self, number: &str) -> Result<CmdResult> {
        commands::settings::set_admin(&self.store, number).await
    }

    pub async fn complete_step(&self, step: &str) -> Result<CmdResult> {
        commands::settings::complete_step(&self.store, step).await
    }

    // --- Backup ---

    /// Write a backup into `dir`, or the configured backup directory.
    pub async fn export_backup(&self, dir: Option<&Path>) -> Result<CmdResult> {
        let dir = dir.unwrap_or(&self.backup_dir);
        commands::backup::export(&self.store, dir).await
    }

    pub async fn import_backup(&self, path: &Path) -> Result<CmdResult> {
        commands::backup::import_file(&self.store, path).await
    }

    pub async fn import_backup_text(&self, text: &str) -> Result<CmdResult> {
        commands::backup::import_text(&self.store, text).await
    }

    pub async fn reset(&self) -> Result<CmdResult> {
        commands::backup::reset(&self.store).await
    }
}

pub use commands::logs::LogFilter;
pub use commands::{CmdMessage, CmdResult, MessageLevel, OutgoingSms};
