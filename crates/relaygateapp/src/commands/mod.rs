//! # Command Layer
//!
//! The business logic behind every user-facing operation. Each concern lives
//! in its own submodule and works against an [`AppStore`](crate::store::AppStore).
//!
//! ## Role and Responsibilities
//!
//! - Resolve what the user typed (id prefixes, names, phone numbers) into
//!   entities.
//! - Validate input before any mutation.
//! - Call store mutators and record audit log entries.
//! - Build the relay SMS for operations that change the device itself.
//! - Return a structured [`CmdResult`].
//!
//! ## What Commands Do NOT Do
//!
//! - **Terminal I/O**: no stdout or stderr.
//! - **Sending SMS**: the body and destination are returned; delivery is the
//!   UI's business.
//! - **Argument parsing** and exit codes.
//!
//! ## Structured Returns
//!
//! [`CmdResult`] carries whatever the operation produced: devices, users, log
//! entries, settings, an outgoing SMS, a backup path or a restore report, plus
//! leveled messages. The UI decides how to render it.
//!
//! ## Testing Strategy
//!
//! Command tests use [`MemBackend`](crate::store::mem_backend::MemBackend) and
//! check the `CmdResult` and the resulting store state.
//!
//! ## Command Modules
//!
//! - [`devices`]: add, list, update, delete, activate, relay commands
//! - [`users`]: add, list, update, delete, authorize, deauthorize
//! - [`logs`]: list and clear log buckets
//! - [`settings`]: global settings and onboarding steps
//! - [`backup`]: export, import, reset
//! - [`helpers`]: selector resolution

use crate::backup::RestoreReport;
use crate::model::{Device, GlobalSettings, LogEntry, User};
use serde::Serialize;
use std::path::PathBuf;

pub mod backup;
pub mod devices;
pub mod helpers;
pub mod logs;
pub mod settings;
pub mod users;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// An SMS the UI should hand to the platform for sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingSms {
    /// The device's unit number.
    pub to: String,
    pub body: String,
}

#[derive(Debug, Default, Serialize)]
pub struct CmdResult {
    pub affected_devices: Vec<Device>,
    pub listed_devices: Vec<Device>,
    pub listed_users: Vec<User>,
    pub listed_logs: Vec<LogEntry>,
    pub settings: Option<GlobalSettings>,
    /// Messages to send, in order.
    pub sms: Vec<OutgoingSms>,
    pub backup_path: Option<PathBuf>,
    pub restore_report: Option<RestoreReport>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected_devices(mut self, devices: Vec<Device>) -> Self {
        self.affected_devices = devices;
        self
    }

    pub fn with_listed_devices(mut self, devices: Vec<Device>) -> Self {
        self.listed_devices = devices;
        self
    }

    pub fn with_listed_users(mut self, users: Vec<User>) -> Self {
        self.listed_users = users;
        self
    }

    pub fn with_listed_logs(mut self, logs: Vec<LogEntry>) -> Self {
        self.listed_logs = logs;
        self
    }

    pub fn with_settings(mut self, settings: GlobalSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_sms(mut self, to: impl Into<String>, body: impl Into<String>) -> Self {
        self.sms.push(OutgoingSms {
            to: to.into(),
            body: body.into(),
        });
        self
    }
}
