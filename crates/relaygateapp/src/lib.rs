//! # Relaygate Architecture
//!
//! Relaygate manages SMS-controlled GSM relay gate openers: the devices, the
//! people allowed to open them, an activity log per device, and backups of all
//! of it. It is a **UI-agnostic library** with a CLI client on top.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (relaygate crate)                                      │
//! │  - Parses arguments, formats output, handles terminal I/O   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over commands                                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Selector resolution, SMS building, activity logging      │
//! │  - Returns CmdResult, never prints                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Data Store (store/app_store.rs) + Backup (backup/)         │
//! │  - One in-memory AppData, persisted as one JSON document    │
//! │  - Backups snapshot every key; restore merges and repairs   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Key-Value Adapter (store/backend.rs)                       │
//! │  - FsBackend (production), MemBackend (testing)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sending SMS
//!
//! The library builds relay command bodies ([`sms`]) and logs them, but never
//! sends anything. Commands return an [`api::OutgoingSms`] and the client
//! decides how to deliver it.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade
//! - [`commands`]: Business logic for each command
//! - [`store`]: Key-value adapters and the data store
//! - [`backup`]: Backup creation, damaged-input recovery and restore/merge
//! - [`model`]: Core data types (`Device`, `User`, `LogEntry`, `GlobalSettings`)
//! - [`sms`]: Relay command encoding and log descriptions
//! - [`validation`]: Field validators
//! - [`keys`]: Storage key names
//! - [`config`]: Configuration management
//! - [`init`]: Data directory resolution and context setup
//! - [`tracing_init`]: Diagnostics subscriber setup
//! - [`error`]: Error types

pub mod api;
pub mod backup;
pub mod commands;
pub mod config;
pub mod error;
pub mod init;
pub mod keys;
pub mod model;
pub mod sms;
pub mod store;
pub mod tracing_init;
pub mod validation;
