//! # Backup and Restore
//!
//! A backup is a JSON document holding every storage key:
//!
//! ```json
//! { "version": "1.0", "timestamp": "2024-05-01T10:00:00Z", "data": { "@gsm_app_data": { ... } } }
//! ```
//!
//! Creating one ([`document`]) only reads. Restoring one ([`restore`]) is a
//! linear pipeline where durable state is touched in exactly one place, after
//! everything else has succeeded in memory:
//!
//! 1. [`recover`]: reject empty input, trim noise around the JSON, then parse
//!    strictly, with trailing commas removed, or by pulling out loose
//!    `"key": value` pairs.
//! 2. [`normalize`]: standard document, flat key dump, or bare legacy array,
//!    all become a flat key → value mapping.
//! 3. Preserve on-device log keys and the on-device AppData.
//! 4. [`sanitize`]: drop incoming records the store could not load, then
//!    [`merge`]: when both sides have an AppData document, union devices,
//!    users and logs instead of overwriting. The result must load as AppData
//!    or the restore stops here.
//! 5. Clear, write, re-write preserved logs, then reload the store.

pub mod document;
pub mod merge;
pub mod normalize;
pub mod recover;
pub mod restore;
pub mod sanitize;

pub use document::{
    backup_file_name, create_backup, snapshot_backend, write_backup_file, BackupDocument,
    BACKUP_VERSION,
};
pub use normalize::BackupShape;
pub use recover::ParseTier;
pub use restore::{restore_from_backup, restore_from_file, RestoreReport};
