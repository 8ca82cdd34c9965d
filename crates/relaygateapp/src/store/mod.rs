//! # Storage Layer
//!
//! Two layers, mirroring the split between durability and meaning:
//!
//! 1. **Key-value adapter** ([`backend::KeyValueStore`]): opaque async
//!    get/set/remove/list over string keys. Implementations:
//!    - [`fs_backend::FsBackend`]: one file per key, atomic writes.
//!    - [`mem_backend::MemBackend`]: in-memory, for tests.
//! 2. **Data store** ([`app_store::AppStore`]): owns the in-memory
//!    [`crate::model::AppData`] and mediates every write to the adapter.
//!
//! ## Persistence Discipline
//!
//! The entire AppData is one JSON document under
//! [`crate::keys::APP_DATA_KEY`]. Every mutator changes memory synchronously,
//! then persists the full document before returning. Saves coalesce: while a
//! write is in flight, later callers join it instead of starting their own,
//! and the in-flight writer re-writes if the state moved on underneath it.
//!
//! ## Failure Policy
//!
//! Storage I/O failures are logged with `tracing` and degrade to safe defaults
//! (empty read, failed-save flag). The store stays usable in memory while
//! durability is broken.
//!
//! ## Legacy Data
//!
//! Installs that predate the canonical document kept single-purpose keys.
//! [`migration`] turns those into an AppData the first time the store
//! initializes without a canonical document.

use std::sync::{Mutex, MutexGuard};

pub mod app_store;
pub mod backend;
pub mod fs_backend;
pub mod mem_backend;
pub mod migration;

pub use app_store::{AppStore, InitOutcome, StoreOptions};
pub use backend::KeyValueStore;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
