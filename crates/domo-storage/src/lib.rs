//! Durable state for domo
//!
//! A small JSON storage layer (versioned files under a `.storage/`
//! directory, written atomically) plus the [`Settings`] handle that holds
//! the persisted controller state: the automation flag, the first-motion
//! latch, the switch bank mirror and the last-motion timestamp.
//!
//! Persistence is best-effort by policy: a failed write is logged and the
//! in-memory value stays authoritative for the process lifetime.

mod settings;
mod storage;

pub use settings::{Settings, SettingsData};
pub use storage::{Storage, StorageError, StorageFile, StorageResult};
