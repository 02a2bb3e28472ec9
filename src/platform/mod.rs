//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Key-value storage (LocalStorage on web, in-memory elsewhere)
//! - Wall-clock time and ISO-8601 timestamps

pub mod storage;
pub mod time;

pub use storage::{KeyValueStore, MemoryStorage, StorageError};
pub use time::{ManualTime, TimeSource, WallClock, iso8601};

#[cfg(target_arch = "wasm32")]
pub use storage::BrowserStorage;
