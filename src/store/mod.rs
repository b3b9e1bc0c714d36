//! String-keyed persistence shared by the timer, the sound notifier and the task list.
//!
//! Reads never fail from the caller's point of view: anything absent or
//! malformed comes back as `None` and the caller substitutes its default.
//! Writes are write-through and a failed write is logged, not propagated.

pub mod sqlite;

use std::{collections::HashMap, str::FromStr, sync::Arc, sync::RwLock};

use anyhow::{anyhow, Result};
use log::{error, warn};

pub use sqlite::SqliteStore;

pub const KEY_FOCUS_TIME: &str = "focusTime";
pub const KEY_SHORT_BREAK_TIME: &str = "shortBreakTime";
pub const KEY_LONG_BREAK_TIME: &str = "longBreakTime";
pub const KEY_TIME_LEFT: &str = "timeLeft";
pub const KEY_CYCLE_COUNT: &str = "cycleCount";
pub const KEY_SESSION_TYPE: &str = "sessionType";
pub const KEY_NOTIFICATION_SOUND: &str = "notificationSound";
pub const KEY_TASKS: &str = "tasks";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Reads `key` as a raw string, treating storage errors as absence.
pub fn read_string(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(err) => {
            warn!("Failed to read {key} from store: {err:#}");
            None
        }
    }
}

/// Reads `key` and parses it, treating storage and parse errors as absence.
pub fn read_parsed<T: FromStr>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = read_string(store, key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring malformed value for {key}: {raw:?}");
            None
        }
    }
}

pub fn write_logged(store: &dyn KeyValueStore, key: &str, value: &str) {
    if let Err(err) = store.set(key, value) {
        error!("Failed to persist {key}: {err:#}");
    }
}

/// Process-local store, used for tests and `POMOTASK_EPHEMERAL` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .entries
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
