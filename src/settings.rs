use serde::{Deserialize, Serialize};

use crate::{
    store::{
        read_parsed, write_logged, KeyValueStore, KEY_FOCUS_TIME, KEY_LONG_BREAK_TIME,
        KEY_SHORT_BREAK_TIME,
    },
    timer::SessionType,
};

pub const DEFAULT_FOCUS_SECS: u64 = 25 * 60;
pub const DEFAULT_SHORT_BREAK_SECS: u64 = 5 * 60;
pub const DEFAULT_LONG_BREAK_SECS: u64 = 15 * 60;

/// Configured length of each session type, in seconds. Every field is > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub focus_secs: u64,
    pub short_break_secs: u64,
    pub long_break_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            focus_secs: DEFAULT_FOCUS_SECS,
            short_break_secs: DEFAULT_SHORT_BREAK_SECS,
            long_break_secs: DEFAULT_LONG_BREAK_SECS,
        }
    }
}

impl SessionConfig {
    /// Loads each duration independently; a missing, malformed or zero value
    /// falls back to its default without disturbing the others.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        let load_one = |key: &str, fallback: u64| {
            read_parsed::<u64>(store, key)
                .filter(|secs| *secs > 0)
                .unwrap_or(fallback)
        };

        Self {
            focus_secs: load_one(KEY_FOCUS_TIME, defaults.focus_secs),
            short_break_secs: load_one(KEY_SHORT_BREAK_TIME, defaults.short_break_secs),
            long_break_secs: load_one(KEY_LONG_BREAK_TIME, defaults.long_break_secs),
        }
    }

    pub fn duration_secs(&self, session_type: SessionType) -> u64 {
        match session_type {
            SessionType::Focus => self.focus_secs,
            SessionType::ShortBreak => self.short_break_secs,
            SessionType::LongBreak => self.long_break_secs,
        }
    }

    pub(crate) fn set_duration_secs(&mut self, session_type: SessionType, secs: u64) {
        match session_type {
            SessionType::Focus => self.focus_secs = secs,
            SessionType::ShortBreak => self.short_break_secs = secs,
            SessionType::LongBreak => self.long_break_secs = secs,
        }
    }

    pub fn persist_one(&self, store: &dyn KeyValueStore, session_type: SessionType) {
        let key = match session_type {
            SessionType::Focus => KEY_FOCUS_TIME,
            SessionType::ShortBreak => KEY_SHORT_BREAK_TIME,
            SessionType::LongBreak => KEY_LONG_BREAK_TIME,
        };
        write_logged(store, key, &self.duration_secs(session_type).to_string());
    }

    pub fn persist(&self, store: &dyn KeyValueStore) {
        for session_type in SessionType::ALL {
            self.persist_one(store, session_type);
        }
    }
}

/// Validation for user-entered durations
pub mod validation {
    use anyhow::{anyhow, bail, Result};

    /// Parses raw text input as whole minutes.
    pub fn parse_minutes(input: &str) -> Result<i64> {
        input
            .trim()
            .parse::<i64>()
            .map_err(|_| anyhow!("Please enter a valid positive number of minutes"))
    }

    /// Converts a minute count to seconds, rejecting zero, negatives and overflow.
    pub fn minutes_to_secs(minutes: i64) -> Result<u64> {
        if minutes <= 0 {
            bail!("Please enter a valid positive number of minutes");
        }

        (minutes as u64)
            .checked_mul(60)
            .ok_or_else(|| anyhow!("Duration of {minutes} minutes is too long"))
    }
}
