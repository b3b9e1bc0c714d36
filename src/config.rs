//! Process configuration, read from the environment at startup.
//!
//! - `POMOTASK_DATA_DIR`: where the SQLite store lives
//! - `POMOTASK_SOUNDS_DIR`: optional directory of `Alarm1.wav`-style files
//!   that replace the built-in chimes
//! - `POMOTASK_DEBUG`: `1` or `true` for debug logging
//! - `POMOTASK_EPHEMERAL`: `1` or `true` to keep everything in memory

use std::path::PathBuf;

const APP_DIR_NAME: &str = "pomotask";
const DB_FILE_NAME: &str = "pomotask.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub sounds_dir: Option<PathBuf>,
    pub debug: bool,
    pub ephemeral: bool,
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = non_empty("POMOTASK_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(".pomotask"));

        Self {
            data_dir,
            sounds_dir: non_empty("POMOTASK_SOUNDS_DIR").map(PathBuf::from),
            debug: flag(lookup("POMOTASK_DEBUG")),
            ephemeral: flag(lookup("POMOTASK_EPHEMERAL")),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}
