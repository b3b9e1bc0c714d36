pub mod audio;
pub mod config;
pub mod settings;
pub mod shell;
pub mod store;
pub mod tasks;
pub mod timer;


use std::sync::Arc;

use anyhow::Context;
use audio::{ChimeNotifier, SoundNotifier};
use config::AppConfig;
use log::{info, warn};
use shell::Shell;
use store::{MemoryStore, SharedStore, SqliteStore};
use tasks::TaskStore;
use timer::TimerController;

pub struct AppState {
    pub(crate) timer: TimerController,
    pub(crate) tasks: TaskStore,
}

impl AppState {
    /// Restores the timer and the task list from `store`.
    pub fn new(store: SharedStore, notifier: Arc<dyn SoundNotifier>) -> Self {
        Self {
            timer: TimerController::new(store.clone(), notifier),
            tasks: TaskStore::load(store),
        }
    }

    pub fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let store: SharedStore = if config.ephemeral {
            warn!("POMOTASK_EPHEMERAL is set; nothing will be saved");
            Arc::new(MemoryStore::new())
        } else {
            let sqlite = SqliteStore::open(config.db_path())?;
            info!("Using store at {}", sqlite.path().display());
            Arc::new(sqlite)
        };

        let notifier = Arc::new(ChimeNotifier::new(store.clone(), config.sounds_dir.clone()));
        Ok(Self::new(store, notifier))
    }

    pub fn timer(&self) -> &TimerController {
        &self.timer
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }
}

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    // Reads RUST_LOG for per-module overrides
    env_logger::Builder::from_default_env()
        .filter_level(config.log_level())
        .init();

    info!("pomotask starting up...");

    let app = AppState::open(&config).context("failed to initialize pomotask")?;
    Shell::new(Arc::new(app)).run().await
}
