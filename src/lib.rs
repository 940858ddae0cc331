mod db;
mod error;
mod format;
mod quality;
mod settings;
mod shell;
mod signals;
mod tracker;
mod utils;

use std::fs;

use anyhow::{Context, Result};
use tokio::io::{self, BufReader};

pub use db::{Database, MigrationPolicy, SleepNight, SleepQuality, UNRATED_QUALITY};
pub use error::{TrackerError, TrackerResult};
pub use format::format_nights;
pub use quality::SleepQualityRecorder;
pub use settings::{SettingsStore, TrackerSettings};
pub use shell::Shell;
pub use signals::SignalQueue;
pub use tracker::{Clock, SleepTrackerController, TrackerEvent, TrackerSnapshot};

pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let default_level = if settings::debug_mode() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    log::info!("Sleep tracker starting up...");

    let data_dir = settings::data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join("settings.json"))?;
    settings_store.ensure_persisted()?;

    let database = Database::shared(
        settings_store.database_path(&data_dir),
        settings_store.settings().migration_policy(),
    )?;

    let tracker = SleepTrackerController::open(database.clone()).await?;
    let recorder = SleepQualityRecorder::new(database);

    Shell::new(tracker, recorder, BufReader::new(io::stdin()), io::stdout())
        .run()
        .await?;

    log::info!("Sleep tracker shutting down");
    Ok(())
}
