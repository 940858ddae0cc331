use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::db::MigrationPolicy;

const DATA_DIR_ENV: &str = "SLEEPTRACKER_DATA_DIR";
const DEBUG_ENV: &str = "SLEEPTRACKER_DEBUG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// File name of the history database inside the data directory.
    pub database_file: String,
    /// Discard the history when the schema changes without an upgrade path.
    pub destructive_migration: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            database_file: "sleep_history_database.sqlite3".into(),
            destructive_migration: true,
        }
    }
}

impl TrackerSettings {
    pub fn migration_policy(&self) -> MigrationPolicy {
        MigrationPolicy {
            destructive_fallback: self.destructive_migration,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: TrackerSettings,
}

impl SettingsStore {
    /// Loads settings from `path`. Missing or unreadable JSON yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            TrackerSettings::default()
        };

        Ok(Self { path, data })
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.data
    }

    /// Writes the current settings out if the file does not exist yet.
    pub fn ensure_persisted(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.persist(&self.data)
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.data.database_file)
    }

    fn persist(&self, data: &TrackerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// `SLEEPTRACKER_DATA_DIR`, else `~/.sleeptracker`, else `./.sleeptracker`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(dir);
    }

    match env::var_os("HOME").filter(|value| !value.is_empty()) {
        Some(home) => PathBuf::from(home).join(".sleeptracker"),
        None => PathBuf::from(".sleeptracker"),
    }
}

pub fn debug_mode() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");

        // Act
        let store = SettingsStore::new(dir.path().join("settings.json"))
            .expect("failed to load settings");

        // Assert
        assert_eq!(store.settings(), &TrackerSettings::default());
        assert!(store.settings().migration_policy().destructive_fallback);
    }

    #[test]
    fn test_ensure_persisted_writes_defaults_once() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).expect("failed to load settings");

        // Act
        store.ensure_persisted().expect("failed to persist settings");
        fs::write(&path, r#"{"database_file":"custom.sqlite3"}"#).expect("test setup failed");
        store.ensure_persisted().expect("failed to persist settings");
        let reloaded = SettingsStore::new(path).expect("failed to reload settings");

        // Assert
        assert_eq!(reloaded.settings().database_file, "custom.sqlite3");
        assert!(reloaded.settings().destructive_migration);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"destructive_migration":false}"#).expect("test setup failed");

        // Act
        let store = SettingsStore::new(path).expect("failed to load settings");

        // Assert
        let settings = store.settings();
        assert!(!settings.destructive_migration);
        assert_eq!(settings.database_file, "sleep_history_database.sqlite3");
        assert_eq!(
            store.database_path(dir.path()),
            dir.path().join("sleep_history_database.sqlite3")
        );
    }

    #[test]
    fn test_invalid_json_falls_back_to_defaults() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").expect("test setup failed");

        // Act
        let store = SettingsStore::new(path).expect("failed to load settings");

        // Assert
        assert_eq!(store.settings(), &TrackerSettings::default());
    }
}
