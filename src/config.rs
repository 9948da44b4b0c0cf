//! Configuration types for the background worker.

use crate::error::{Result, WorkerError};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use upkeep_cache::{CacheConfig, StorageKind};

/// Top-level worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Page opened when a notification is activated and no page is open.
    pub app_root: String,
    /// Offline asset cache settings.
    pub cache: CacheConfig,
    /// Due-task detection settings.
    pub schedule: ScheduleConfig,
    /// System notification settings.
    pub notification: NotificationConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_root: "/".to_owned(),
            cache: CacheConfig::default(),
            schedule: ScheduleConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

/// Due-task detection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// A task notifies when its scheduled time is less than this many
    /// seconds away (and not yet reached).
    pub due_window_secs: u64,
    /// Tag of the periodic background trigger that runs due checks.
    pub periodic_tag: String,
    /// Tag of the on-demand background sync trigger (reserved, no-op).
    pub sync_tag: String,
    /// Minimum interval requested for the periodic trigger.
    pub min_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            due_window_secs: 60,
            periodic_tag: "check-tasks".to_owned(),
            sync_tag: "sync-tasks".to_owned(),
            min_interval_secs: 60,
        }
    }
}

impl ScheduleConfig {
    /// Due window as a signed time delta.
    #[must_use]
    pub fn due_window(&self) -> TimeDelta {
        i64::try_from(self.due_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Periodic trigger interval.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }
}

/// System notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Vibration pattern in milliseconds (vibrate, pause, vibrate, ...).
    pub vibrate: Vec<u32>,
    /// Keep the notification until the user dismisses it.
    pub require_interaction: bool,
    /// Icon URL.
    pub icon: Option<String>,
    /// Badge URL.
    pub badge: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            vibrate: vec![200, 100, 200],
            require_interaction: true,
            icon: None,
            badge: None,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| WorkerError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WorkerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path: `<config dir>/upkeep/worker.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("upkeep").join("worker.toml"))
    }

    /// Default root for filesystem cache storage: `<data dir>/upkeep/caches`.
    pub fn default_storage_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("upkeep").join("caches"))
    }

    /// Fill in derived defaults (filesystem storage directory).
    #[must_use]
    pub fn resolved(mut self) -> Self {
        if self.cache.storage == StorageKind::Filesystem && self.cache.storage_dir.is_none() {
            self.cache.storage_dir = Self::default_storage_dir();
        }
        self
    }

    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.cache
            .validate()
            .map_err(|e| WorkerError::Config(format!("cache: {e}")))?;
        if self.schedule.due_window_secs == 0 {
            return Err(WorkerError::Config(
                "schedule.due_window_secs must be greater than 0".into(),
            ));
        }
        if self.schedule.periodic_tag.trim().is_empty() {
            return Err(WorkerError::Config(
                "schedule.periodic_tag must not be empty".into(),
            ));
        }
        if self.schedule.sync_tag.trim().is_empty() {
            return Err(WorkerError::Config(
                "schedule.sync_tag must not be empty".into(),
            ));
        }
        if self.schedule.periodic_tag == self.schedule.sync_tag {
            return Err(WorkerError::Config(
                "schedule.periodic_tag and schedule.sync_tag must differ".into(),
            ));
        }
        if self.schedule.min_interval_secs == 0 {
            return Err(WorkerError::Config(
                "schedule.min_interval_secs must be greater than 0".into(),
            ));
        }
        if !self.app_root.starts_with('/') {
            return Err(WorkerError::Config(
                "app_root must be a root-relative path".into(),
            ));
        }
        Ok(())
    }
}
