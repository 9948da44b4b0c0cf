//! Asset cache configuration with sensible defaults.
//!
//! [`CacheConfig`] names the current cache generation, lists the assets the
//! application shell needs offline, and selects the storage backend.

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Storage backend used for cache generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Volatile in-process storage.
    #[default]
    Memory,
    /// One directory per cache generation under `storage_dir`.
    Filesystem,
}

/// Configuration for the offline asset cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the current cache generation. Bumping it forces a full
    /// asset refresh on the next install/activate cycle.
    pub version: String,
    /// Root-relative paths that must be cached on install.
    pub manifest: Vec<String>,
    /// Origin the application is served from, e.g. `https://app.example`.
    ///
    /// Used to resolve manifest paths for network fetches and to match
    /// absolute request URLs against cached paths.
    pub origin: Option<String>,
    /// Storage backend.
    pub storage: StorageKind,
    /// Root directory for [`StorageKind::Filesystem`].
    pub storage_dir: Option<PathBuf>,
    /// HTTP request timeout in seconds for network fetches.
    pub request_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: "upkeep-v1".to_owned(),
            manifest: vec![
                "/".to_owned(),
                "/index.html".to_owned(),
                "/manifest.json".to_owned(),
            ],
            origin: None,
            storage: StorageKind::Memory,
            storage_dir: None,
            request_timeout_secs: 30,
        }
    }
}

impl CacheConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `version` must not be blank
    /// - every manifest entry must be a root-relative path
    /// - `origin`, when set, must parse as an absolute URL
    /// - `request_timeout_secs` must be greater than 0
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.version.trim().is_empty() {
            return Err(CacheError::Config("version must not be empty".into()));
        }
        if let Some(bad) = self.manifest.iter().find(|path| !path.starts_with('/')) {
            return Err(CacheError::Config(format!(
                "manifest entry '{bad}' must be a root-relative path"
            )));
        }
        self.origin_url()?;
        if self.request_timeout_secs == 0 {
            return Err(CacheError::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parsed [`CacheConfig::origin`].
    pub fn origin_url(&self) -> Result<Option<Url>, CacheError> {
        self.origin
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| CacheError::Config(format!("invalid origin '{raw}': {e}")))
            })
            .transpose()
    }
}
