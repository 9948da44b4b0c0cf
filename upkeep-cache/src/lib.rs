//! # upkeep-cache
//!
//! Versioned offline asset cache for the upkeep background worker.
//!
//! The application shell (a fixed manifest of root-relative paths) is stored
//! in a single named cache generation. Bumping the generation name is the only
//! way to force a full refresh.
//!
//! ## Design
//!
//! - Install is all-or-nothing: every manifest asset is fetched before any is
//!   stored, and a single failed fetch stores nothing
//! - Activation deletes every generation except the current one; deletions
//!   are independent of each other
//! - Resolution is cache-first with an unmodified network fallback; misses
//!   are never written back
//! - Storage and network sit behind async traits so the worker can run
//!   against memory, the filesystem, or a real HTTP origin

pub mod config;
pub mod error;
pub mod manager;
pub mod network;
pub mod storage;
pub mod types;

pub use config::{CacheConfig, StorageKind};
pub use error::{CacheError, Result};
pub use manager::{ActivationReport, AssetCacheManager, InstallReport};
pub use network::{HttpNetwork, Network, StaticNetwork};
pub use storage::{CacheStorage, FilesystemStorage, MemoryStorage, PurgeReport};
pub use types::{AssetRequest, CachedResponse, Method};

use std::sync::Arc;

/// Create cache storage from configuration.
///
/// # Errors
///
/// Returns [`CacheError::Config`] when the configuration is invalid or the
/// filesystem backend has no `storage_dir`, and an I/O error when the storage
/// directory cannot be created.
pub async fn storage_from_config(config: &CacheConfig) -> Result<Arc<dyn CacheStorage>> {
    config.validate()?;

    match config.storage {
        StorageKind::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageKind::Filesystem => {
            let Some(dir) = &config.storage_dir else {
                return Err(CacheError::Config(
                    "filesystem storage requires storage_dir".into(),
                ));
            };
            Ok(Arc::new(FilesystemStorage::new(dir).await?))
        }
    }
}
