//! Cache storage trait and backends.
//!
//! A backend holds any number of named caches ("generations"); each cache
//! maps a request key (see [`AssetRequest::cache_key`](crate::AssetRequest::cache_key))
//! to a stored response.

pub mod filesystem;
pub mod memory;

use crate::error::Result;
use crate::types::CachedResponse;
use async_trait::async_trait;

pub use filesystem::FilesystemStorage;
pub use memory::MemoryStorage;

/// Caches removed by [`CacheStorage::purge_unreadable`], labelled by their
/// backend location since their names cannot be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Named cache storage.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of all existing caches.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Returns `true` when a cache with this name exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Delete a cache and all of its entries.
    ///
    /// Returns `false` when no cache with this name existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Store every entry into `name`, creating the cache when absent.
    ///
    /// Existing entries with the same key are replaced.
    async fn put_all(&self, name: &str, entries: Vec<(String, CachedResponse)>) -> Result<()>;

    /// Look up one entry.
    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>>;

    /// Keys stored in `name`, sorted. Empty when the cache does not exist.
    async fn entries(&self, name: &str) -> Result<Vec<String>>;

    /// Remove caches that [`keys`](Self::keys) cannot name, except the cache
    /// called `keep`. Backends that cannot hold such caches remove nothing.
    async fn purge_unreadable(&self, keep: &str) -> Result<PurgeReport> {
        let _ = keep;
        Ok(PurgeReport::default())
    }
}
