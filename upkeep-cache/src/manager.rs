//! Versioned asset cache lifecycle.
//!
//! [`AssetCacheManager`] drives the three cache-facing worker operations:
//!
//! - **install**: fetch every manifest asset and store the whole set in the
//!   current generation, or store nothing at all
//! - **activate**: delete every generation whose name is not the current one
//! - **resolve**: answer a request from the current generation, falling back
//!   to the network on a miss

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::network::Network;
use crate::storage::CacheStorage;
use crate::types::{AssetRequest, CachedResponse, Method};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Generation the assets were stored in.
    pub cache_name: String,
    /// Number of distinct entries written.
    pub stored: usize,
}

/// Outcome of an activation cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Generation that remains current.
    pub cache_name: String,
    /// Stale generations that were deleted.
    pub deleted: Vec<String>,
    /// Stale generations whose deletion failed, with the error message.
    pub failed: Vec<(String, String)>,
}

/// Owns the current cache generation and its lifecycle.
pub struct AssetCacheManager {
    version: String,
    manifest: Vec<String>,
    origin: Option<Url>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl AssetCacheManager {
    /// Create a manager for the generation named by `config.version`.
    pub fn new(
        config: &CacheConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            version: config.version.clone(),
            manifest: config.manifest.clone(),
            origin: config.origin_url()?,
            storage,
            network,
        })
    }

    /// Name of the current generation.
    pub fn cache_name(&self) -> &str {
        &self.version
    }

    /// Underlying storage.
    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Fetch every manifest asset and store them in the current generation.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Network`] or [`CacheError::Fetch`] when any asset
    /// cannot be fetched with a success status, and a storage error when the
    /// batch cannot be written. Nothing is stored unless every fetch
    /// succeeded.
    pub async fn install(&self) -> Result<InstallReport> {
        info!(
            cache = %self.version,
            assets = self.manifest.len(),
            "installing asset cache"
        );

        let responses = try_join_all(self.manifest.iter().map(|locator| self.fetch_asset(locator)))
            .await
            .inspect_err(|e| warn!(cache = %self.version, "asset cache install failed: {e}"))?;

        let mut entries: Vec<(String, CachedResponse)> = Vec::with_capacity(responses.len());
        for (locator, response) in self.manifest.iter().zip(responses) {
            let key = AssetRequest::get(locator.as_str()).cache_key(self.origin.as_ref());
            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = response,
                None => entries.push((key, response)),
            }
        }

        let stored = entries.len();
        self.storage.put_all(&self.version, entries).await?;
        info!(cache = %self.version, stored, "asset cache installed");

        Ok(InstallReport {
            cache_name: self.version.clone(),
            stored,
        })
    }

    async fn fetch_asset(&self, locator: &str) -> Result<CachedResponse> {
        let response = self.network.fetch(&AssetRequest::get(locator)).await?;
        if !response.is_success() {
            return Err(CacheError::Fetch {
                url: locator.to_owned(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// Delete every generation other than the current one, including
    /// generations whose metadata the backend can no longer read.
    ///
    /// Deletions run independently; a failure is recorded in the report and
    /// never prevents the remaining deletions.
    ///
    /// # Errors
    ///
    /// Fails only when the list of existing generations cannot be read.
    pub async fn activate(&self) -> Result<ActivationReport> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.version)
            .collect();

        let outcomes = join_all(stale.iter().map(|name| self.storage.delete(name))).await;

        let mut report = ActivationReport {
            cache_name: self.version.clone(),
            ..ActivationReport::default()
        };
        for (name, outcome) in stale.into_iter().zip(outcomes) {
            match outcome {
                Ok(_) => {
                    debug!(cache = %name, "deleted stale asset cache");
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(cache = %name, "cannot delete stale asset cache: {e}");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        match self.storage.purge_unreadable(&self.version).await {
            Ok(purged) => {
                for location in &purged.removed {
                    debug!(%location, "removed unreadable asset cache");
                }
                report.deleted.extend(purged.removed);
                report.failed.extend(purged.failed);
            }
            Err(e) => warn!(cache = %self.version, "cannot scan for unreadable asset caches: {e}"),
        }

        info!(
            cache = %self.version,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "asset cache activated"
        );
        Ok(report)
    }

    /// Answer a request cache-first, falling back to the network.
    ///
    /// Only `GET` requests consult the cache. Network responses are returned
    /// unmodified and never stored. Returns `None` when neither the cache nor
    /// the network produced a response.
    pub async fn resolve(&self, request: &AssetRequest) -> Option<CachedResponse> {
        if request.method == Method::Get {
            let key = request.cache_key(self.origin.as_ref());
            match self.storage.lookup(&self.version, &key).await {
                Ok(Some(response)) => {
                    debug!(%key, "asset cache hit");
                    return Some(response);
                }
                Ok(None) => debug!(%key, "asset cache miss"),
                Err(e) => warn!(%key, "asset cache lookup failed, trying network: {e}"),
            }
        }

        match self.network.fetch(request).await {
            Ok(response) => Some(response),
            Err(e) => {
                debug!(url = %request.url, "request unresolved offline: {e}");
                None
            }
        }
    }
}
