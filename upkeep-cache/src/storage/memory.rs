//! Volatile in-process cache storage.

use crate::error::Result;
use crate::storage::CacheStorage;
use crate::types::CachedResponse;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

type Generation = BTreeMap<String, CachedResponse>;

/// Cache storage kept entirely in memory.
///
/// Cache names are reported in creation order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    caches: RwLock<Vec<(String, Generation)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        let caches = self.caches.read().await;
        Ok(caches.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        let caches = self.caches.read().await;
        Ok(caches.iter().any(|(existing, _)| existing == name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(existing, _)| existing != name);
        Ok(caches.len() != before)
    }

    async fn put_all(&self, name: &str, entries: Vec<(String, CachedResponse)>) -> Result<()> {
        let mut caches = self.caches.write().await;
        let index = match caches.iter().position(|(existing, _)| existing == name) {
            Some(index) => index,
            None => {
                caches.push((name.to_owned(), Generation::new()));
                caches.len() - 1
            }
        };
        let generation = &mut caches[index].1;
        for (key, response) in entries {
            generation.insert(key, response);
        }
        Ok(())
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>> {
        let caches = self.caches.read().await;
        Ok(caches
            .iter()
            .find(|(existing, _)| existing == name)
            .and_then(|(_, generation)| generation.get(key).cloned()))
    }

    async fn entries(&self, name: &str) -> Result<Vec<String>> {
        let caches = self.caches.read().await;
        Ok(caches
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, generation)| generation.keys().cloned().collect())
            .unwrap_or_default())
    }
}
