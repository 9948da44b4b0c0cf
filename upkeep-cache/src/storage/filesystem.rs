//! Filesystem cache storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<sha256(cache name)>/cache.json               cache name + creation time
//! <root>/<sha256(cache name)>/entries/<sha256(key)>.json   stored entry
//! ```
//!
//! Every file is written to a uniquely named temp file and renamed into
//! place. A batch written by [`CacheStorage::put_all`] is staged completely
//! before the first rename. When staging or a rename fails, the staged files
//! and the entries already moved into place are removed, so a failed write
//! leaves no entry of that batch behind.

use crate::error::{CacheError, Result};
use crate::storage::{CacheStorage, PurgeReport};
use crate::types::CachedResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const META_FILE: &str = "cache.json";
const ENTRIES_DIR: &str = "entries";

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    name: String,
    created_at_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    response: CachedResponse,
}

/// Cache storage persisted to a directory tree.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Open (creating if needed) a storage root.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened filesystem cache storage");
        Ok(Self { root })
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.root.join(digest_hex(name))
    }

    fn entry_path(&self, name: &str, key: &str) -> PathBuf {
        self.cache_dir(name)
            .join(ENTRIES_DIR)
            .join(format!("{}.json", digest_hex(key)))
    }

    async fn read_meta(dir: &Path) -> Result<Option<CacheMeta>> {
        match fs::read(dir.join(META_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CacheError::Storage(format!("cannot parse cache metadata: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn ensure_cache(&self, name: &str) -> Result<PathBuf> {
        let dir = self.cache_dir(name);
        fs::create_dir_all(dir.join(ENTRIES_DIR)).await?;
        if Self::read_meta(&dir).await?.is_none() {
            let meta = CacheMeta {
                name: name.to_owned(),
                created_at_ms: now_epoch_millis(),
            };
            let json = serde_json::to_vec_pretty(&meta)
                .map_err(|e| CacheError::Storage(format!("cannot serialize cache metadata: {e}")))?;
            let staged = stage(&dir.join(META_FILE), &json).await?;
            fs::rename(&staged, dir.join(META_FILE)).await?;
        }
        Ok(dir)
    }
}

#[async_trait]
impl CacheStorage for FilesystemStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            match Self::read_meta(&item.path()).await {
                Ok(Some(meta)) => found.push((meta.created_at_ms, meta.name)),
                Ok(None) => debug!(path = %item.path().display(), "skipping directory without cache metadata"),
                Err(e) => warn!(path = %item.path().display(), "skipping unreadable cache: {e}"),
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(Self::read_meta(&self.cache_dir(name)).await?.is_some())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, name: &str) -> Result<bool> {
        match fs::remove_dir_all(self.cache_dir(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    #[instrument(skip(self, entries), fields(backend = "filesystem", count = entries.len()))]
    async fn put_all(&self, name: &str, entries: Vec<(String, CachedResponse)>) -> Result<()> {
        self.ensure_cache(name).await?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(entries.len());
        for (key, response) in entries {
            let path = self.entry_path(name, &key);
            let written = match serde_json::to_vec(&StoredEntry { key, response }) {
                Ok(json) => stage(&path, &json).await,
                Err(e) => Err(CacheError::Storage(format!("cannot serialize entry: {e}"))),
            };
            match written {
                Ok(temp) => staged.push((temp, path)),
                Err(e) => {
                    for (temp, _) in &staged {
                        let _ = fs::remove_file(temp).await;
                    }
                    return Err(e);
                }
            }
        }

        for (index, (temp, path)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(temp, path).await {
                warn!(path = %path.display(), "rename failed, rolling back batch: {e}");
                for (_, moved) in &staged[..index] {
                    let _ = fs::remove_file(moved).await;
                }
                for (pending, _) in &staged[index..] {
                    let _ = fs::remove_file(pending).await;
                }
                return Err(CacheError::Io(e));
            }
        }
        Ok(())
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>> {
        let bytes = match fs::read(self.entry_path(name, key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e)),
        };
        let entry: StoredEntry = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::Storage(format!("cannot parse entry for {key}: {e}")))?;
        Ok(Some(entry.response))
    }

    async fn entries(&self, name: &str) -> Result<Vec<String>> {
        let mut dir = match fs::read_dir(self.cache_dir(name).join(ENTRIES_DIR)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<StoredEntry>(&bytes) {
                Ok(entry) => keys.push(entry.key),
                Err(e) => warn!(path = %path.display(), "skipping unreadable cache entry: {e}"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn purge_unreadable(&self, keep: &str) -> Result<PurgeReport> {
        let keep_dir = digest_hex(keep);
        let mut report = PurgeReport::default();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            let label = item.file_name().to_string_lossy().into_owned();
            if label == keep_dir || !is_digest(&label) || !item.file_type().await?.is_dir() {
                continue;
            }
            if let Ok(Some(_)) = Self::read_meta(&item.path()).await {
                continue;
            }
            match fs::remove_dir_all(item.path()).await {
                Ok(()) => report.removed.push(label),
                Err(e) => report.failed.push((label, e.to_string())),
            }
        }
        Ok(report)
    }
}

fn is_digest(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Write `data` to a unique temp file next to `path` and fsync it.
async fn stage(path: &Path, data: &[u8]) -> Result<PathBuf> {
    let temp_name = format!(".tmp.{}", Uuid::new_v4());
    let temp_path = path.with_file_name(
        path.file_name()
            .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
            .unwrap_or_else(|| temp_name.clone()),
    );
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(temp_path)
}

fn digest_hex(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

fn now_epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn entry(key: &str, body: &str) -> (String, CachedResponse) {
        (
            key.to_owned(),
            CachedResponse::new(key, 200, body.to_owned()).with_header("content-type", "text/plain"),
        )
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let temp = tempfile::tempdir().expect("tempdir");
        {
            let storage = FilesystemStorage::new(temp.path()).await.unwrap();
            storage
                .put_all("v1", vec![entry("/", "root"), entry("/index.html", "index")])
                .await
                .unwrap();
        }

        let reopened = FilesystemStorage::new(temp.path()).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec!["v1"]);
        assert_eq!(reopened.entries("v1").await.unwrap(), vec!["/", "/index.html"]);

        let hit = reopened.lookup("v1", "/index.html").await.unwrap().expect("entry");
        assert_eq!(hit.body.as_ref(), b"index");
        assert_eq!(hit.header("Content-Type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn cache_names_with_separators_are_stored_safely() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(temp.path()).await.unwrap();
        storage.put_all("../escape/v1", vec![entry("/", "x")]).await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["../escape/v1"]);
        assert!(!temp.path().join("../escape").exists());
    }

    #[tokio::test]
    async fn delete_removes_generation() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(temp.path()).await.unwrap();
        storage.put_all("v1", vec![entry("/", "x")]).await.unwrap();
        storage.put_all("v2", vec![entry("/", "y")]).await.unwrap();

        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
        assert!(storage.lookup("v1", "/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_all_leaves_no_temp_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(temp.path()).await.unwrap();
        storage
            .put_all("v1", vec![entry("/a", "a"), entry("/b", "b")])
            .await
            .unwrap();

        let entries_dir = storage.cache_dir("v1").join(ENTRIES_DIR);
        let leftovers = std::fs::read_dir(entries_dir)
            .unwrap()
            .filter_map(|item| item.ok())
            .filter(|item| item.file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn failed_rename_rolls_back_the_whole_batch() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(temp.path()).await.unwrap();

        // A non-empty directory where "/b" belongs makes its rename fail
        // after "/a" is already in place.
        let blocker = storage.entry_path("v1", "/b");
        std::fs::create_dir_all(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let result = storage
            .put_all("v1", vec![entry("/a", "a"), entry("/b", "b")])
            .await;

        assert!(result.is_err());
        assert!(storage.lookup("v1", "/a").await.unwrap().is_none());
        let leftovers = std::fs::read_dir(storage.cache_dir("v1").join(ENTRIES_DIR))
            .unwrap()
            .filter_map(|item| item.ok())
            .filter(|item| item.file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn purge_removes_caches_with_unreadable_metadata() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(temp.path()).await.unwrap();
        storage.put_all("v1", vec![entry("/", "x")]).await.unwrap();
        storage.put_all("v2", vec![entry("/", "y")]).await.unwrap();
        std::fs::write(storage.cache_dir("v1").join(META_FILE), b"{\"name\":").unwrap();
        std::fs::create_dir(temp.path().join("not-a-cache")).unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
        let report = storage.purge_unreadable("v2").await.unwrap();

        assert_eq!(report.removed, vec![digest_hex("v1")]);
        assert!(report.failed.is_empty());
        assert!(!storage.cache_dir("v1").exists());
        assert!(storage.cache_dir("v2").exists());
        assert!(temp.path().join("not-a-cache").exists());
    }

    #[tokio::test]
    async fn purge_keeps_current_cache_even_when_unreadable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(temp.path()).await.unwrap();
        storage.put_all("v2", vec![entry("/", "y")]).await.unwrap();
        std::fs::write(storage.cache_dir("v2").join(META_FILE), b"").unwrap();

        let report = storage.purge_unreadable("v2").await.unwrap();

        assert_eq!(report, PurgeReport::default());
        assert!(storage.cache_dir("v2").exists());
    }

    #[tokio::test]
    async fn missing_cache_reads_as_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(temp.path()).await.unwrap();

        assert!(!storage.has("nope").await.unwrap());
        assert!(storage.entries("nope").await.unwrap().is_empty());
        assert!(storage.lookup("nope", "/").await.unwrap().is_none());
    }
}
