//! Persistence backends for cached payloads and their metadata

use crate::error::{CacheError, Result};
use crate::types::CacheEntry;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A key-value persistence capability for cache entries.
///
/// Each call is a single step against the store; `ContentCache` serializes
/// mutating calls so that every cache operation is atomic.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Open the store and return every entry that survived from a previous run
    async fn open(&self) -> Result<Vec<CacheEntry>>;

    /// Write (or replace) an entry and its payload
    async fn write(&self, entry: &CacheEntry, payload: &[u8]) -> Result<()>;

    /// Read the payload for an entry
    async fn read(&self, content_id: &str) -> Result<Vec<u8>>;

    /// Remove an entry; removing a missing entry is not an error
    async fn remove(&self, content_id: &str) -> Result<()>;

    /// Remove every entry
    async fn clear(&self) -> Result<()>;
}

const PAYLOAD_EXT: &str = "bin";
const METADATA_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";

/// Stores each entry as a payload file plus a JSON metadata sidecar.
///
/// Files are named by the SHA-256 of the content id so arbitrary ids are
/// safe on disk. The sidecar is written last through a rename, so a
/// readable sidecar always has its payload next to it.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Generate the on-disk key for a content id
    pub fn storage_key(content_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, key: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ext))
    }

    async fn remove_file_if_present(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_sidecar(&self, path: &Path) -> Result<CacheEntry> {
        let raw = fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn open(&self) -> Result<Vec<CacheEntry>> {
        fs::create_dir_all(&self.dir).await?;

        let mut sidecars = Vec::new();
        let mut payloads = HashSet::new();
        let mut leftovers = Vec::new();

        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };
            match path.extension().and_then(|e| e.to_str()) {
                Some(METADATA_EXT) => sidecars.push((stem, path)),
                Some(PAYLOAD_EXT) => {
                    payloads.insert(stem);
                }
                Some(TEMP_EXT) => leftovers.push(path),
                _ => {}
            }
        }

        let mut entries = Vec::with_capacity(sidecars.len());
        for (key, path) in sidecars {
            let entry = match self.load_sidecar(&path).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Dropping unreadable cache metadata");
                    leftovers.push(path);
                    leftovers.push(self.path_for(&key, PAYLOAD_EXT));
                    payloads.remove(&key);
                    continue;
                }
            };

            if Self::storage_key(&entry.content_id) != key || !payloads.remove(&key) {
                warn!(content_id = %entry.content_id, "Dropping cache metadata without payload");
                leftovers.push(path);
                continue;
            }
            entries.push(entry);
        }

        // Payloads whose metadata never landed
        for key in payloads {
            leftovers.push(self.path_for(&key, PAYLOAD_EXT));
        }
        for path in leftovers {
            Self::remove_file_if_present(&path).await?;
        }

        info!(dir = ?self.dir, entries = entries.len(), "Opened file cache backend");
        Ok(entries)
    }

    async fn write(&self, entry: &CacheEntry, payload: &[u8]) -> Result<()> {
        let key = Self::storage_key(&entry.content_id);
        let metadata = serde_json::to_vec(entry)?;

        let sidecar = self.path_for(&key, METADATA_EXT);
        // Invalidate the old sidecar first so a failed payload write can't
        // leave old metadata pointing at new bytes
        Self::remove_file_if_present(&sidecar).await?;
        fs::write(self.path_for(&key, PAYLOAD_EXT), payload).await?;

        let temp = self.path_for(&key, TEMP_EXT);
        fs::write(&temp, metadata).await?;
        fs::rename(&temp, &sidecar).await?;

        debug!(content_id = %entry.content_id, key = %key, "Wrote cache entry to disk");
        Ok(())
    }

    async fn read(&self, content_id: &str) -> Result<Vec<u8>> {
        let key = Self::storage_key(content_id);
        Ok(fs::read(self.path_for(&key, PAYLOAD_EXT)).await?)
    }

    async fn remove(&self, content_id: &str) -> Result<()> {
        let key = Self::storage_key(content_id);
        Self::remove_file_if_present(&self.path_for(&key, METADATA_EXT)).await?;
        Self::remove_file_if_present(&self.path_for(&key, PAYLOAD_EXT)).await
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}

/// Keeps entries in process memory.
///
/// Survives `ContentCache::close` / `init` cycles as long as the backend
/// itself is shared, which makes it a stand-in for persistent storage in tests.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, (CacheEntry, Vec<u8>)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn open(&self) -> Result<Vec<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.values().map(|(entry, _)| entry.clone()).collect())
    }

    async fn write(&self, entry: &CacheEntry, payload: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.content_id.clone(), (entry.clone(), payload.to_vec()));
        Ok(())
    }

    async fn read(&self, content_id: &str) -> Result<Vec<u8>> {
        let entries = self.entries.read().await;
        entries
            .get(content_id)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| {
                CacheError::Io(Box::new(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("no payload for {}", content_id),
                )))
            })
    }

    async fn remove(&self, content_id: &str) -> Result<()> {
        self.entries.write().await.remove(content_id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
