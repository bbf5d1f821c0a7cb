//! Size- and time-bounded cache of decrypted content

use crate::backend::CacheBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::types::{CacheConfig, CacheEntry, CacheStats, CachedContent, ContentSource};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreStatus {
    Uninitialized,
    Ready,
    Unavailable,
    Closed,
}

/// In-memory view of the persisted entries plus the tier index
struct Index {
    status: StoreStatus,
    entries: HashMap<String, CacheEntry>,
    by_tier: HashMap<String, HashSet<String>>,
}

impl Index {
    fn new() -> Self {
        Self {
            status: StoreStatus::Uninitialized,
            entries: HashMap::new(),
            by_tier: HashMap::new(),
        }
    }

    fn is_ready(&self) -> bool {
        self.status == StoreStatus::Ready
    }

    fn insert(&mut self, entry: CacheEntry) {
        self.remove(&entry.content_id);
        if let Some(tier_id) = &entry.tier_id {
            self.by_tier
                .entry(tier_id.clone())
                .or_default()
                .insert(entry.content_id.clone());
        }
        self.entries.insert(entry.content_id.clone(), entry);
    }

    fn remove(&mut self, content_id: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(content_id)?;
        if let Some(tier_id) = &entry.tier_id {
            if let Some(ids) = self.by_tier.get_mut(tier_id) {
                ids.remove(content_id);
                if ids.is_empty() {
                    self.by_tier.remove(tier_id);
                }
            }
        }
        Some(entry)
    }

    fn reset(&mut self, status: StoreStatus) {
        self.status = status;
        self.entries.clear();
        self.by_tier.clear();
    }
}

struct Inner {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    index: RwLock<Index>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// A cache of decrypted content keyed by content id.
///
/// Cloning is cheap and clones share the same store. Every mutating
/// operation holds the index write lock across its backend call, so each
/// operation is one atomic step; readers re-validate expiry on every `get`.
#[derive(Clone)]
pub struct ContentCache {
    inner: Arc<Inner>,
}

impl ContentCache {
    /// Create a cache over a backend. Call [`ContentCache::init`] before use.
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn CacheBackend>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                clock,
                index: RwLock::new(Index::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.inner.config
    }

    /// Open the backend and load surviving entries.
    ///
    /// On failure the cache stays usable in no-cache mode and the error is
    /// returned only so the caller can log it.
    pub async fn init(&self) -> Result<()> {
        let mut index = self.inner.index.write().await;
        if index.is_ready() {
            return Ok(());
        }

        let entries = match self.inner.backend.open().await {
            Ok(entries) => entries,
            Err(e) => {
                index.reset(StoreStatus::Unavailable);
                warn!(error = %e, "Content cache storage unavailable, continuing without cache");
                return Err(CacheError::StorageUnavailable(e.to_string()));
            }
        };

        index.reset(StoreStatus::Ready);
        let max_size = self.inner.config.max_entry_size;
        for entry in entries {
            if entry.size_bytes > max_size {
                // Left over from a run with a larger limit
                if let Err(e) = self.inner.backend.remove(&entry.content_id).await {
                    warn!(content_id = %entry.content_id, error = %e, "Failed to drop oversized entry");
                }
                continue;
            }
            index.insert(entry);
        }

        info!(entries = index.entries.len(), "Content cache initialized");
        Ok(())
    }

    /// Detach from the backend. Persisted entries stay on disk for the next `init`.
    pub async fn close(&self) {
        let mut index = self.inner.index.write().await;
        index.reset(StoreStatus::Closed);
        debug!("Content cache closed");
    }

    pub async fn is_available(&self) -> bool {
        self.inner.index.read().await.is_ready()
    }

    /// Store a payload, replacing any previous entry for the same id.
    ///
    /// Returns false without side effects when the payload exceeds the size
    /// limit, and false when the store is unavailable or the write fails.
    pub async fn put(
        &self,
        content_id: &str,
        payload: &[u8],
        media_type: &str,
        tier_id: Option<&str>,
    ) -> bool {
        self.store(content_id, None, payload, media_type, tier_id).await
    }

    /// Store a payload recovered from `source`. Only [`ContentCache::get_from`]
    /// with the same source will hit it.
    pub async fn put_from(
        &self,
        content_id: &str,
        source: &ContentSource,
        payload: &[u8],
        media_type: &str,
        tier_id: Option<&str>,
    ) -> bool {
        self.store(content_id, Some(source), payload, media_type, tier_id).await
    }

    async fn store(
        &self,
        content_id: &str,
        source: Option<&ContentSource>,
        payload: &[u8],
        media_type: &str,
        tier_id: Option<&str>,
    ) -> bool {
        let size = payload.len() as u64;
        let limit = self.inner.config.max_entry_size;
        if size > limit {
            debug!(content_id, size, limit, "Content too large to cache");
            return false;
        }

        let now = self.inner.clock.now();
        let entry = CacheEntry {
            content_id: content_id.to_string(),
            media_type: media_type.to_string(),
            cached_at: now,
            expires_at: now + self.inner.config.ttl,
            size_bytes: size,
            tier_id: tier_id.map(str::to_string),
            source: source.cloned(),
        };

        {
            let mut index = self.inner.index.write().await;
            if !index.is_ready() {
                return false;
            }

            if let Err(e) = self.inner.backend.write(&entry, payload).await {
                warn!(content_id, error = %e, "Failed to cache content");
                // The previous payload may already be gone
                if index.remove(content_id).is_some() {
                    if let Err(e) = self.inner.backend.remove(content_id).await {
                        warn!(content_id, error = %e, "Failed to remove stale cache entry");
                    }
                }
                return false;
            }
            index.insert(entry);
        }

        debug!(content_id, size, tier_id = ?tier_id, "Cached content");
        self.spawn_sweep();
        true
    }

    fn spawn_sweep(&self) {
        let cache = self.clone();
        tokio::spawn(async move {
            cache.sweep_expired().await;
        });
    }

    /// Look up a payload. Expired entries are removed and reported as a miss.
    pub async fn get(&self, content_id: &str) -> Option<CachedContent> {
        self.lookup(content_id, None).await
    }

    /// Look up a payload stored from `source`.
    ///
    /// An entry recovered from a different blob or policy is a miss and is
    /// left in place for the next `put_from` to replace.
    pub async fn get_from(
        &self,
        content_id: &str,
        source: &ContentSource,
    ) -> Option<CachedContent> {
        self.lookup(content_id, Some(source)).await
    }

    async fn lookup(
        &self,
        content_id: &str,
        expected: Option<&ContentSource>,
    ) -> Option<CachedContent> {
        let now = self.inner.clock.now();

        let lookup = {
            let index = self.inner.index.read().await;
            if !index.is_ready() {
                return None;
            }
            match index.entries.get(content_id) {
                None => Lookup::Missing,
                Some(entry) if entry.is_expired(now) => Lookup::Expired,
                Some(entry) if expected.is_some_and(|s| entry.source.as_ref() != Some(s)) => {
                    Lookup::OtherSource
                }
                Some(entry) => match self.inner.backend.read(content_id).await {
                    Ok(data) => Lookup::Hit(CachedContent {
                        data,
                        media_type: entry.media_type.clone(),
                    }),
                    Err(e) => Lookup::Unreadable(e),
                },
            }
        };

        match lookup {
            Lookup::Hit(content) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                debug!(content_id, size = content.data.len(), "Cache hit");
                return Some(content);
            }
            Lookup::Missing => {}
            Lookup::OtherSource => {
                debug!(content_id, "Cached content came from another source");
            }
            Lookup::Expired => {
                debug!(content_id, "Cached content expired, removing");
                self.remove_if_expired(content_id, now).await;
            }
            Lookup::Unreadable(e) => {
                warn!(content_id, error = %e, "Failed to read cached content, removing entry");
                self.delete(content_id).await;
            }
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Whether an unexpired entry exists, without reading its payload
    pub async fn contains(&self, content_id: &str) -> bool {
        let now = self.inner.clock.now();
        let index = self.inner.index.read().await;
        index.is_ready()
            && index
                .entries
                .get(content_id)
                .is_some_and(|entry| !entry.is_expired(now))
    }

    // A put may have refreshed the entry since it was seen expired
    async fn remove_if_expired(&self, content_id: &str, now: DateTime<Utc>) {
        let mut index = self.inner.index.write().await;
        let still_expired = index
            .entries
            .get(content_id)
            .is_some_and(|entry| entry.is_expired(now));
        if still_expired {
            index.remove(content_id);
            if let Err(e) = self.inner.backend.remove(content_id).await {
                warn!(content_id, error = %e, "Failed to remove expired entry");
            }
        }
    }

    /// Remove a single entry. Removing an absent id is a no-op.
    pub async fn delete(&self, content_id: &str) {
        let mut index = self.inner.index.write().await;
        if !index.is_ready() || index.remove(content_id).is_none() {
            return;
        }
        if let Err(e) = self.inner.backend.remove(content_id).await {
            warn!(content_id, error = %e, "Failed to remove cached content");
        }
        debug!(content_id, "Cleared cached content");
    }

    /// Remove every entry cached under a tier, returning how many were removed
    pub async fn delete_by_tier(&self, tier_id: &str) -> usize {
        let mut index = self.inner.index.write().await;
        if !index.is_ready() {
            return 0;
        }

        let ids = index.by_tier.remove(tier_id).unwrap_or_default();
        let mut removed = 0;
        for content_id in ids {
            if index.entries.remove(&content_id).is_none() {
                continue;
            }
            removed += 1;
            if let Err(e) = self.inner.backend.remove(&content_id).await {
                warn!(content_id = %content_id, error = %e, "Failed to remove tier entry");
            }
        }

        debug!(tier_id, removed, "Cleared cache for tier");
        removed
    }

    /// Remove every entry
    pub async fn clear(&self) {
        let mut index = self.inner.index.write().await;
        if !index.is_ready() {
            return;
        }
        if let Err(e) = self.inner.backend.clear().await {
            warn!(error = %e, "Failed to clear cache storage");
        }
        index.reset(StoreStatus::Ready);
        info!("All content cache cleared");
    }

    /// Remove every entry whose expiry has been reached
    pub async fn sweep_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let mut index = self.inner.index.write().await;
        if !index.is_ready() {
            return 0;
        }

        let expired: Vec<String> = index
            .entries
            .values()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.content_id.clone())
            .collect();

        for content_id in &expired {
            index.remove(content_id);
            if let Err(e) = self.inner.backend.remove(content_id).await {
                warn!(content_id = %content_id, error = %e, "Failed to remove expired entry");
            }
        }

        if !expired.is_empty() {
            info!(removed = expired.len(), "Cleaned up expired cache entries");
        }
        expired.len()
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let now = self.inner.clock.now();
        let index = self.inner.index.read().await;
        if !index.is_ready() {
            return CacheStats::empty(now);
        }

        CacheStats {
            count: index.entries.len(),
            total_size_bytes: index.entries.values().map(|e| e.size_bytes).sum(),
            oldest_cached_at: index
                .entries
                .values()
                .map(|e| e.cached_at)
                .min()
                .unwrap_or(now),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

enum Lookup {
    Hit(CachedContent),
    Missing,
    OtherSource,
    Expired,
    Unreadable(CacheError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileBackend, MemoryBackend};
    use crate::clock::ManualClock;
    use crate::types::MAX_CACHEABLE_SIZE;
    use async_trait::async_trait;
    use chrono::Duration;
    use tempfile::tempdir;

    fn manual_cache() -> (ContentCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = ContentCache::with_clock(
            Arc::new(MemoryBackend::new()),
            CacheConfig::default(),
            clock.clone(),
        );
        (cache, clock)
    }

    async fn ready_cache() -> (ContentCache, Arc<ManualClock>) {
        let (cache, clock) = manual_cache();
        cache.init().await.unwrap();
        (cache, clock)
    }

    /// Backend whose store can't be opened, like a browser with storage disabled
    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn open(&self) -> Result<Vec<CacheEntry>> {
            Err(CacheError::Io(Box::new(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "storage disabled",
            ))))
        }
        async fn write(&self, _: &CacheEntry, _: &[u8]) -> Result<()> {
            unreachable!("writes never reach an unopened backend")
        }
        async fn read(&self, _: &str) -> Result<Vec<u8>> {
            unreachable!("reads never reach an unopened backend")
        }
        async fn remove(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Opens fine but rejects every write, like a full quota
    struct FullBackend;

    #[async_trait]
    impl CacheBackend for FullBackend {
        async fn open(&self) -> Result<Vec<CacheEntry>> {
            Ok(Vec::new())
        }
        async fn write(&self, _: &CacheEntry, _: &[u8]) -> Result<()> {
            Err(CacheError::StorageUnavailable("quota exceeded".to_string()))
        }
        async fn read(&self, _: &str) -> Result<Vec<u8>> {
            Err(CacheError::Metadata("empty".to_string()))
        }
        async fn remove(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (cache, _) = ready_cache().await;

        assert!(cache.put("0x1", b"Hello, world!", "text/plain", None).await);

        let content = cache.get("0x1").await.unwrap();
        assert_eq!(content.data, b"Hello, world!");
        assert_eq!(content.media_type, "text/plain");
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let (cache, _) = ready_cache().await;
        assert!(cache.get("0xnonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_previous_entry() {
        let (cache, _) = ready_cache().await;

        cache.put("0x1", b"first", "text/plain", Some("tier_a")).await;
        cache.put("0x1", b"second!", "text/markdown", Some("tier_b")).await;

        let content = cache.get("0x1").await.unwrap();
        assert_eq!(content.data, b"second!");
        assert_eq!(content.media_type, "text/markdown");

        let stats = cache.stats().await;
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total_size_bytes, 7);

        // The old tier no longer owns the entry
        assert_eq!(cache.delete_by_tier("tier_a").await, 0);
        assert!(cache.contains("0x1").await);
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let (cache, _) = ready_cache().await;
        let payload = vec![0u8; MAX_CACHEABLE_SIZE as usize + 1];

        assert!(!cache.put("0xbig", &payload, "video/mp4", None).await);
        assert!(cache.get("0xbig").await.is_none());
        assert_eq!(cache.stats().await.count, 0);
    }

    #[tokio::test]
    async fn test_payload_at_limit_accepted() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = ContentCache::new(backend, CacheConfig::new(4, 60));
        cache.init().await.unwrap();

        assert!(cache.put("0x1", b"1234", "text/plain", None).await);
        assert!(!cache.put("0x2", b"12345", "text/plain", None).await);
    }

    #[tokio::test]
    async fn test_entry_timestamps() {
        let (cache, clock) = ready_cache().await;
        let start = clock.now();
        cache.put("0x1", b"data", "text/plain", None).await;

        let stats = cache.stats().await;
        assert_eq!(stats.oldest_cached_at, start);

        let index = cache.inner.index.read().await;
        let entry = index.entries.get("0x1").unwrap();
        assert_eq!(entry.cached_at, start);
        assert_eq!(entry.expires_at - entry.cached_at, Duration::hours(8));
    }

    #[tokio::test]
    async fn test_get_after_ttl_removes_entry() {
        let (cache, clock) = ready_cache().await;
        cache.put("0x1", b"data", "text/plain", None).await;
        assert_eq!(cache.stats().await.count, 1);

        clock.advance(Duration::hours(8) + Duration::milliseconds(1));
        assert!(cache.get("0x1").await.is_none());
        assert_eq!(cache.stats().await.count, 0);
    }

    #[tokio::test]
    async fn test_hit_just_before_ttl() {
        let (cache, clock) = ready_cache().await;
        cache.put("0x1", b"data", "text/plain", None).await;

        clock.advance(Duration::hours(7) + Duration::minutes(59));
        assert!(cache.get("0x1").await.is_some());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (cache, _) = ready_cache().await;
        cache.put("0x1", b"a", "text/plain", None).await;
        cache.put("0x2", b"b", "text/plain", None).await;

        cache.delete("0x1").await;
        cache.delete("0x1").await;

        assert!(cache.get("0x1").await.is_none());
        assert!(cache.get("0x2").await.is_some());
        assert_eq!(cache.stats().await.count, 1);
    }

    #[tokio::test]
    async fn test_delete_by_tier_only_touches_that_tier() {
        let (cache, _) = ready_cache().await;
        cache.put("a1", b"a", "text/plain", Some("tier_a")).await;
        cache.put("a2", b"a", "text/plain", Some("tier_a")).await;
        cache.put("b1", b"b", "text/plain", Some("tier_b")).await;
        cache.put("free", b"f", "text/plain", None).await;

        assert_eq!(cache.delete_by_tier("tier_a").await, 2);
        assert_eq!(cache.delete_by_tier("tier_a").await, 0);
        assert_eq!(cache.delete_by_tier("tier_unknown").await, 0);

        let remaining: HashSet<String> = cache
            .inner
            .index
            .read()
            .await
            .entries
            .keys()
            .cloned()
            .collect();
        let expected: HashSet<String> = ["b1", "free"].iter().map(|s| s.to_string()).collect();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn test_clear_twice() {
        let (cache, _) = ready_cache().await;
        cache.put("0x1", b"a", "text/plain", Some("t")).await;
        cache.put("0x2", b"b", "text/plain", None).await;

        cache.clear().await;
        cache.clear().await;

        assert_eq!(cache.stats().await.count, 0);
        assert!(cache.get("0x1").await.is_none());
        // Still usable afterwards
        assert!(cache.put("0x3", b"c", "text/plain", None).await);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let (cache, clock) = ready_cache().await;
        cache.put("old", b"old", "text/plain", None).await;
        clock.advance(Duration::hours(4));
        cache.put("new", b"new", "text/plain", None).await;

        clock.advance(Duration::hours(4));
        assert_eq!(cache.sweep_expired().await, 1);
        assert!(cache.contains("new").await);
        assert!(!cache.contains("old").await);

        assert_eq!(cache.sweep_expired().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_on_empty_store() {
        let (cache, _) = ready_cache().await;
        assert_eq!(cache.sweep_expired().await, 0);
    }

    #[tokio::test]
    async fn test_stats_and_counters() {
        let (cache, clock) = ready_cache().await;
        let start = clock.now();

        let stats = cache.stats().await;
        assert_eq!(stats.count, 0);
        assert_eq!(stats.oldest_cached_at, start);

        cache.get("0x1").await;
        cache.put("0x1", b"test data", "text/plain", None).await;
        clock.advance(Duration::minutes(1));
        cache.put("0x2", b"more", "text/plain", None).await;
        cache.get("0x1").await;

        let stats = cache.stats().await;
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_size_bytes, 13);
        assert_eq!(stats.oldest_cached_at, start);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_uninitialized_cache_degrades() {
        let (cache, _) = manual_cache();

        assert!(!cache.put("0x1", b"data", "text/plain", None).await);
        assert!(cache.get("0x1").await.is_none());
        assert_eq!(cache.stats().await.count, 0);
    }

    #[tokio::test]
    async fn test_unavailable_storage_degrades() {
        let cache = ContentCache::new(Arc::new(BrokenBackend), CacheConfig::default());

        let err = cache.init().await.unwrap_err();
        assert!(matches!(err, CacheError::StorageUnavailable(_)));
        assert!(!cache.is_available().await);

        assert!(!cache.put("0x1", b"data", "text/plain", None).await);
        assert!(cache.get("0x1").await.is_none());
        cache.delete("0x1").await;
        cache.delete_by_tier("tier").await;
        cache.clear().await;
        assert_eq!(cache.sweep_expired().await, 0);
        assert_eq!(cache.stats().await.count, 0);
    }

    #[tokio::test]
    async fn test_failed_write_is_not_stored() {
        let cache = ContentCache::new(Arc::new(FullBackend), CacheConfig::default());
        cache.init().await.unwrap();

        assert!(!cache.put("0x1", b"data", "text/plain", None).await);
        assert!(cache.get("0x1").await.is_none());
        assert_eq!(cache.stats().await.count, 0);
    }

    /// Accepts the first write, then fails every write and removal
    struct WornBackend {
        inner: MemoryBackend,
        worn: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CacheBackend for WornBackend {
        async fn open(&self) -> Result<Vec<CacheEntry>> {
            self.inner.open().await
        }
        async fn write(&self, entry: &CacheEntry, payload: &[u8]) -> Result<()> {
            if self.worn.swap(true, Ordering::SeqCst) {
                return Err(CacheError::StorageUnavailable("disk failing".to_string()));
            }
            self.inner.write(entry, payload).await
        }
        async fn read(&self, content_id: &str) -> Result<Vec<u8>> {
            self.inner.read(content_id).await
        }
        async fn remove(&self, _: &str) -> Result<()> {
            Err(CacheError::StorageUnavailable("disk failing".to_string()))
        }
        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn test_failed_rewrite_drops_previous_entry() {
        let backend = Arc::new(WornBackend {
            inner: MemoryBackend::new(),
            worn: std::sync::atomic::AtomicBool::new(false),
        });
        let cache = ContentCache::new(backend, CacheConfig::default());
        cache.init().await.unwrap();

        assert!(cache.put("0x1", b"first", "text/plain", Some("tier_1")).await);
        // The rewrite fails and so does removing the old payload
        assert!(!cache.put("0x1", b"second", "text/plain", Some("tier_1")).await);

        assert!(cache.get("0x1").await.is_none());
        assert_eq!(cache.stats().await.count, 0);
        assert_eq!(cache.delete_by_tier("tier_1").await, 0);
    }

    #[tokio::test]
    async fn test_source_bound_lookup() {
        let (cache, _) = ready_cache().await;
        let genuine = ContentSource::new("blob_real", "seal_policy_real");
        let forged = ContentSource::new("blob_forged", "seal_policy_forged");

        assert!(
            cache
                .put_from("0xvictim", &forged, b"forged", "text/plain", Some("tier_1"))
                .await
        );

        // Entry from another source is a miss, and stays put
        assert!(cache.get_from("0xvictim", &genuine).await.is_none());
        assert!(cache.contains("0xvictim").await);
        assert_eq!(cache.stats().await.misses, 1);
        assert_eq!(
            cache.get_from("0xvictim", &forged).await.unwrap().data,
            b"forged"
        );

        assert!(
            cache
                .put_from("0xvictim", &genuine, b"genuine", "text/plain", Some("tier_1"))
                .await
        );
        assert_eq!(
            cache.get_from("0xvictim", &genuine).await.unwrap().data,
            b"genuine"
        );
        assert!(cache.get_from("0xvictim", &forged).await.is_none());
    }

    #[tokio::test]
    async fn test_unsourced_entry_misses_sourced_lookup() {
        let (cache, _) = ready_cache().await;
        cache.put("0x1", b"data", "text/plain", None).await;

        let source = ContentSource::new("blob", "seal_policy");
        assert!(cache.get_from("0x1", &source).await.is_none());
        assert!(cache.get("0x1").await.is_some());
    }

    #[tokio::test]
    async fn test_close_and_reinit_keeps_entries() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = ContentCache::new(backend.clone(), CacheConfig::default());
        cache.init().await.unwrap();
        cache.put("0x1", b"data", "text/plain", Some("tier")).await;

        cache.close().await;
        assert!(cache.get("0x1").await.is_none());

        cache.init().await.unwrap();
        assert_eq!(cache.get("0x1").await.unwrap().data, b"data");
        assert_eq!(cache.delete_by_tier("tier").await, 1);
    }

    #[tokio::test]
    async fn test_file_cache_survives_restart() {
        let dir = tempdir().unwrap();

        let cache = ContentCache::new(
            Arc::new(FileBackend::new(dir.path())),
            CacheConfig::default(),
        );
        cache.init().await.unwrap();
        assert!(cache.put("0xabc", b"persisted", "image/png", Some("tier_1")).await);
        cache.close().await;

        let reopened = ContentCache::new(
            Arc::new(FileBackend::new(dir.path())),
            CacheConfig::default(),
        );
        reopened.init().await.unwrap();

        let content = reopened.get("0xabc").await.unwrap();
        assert_eq!(content.data, b"persisted");
        assert_eq!(content.media_type, "image/png");

        assert_eq!(reopened.delete_by_tier("tier_1").await, 1);
        assert!(reopened.get("0xabc").await.is_none());
    }

    #[tokio::test]
    async fn test_init_drops_entries_over_new_limit() {
        let backend = Arc::new(MemoryBackend::new());
        let big = ContentCache::new(backend.clone(), CacheConfig::new(100, 60));
        big.init().await.unwrap();
        big.put("large", &[1u8; 50], "application/octet-stream", None).await;
        big.put("small", &[1u8; 5], "application/octet-stream", None).await;

        let small = ContentCache::new(backend, CacheConfig::new(10, 60));
        small.init().await.unwrap();
        assert!(!small.contains("large").await);
        assert!(small.contains("small").await);
    }

    #[tokio::test]
    async fn test_concurrent_puts_and_sweeps() {
        let (cache, _) = ready_cache().await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("0x{i}");
                cache.put(&id, id.as_bytes(), "text/plain", None).await;
                cache.sweep_expired().await;
                cache.get(&id).await.map(|c| c.data)
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let data = handle.await.unwrap();
            assert_eq!(data, Some(format!("0x{i}").into_bytes()));
        }
        assert_eq!(cache.stats().await.count, 16);
    }
}
