//! Cache types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Largest payload the cache will accept (20 MiB)
pub const MAX_CACHEABLE_SIZE: u64 = 20 * 1024 * 1024;

/// Lifetime of every cache entry (8 hours)
pub const CACHE_TTL_SECS: u64 = 8 * 60 * 60;

// Keeps `cached_at + ttl` well inside chrono's representable range
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Metadata for a cached content entry.
///
/// The payload itself is owned by the backend and handed out as a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_id: String,
    pub media_type: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ContentSource>,
}

impl CacheEntry {
    /// An entry is logically absent once `now` passes its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// The blob and policy a cached payload was recovered from.
///
/// A lookup that names a source only hits entries stored from that same
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentSource {
    pub blob_id: String,
    pub policy_id: String,
}

impl ContentSource {
    pub fn new(blob_id: impl Into<String>, policy_id: impl Into<String>) -> Self {
        Self {
            blob_id: blob_id.into(),
            policy_id: policy_id.into(),
        }
    }
}

/// A cache hit: a copy of the stored payload and its media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    pub data: Vec<u8>,
    pub media_type: String,
}

/// Statistics about the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub count: usize,
    pub total_size_bytes: u64,
    /// Oldest `cached_at` in the store, or the current time when empty
    pub oldest_cached_at: DateTime<Utc>,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            total_size_bytes: 0,
            oldest_cached_at: now,
            hits: 0,
            misses: 0,
        }
    }
}

/// Size and lifetime limits applied to every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entry_size: u64,
    pub ttl: Duration,
}

impl CacheConfig {
    /// Build a config from raw limits. A zero TTL is bumped to one second
    /// so that `expires_at` always lies strictly after `cached_at`.
    pub fn new(max_entry_size: u64, ttl_secs: u64) -> Self {
        let ttl_secs = ttl_secs.clamp(1, MAX_TTL_SECS);
        Self {
            max_entry_size,
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(MAX_CACHEABLE_SIZE, CACHE_TTL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cached_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            content_id: "0xcontent".to_string(),
            media_type: "image/png".to_string(),
            cached_at,
            expires_at: cached_at + Duration::hours(8),
            size_bytes: 1024,
            tier_id: Some("tier_1".to_string()),
            source: Some(ContentSource::new("blob_1", "seal_policy_1")),
        }
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entry_size, 20 * 1024 * 1024);
        assert_eq!(config.ttl, Duration::hours(8));
    }

    #[test]
    fn test_zero_ttl_is_bumped() {
        let config = CacheConfig::new(10, 0);
        assert_eq!(config.ttl, Duration::seconds(1));
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let now = Utc::now();
        let entry = entry(now);
        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(entry.expires_at));
        assert!(entry.is_expired(entry.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn test_cache_entry_serialization() {
        let entry = entry(Utc::now());
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("image/png"));
        assert!(json.contains("tier_1"));
        assert!(json.contains("seal_policy_1"));

        let deserialized: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, entry);
    }

    #[test]
    fn test_untiered_entry_omits_tier() {
        let mut entry = entry(Utc::now());
        entry.tier_id = None;
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("tier_id"));
    }

    #[test]
    fn test_sidecar_without_source_still_loads() {
        let json = r#"{
            "content_id": "0xold",
            "media_type": "text/plain",
            "cached_at": "2024-05-01T12:00:00Z",
            "expires_at": "2024-05-01T20:00:00Z",
            "size_bytes": 3
        }"#;
        let entry: CacheEntry = serde_json::from_str(json).unwrap();
        assert!(entry.source.is_none());
        assert!(entry.tier_id.is_none());
    }

    #[test]
    fn test_empty_stats() {
        let now = Utc::now();
        let stats = CacheStats::empty(now);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.total_size_bytes, 0);
        assert_eq!(stats.oldest_cached_at, now);
    }
}
