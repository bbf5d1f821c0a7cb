//! Persistent cache for decrypted content
//!
//! Stores decrypted payloads keyed by content identifier, bounded by a
//! maximum entry size and a uniform TTL, with a secondary index by tier
//! so a cancelled subscription can drop everything it unlocked.
//!
//! The cache is best-effort: when the underlying storage cannot be opened
//! every operation degrades to a miss or a no-op instead of failing.

mod backend;
mod cache;
mod clock;
mod error;
mod types;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};
pub use cache::ContentCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use types::{
    CacheConfig, CacheEntry, CacheStats, CachedContent, ContentSource, CACHE_TTL_SECS,
    MAX_CACHEABLE_SIZE,
};
