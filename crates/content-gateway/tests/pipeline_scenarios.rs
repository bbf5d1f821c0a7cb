//! End-to-end scenarios through the content pipeline and view controller

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use content_cache::{CacheConfig, ContentCache, ManualClock, MemoryBackend};
use content_gateway::{
    ContentDescriptor, ContentError, ContentPipeline, ViewController, ViewState,
};
use sealed_content::{AccessPolicy, AccessProof, MemoryKeyRegistry, SealService, StaticAccessList};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use walrus_client::{BlobStore, MemoryBlobStore, UploadedBlob};

/// Blob store that parks downloads of one chosen blob until released
#[derive(Default)]
struct GatedStore {
    inner: MemoryBlobStore,
    held: Mutex<Option<String>>,
    arrived: Notify,
    release: Notify,
}

impl GatedStore {
    fn hold(&self, blob_id: &str) {
        *self.held.lock().unwrap() = Some(blob_id.to_string());
    }
}

#[async_trait]
impl BlobStore for GatedStore {
    async fn upload(&self, data: &[u8]) -> walrus_client::Result<UploadedBlob> {
        self.inner.upload(data).await
    }

    async fn download(&self, blob_id: &str) -> walrus_client::Result<Vec<u8>> {
        let held = self.held.lock().unwrap().as_deref() == Some(blob_id);
        if held {
            self.arrived.notify_one();
            self.release.notified().await;
        }
        self.inner.download(blob_id).await
    }

    async fn exists(&self, blob_id: &str) -> bool {
        self.inner.exists(blob_id).await
    }
}

struct Harness<S> {
    pipeline: ContentPipeline,
    cache: ContentCache,
    blobs: Arc<S>,
    acl: Arc<StaticAccessList>,
}

async fn harness<S: BlobStore + Default + 'static>() -> Harness<S> {
    let cache = ContentCache::new(Arc::new(MemoryBackend::new()), CacheConfig::default());
    harness_with_cache(cache).await
}

async fn harness_with_cache<S: BlobStore + Default + 'static>(cache: ContentCache) -> Harness<S> {
    let blobs = Arc::new(S::default());
    let acl = Arc::new(StaticAccessList::new());
    let seal = SealService::new(Arc::new(MemoryKeyRegistry::new()), acl.clone());
    let pipeline = ContentPipeline::new(cache.clone(), blobs.clone(), seal);
    pipeline.init().await;
    Harness {
        pipeline,
        cache,
        blobs,
        acl,
    }
}

impl<S> Harness<S> {
    /// Publish gated content and grant `viewer` access to it
    async fn publish_for(&self, viewer: &str, plaintext: &[u8]) -> ContentDescriptor {
        let descriptor = self
            .pipeline
            .publish(
                plaintext,
                &AccessPolicy::subscription("0xcreator", "tier_1"),
                "application/octet-stream",
            )
            .await
            .unwrap()
            .descriptor;
        self.acl.grant(viewer, &descriptor.policy_id).await;
        descriptor
    }
}

fn fan() -> AccessProof {
    AccessProof::for_viewer("0xfan")
}

#[tokio::test]
async fn subscription_roundtrip_with_and_without_proof() {
    let h = harness::<MemoryBlobStore>().await;
    let plaintext: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
    let descriptor = h.publish_for("0xfan", &plaintext).await;
    assert_eq!(descriptor.tier_id.as_deref(), Some("tier_1"));

    let denied = h.pipeline.check_and_load(&descriptor, None).await;
    assert_eq!(denied.state, ViewState::Errored);
    assert_eq!(denied.error, Some(ContentError::AccessDenied));

    let unlocked = h.pipeline.check_and_load(&descriptor, Some(&fan())).await;
    assert!(unlocked.is_rendered());
    assert_eq!(unlocked.payload.as_deref(), Some(&plaintext[..]));
    assert!(!unlocked.from_cache);
    assert!(h.cache.contains(&descriptor.content_id).await);
}

#[tokio::test]
async fn oversized_payload_is_never_cached() {
    let h = harness::<MemoryBlobStore>().await;
    let big = vec![0u8; 25 * 1024 * 1024];

    assert!(!h.cache.put("0xbig", &big, "video/mp4", Some("tier_1")).await);
    assert_eq!(h.cache.stats().await.count, 0);

    // Still viewable, just not kept
    let descriptor = h.publish_for("0xfan", &big).await;
    let outcome = h.pipeline.check_and_load(&descriptor, Some(&fan())).await;
    assert!(outcome.is_rendered());
    assert_eq!(outcome.payload.map(|p| p.len()), Some(big.len()));
    assert_eq!(h.cache.stats().await.count, 0);
}

#[tokio::test]
async fn entries_expire_after_eight_hours() {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let cache = ContentCache::with_clock(
        Arc::new(MemoryBackend::new()),
        CacheConfig::default(),
        clock.clone(),
    );
    let h = harness_with_cache::<MemoryBlobStore>(cache).await;

    let payload = vec![1u8; 1024 * 1024];
    assert!(h.cache.put("0xcontent", &payload, "image/png", None).await);

    clock.set(start + Duration::hours(7) + Duration::minutes(59));
    let hit = h.cache.get("0xcontent").await.unwrap();
    assert_eq!(hit.data.len(), payload.len());

    clock.set(start + Duration::hours(8) + Duration::minutes(1));
    assert!(h.cache.get("0xcontent").await.is_none());
    assert!(!h.cache.contains("0xcontent").await);
    assert_eq!(h.cache.stats().await.count, 0);
}

#[tokio::test]
async fn interleaved_requests_resolve_independently() {
    let h = harness::<GatedStore>().await;
    let first = h.publish_for("0xfan", b"first payload").await;
    let second = h.publish_for("0xfan", b"second payload").await;
    h.blobs.hold(&first.blob_id);

    let (tx, mut states) = mpsc::unbounded_channel();
    let pipeline = h.pipeline.clone();
    let first_descriptor = first.clone();
    let first_load = tokio::spawn(async move {
        pipeline
            .load_with(&first_descriptor, Some(&fan()), |s| {
                let _ = tx.send(s);
            })
            .await
    });

    // First request is parked in its fetch, before decryption
    h.blobs.arrived.notified().await;
    assert_eq!(states.recv().await, Some(ViewState::CheckingCache));
    assert_eq!(states.recv().await, Some(ViewState::Fetching));

    let second_outcome = h.pipeline.check_and_load(&second, Some(&fan())).await;
    assert_eq!(second_outcome.payload.as_deref(), Some(&b"second payload"[..]));

    h.blobs.release.notify_one();
    let first_outcome = first_load.await.unwrap();
    assert_eq!(first_outcome.payload.as_deref(), Some(&b"first payload"[..]));

    assert!(h.cache.contains(&first.content_id).await);
    assert!(h.cache.contains(&second.content_id).await);
}

#[tokio::test]
async fn last_request_wins() {
    let h = harness::<GatedStore>().await;
    let stale = h.publish_for("0xfan", b"stale").await;
    let fresh = h.publish_for("0xfan", b"fresh").await;
    h.blobs.hold(&stale.blob_id);

    let controller = Arc::new(ViewController::new(Arc::new(h.pipeline.clone())));
    let stale_view = {
        let controller = controller.clone();
        let stale = stale.clone();
        tokio::spawn(async move { controller.show(stale, Some(fan())).await })
    };
    h.blobs.arrived.notified().await;
    assert_eq!(controller.snapshot().state, ViewState::Fetching);

    let fresh_outcome = controller.show(fresh.clone(), Some(fan())).await.unwrap();
    assert_eq!(fresh_outcome.payload.as_deref(), Some(&b"fresh"[..]));

    h.blobs.release.notify_one();
    assert!(stale_view.await.unwrap().is_none());

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.content_id.as_deref(), Some(fresh.content_id.as_str()));
    assert_eq!(snapshot.state, ViewState::Rendering);
}

#[tokio::test]
async fn retry_after_network_failure() {
    let h = harness::<MemoryBlobStore>().await;
    let descriptor = h.publish_for("0xfan", b"worth the wait").await;
    let controller = ViewController::new(Arc::new(h.pipeline.clone()));

    h.blobs.set_offline(true);
    let failed = controller
        .show(descriptor.clone(), Some(fan()))
        .await
        .unwrap();
    let error = failed.error.unwrap();
    assert!(error.is_retryable());
    assert_eq!(error.kind(), "offline");
    assert_eq!(controller.snapshot().state, ViewState::Errored);

    h.blobs.set_offline(false);
    let retried = controller.retry().await.unwrap();
    assert!(retried.is_rendered());
    assert_eq!(retried.payload.as_deref(), Some(&b"worth the wait"[..]));
    assert_eq!(controller.snapshot().state, ViewState::Rendering);
}

#[tokio::test]
async fn cancelled_tier_drops_unlocked_content() {
    let h = harness::<MemoryBlobStore>().await;
    let descriptor = h.publish_for("0xfan", b"tier content").await;
    assert!(h
        .pipeline
        .check_and_load(&descriptor, Some(&fan()))
        .await
        .is_rendered());

    assert_eq!(h.pipeline.invalidate_tier("tier_1").await, 1);
    h.acl.revoke("0xfan", &descriptor.policy_id).await;

    let outcome = h.pipeline.check_and_load(&descriptor, Some(&fan())).await;
    assert_eq!(outcome.error, Some(ContentError::AccessDenied));
}
