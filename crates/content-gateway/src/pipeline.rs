//! The content pipeline: access check → cache → Walrus → decrypt → cache

use crate::error::{ContentError, Result};
use crate::types::{ContentDescriptor, LoadOutcome, PublishedContent, ViewState};
use content_cache::{CacheStats, ContentCache, ContentSource};
use sealed_content::{encrypt, AccessPolicy, AccessProof, SealService};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walrus_client::BlobStore;

/// Service object tying the cache, the blob store and the seal layer together
#[derive(Clone)]
pub struct ContentPipeline {
    cache: ContentCache,
    blobs: Arc<dyn BlobStore>,
    seal: SealService,
}

impl ContentPipeline {
    pub fn new(cache: ContentCache, blobs: Arc<dyn BlobStore>, seal: SealService) -> Self {
        Self { cache, blobs, seal }
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn seal(&self) -> &SealService {
        &self.seal
    }

    /// Open the cache. An unusable store only disables caching.
    pub async fn init(&self) {
        if let Err(e) = self.cache.init().await {
            warn!(error = %e, "Content cache unavailable, continuing without it");
        }
    }

    pub async fn close(&self) {
        self.cache.close().await;
    }

    /// Load one content item for a viewer
    pub async fn check_and_load(
        &self,
        descriptor: &ContentDescriptor,
        proof: Option<&AccessProof>,
    ) -> LoadOutcome {
        self.load_with(descriptor, proof, |_| {}).await
    }

    /// Load one content item, reporting each state as it is entered.
    ///
    /// The viewer's access is checked before anything is served, cached or
    /// not. Cached plaintext only answers for the blob and policy it was
    /// recovered from.
    pub async fn load_with<F>(
        &self,
        descriptor: &ContentDescriptor,
        proof: Option<&AccessProof>,
        mut on_state: F,
    ) -> LoadOutcome
    where
        F: FnMut(ViewState) + Send,
    {
        let content_id = descriptor.content_id.as_str();

        on_state(ViewState::CheckingCache);
        let grant = match self.seal.authorize(proof, &descriptor.policy_id).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(content_id, policy_id = %descriptor.policy_id, error = %e, "Access not granted");
                return fail(&mut on_state, e.into());
            }
        };

        let source = ContentSource::new(&descriptor.blob_id, &descriptor.policy_id);
        if !grant.is_public() {
            if let Some(hit) = self.cache.get_from(content_id, &source).await {
                debug!(content_id, "Serving content from cache");
                on_state(ViewState::Rendering);
                return LoadOutcome::rendered(hit.data, hit.media_type, true);
            }
        }

        on_state(ViewState::Fetching);
        let blob = match self.blobs.download(&descriptor.blob_id).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(content_id, blob_id = %descriptor.blob_id, error = %e, "Failed to fetch blob");
                return fail(&mut on_state, e.into());
            }
        };

        if grant.is_public() {
            on_state(ViewState::Rendering);
            return LoadOutcome::rendered(blob, descriptor.media_type.clone(), false);
        }

        on_state(ViewState::Decrypting);
        let plaintext = match self.seal.unseal(&blob, &grant).await {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(content_id, policy_id = %descriptor.policy_id, error = %e, "Failed to unlock content");
                return fail(&mut on_state, e.into());
            }
        };

        on_state(ViewState::Caching);
        let cached = self
            .cache
            .put_from(
                content_id,
                &source,
                &plaintext,
                &descriptor.media_type,
                descriptor.tier_id.as_deref(),
            )
            .await;
        if !cached {
            debug!(content_id, size = plaintext.len(), "Content not cached");
        }

        on_state(ViewState::Rendering);
        LoadOutcome::rendered(plaintext, descriptor.media_type.clone(), false)
    }

    /// Seal, upload and register one content item.
    ///
    /// Key material is only registered once the ciphertext is stored, so a
    /// failed upload leaves nothing behind.
    pub async fn publish(
        &self,
        plaintext: &[u8],
        policy: &AccessPolicy,
        media_type: &str,
    ) -> Result<PublishedContent> {
        let sealed = encrypt(plaintext, policy)?;
        let uploaded = self.blobs.upload(&sealed.ciphertext).await?;
        self.seal.escrow(&sealed, policy).await?;

        let content_id = match policy {
            AccessPolicy::PayPerView { content_id, .. } => content_id.clone(),
            _ => uploaded.object_id.unwrap_or_else(|| uploaded.blob_id.clone()),
        };
        info!(
            content_id = %content_id,
            blob_id = %uploaded.blob_id,
            policy_id = %sealed.policy_id,
            size = plaintext.len(),
            "Published content"
        );

        Ok(PublishedContent {
            descriptor: ContentDescriptor {
                content_id,
                blob_id: uploaded.blob_id,
                policy_id: sealed.policy_id,
                tier_id: policy.tier_id().map(str::to_string),
                media_type: media_type.to_string(),
            },
            end_epoch: uploaded.end_epoch,
        })
    }

    /// Drop cached content unlocked through a tier, e.g. after a subscription lapses
    pub async fn invalidate_tier(&self, tier_id: &str) -> usize {
        let removed = self.cache.delete_by_tier(tier_id).await;
        info!(tier_id, removed, "Invalidated tier");
        removed
    }

    pub async fn evict(&self, content_id: &str) {
        self.cache.delete(content_id).await;
    }

    pub async fn clear_all(&self) {
        self.cache.clear().await;
        info!("Cleared content cache");
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn sweep_expired(&self) -> usize {
        self.cache.sweep_expired().await
    }
}

fn fail<F: FnMut(ViewState)>(on_state: &mut F, error: ContentError) -> LoadOutcome {
    on_state(ViewState::Errored);
    LoadOutcome::errored(error)
}
