//! Blob store abstraction over the delivery network

use crate::error::{Result, WalrusError};
use crate::types::UploadedBlob;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// An opaque, high-latency blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, data: &[u8]) -> Result<UploadedBlob>;

    async fn download(&self, blob_id: &str) -> Result<Vec<u8>>;

    /// Availability probe; transport failures count as "not there"
    async fn exists(&self, blob_id: &str) -> bool;
}

/// Content-addressed in-process blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the network going away (or coming back)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    fn check_online(&self, url: &str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(WalrusError::Status {
                status: 503,
                url: url.to_string(),
            });
        }
        Ok(())
    }

    pub fn blob_id_for(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, data: &[u8]) -> Result<UploadedBlob> {
        self.check_online("memory://v1/blobs")?;
        let blob_id = Self::blob_id_for(data);
        self.blobs
            .write()
            .await
            .insert(blob_id.clone(), data.to_vec());
        Ok(UploadedBlob {
            blob_id,
            end_epoch: 1,
            object_id: None,
        })
    }

    async fn download(&self, blob_id: &str) -> Result<Vec<u8>> {
        self.check_online(&format!("memory://v1/blobs/{}", blob_id))?;
        self.blobs
            .read()
            .await
            .get(blob_id)
            .cloned()
            .ok_or_else(|| WalrusError::BlobNotFound(blob_id.to_string()))
    }

    async fn exists(&self, blob_id: &str) -> bool {
        !self.offline.load(Ordering::SeqCst) && self.blobs.read().await.contains_key(blob_id)
    }
}
