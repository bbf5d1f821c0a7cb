//! Key-recovery registry: policy id → escrowed key material

use crate::cipher::KeyMaterial;
use crate::error::Result;
use crate::policy::AccessPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A registered policy together with the key material that opens its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy: AccessPolicy,
    pub key_material: KeyMaterial,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait KeyRegistry: Send + Sync {
    async fn register(&self, policy_id: &str, record: PolicyRecord) -> Result<()>;

    async fn lookup(&self, policy_id: &str) -> Result<Option<PolicyRecord>>;

    async fn remove(&self, policy_id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryKeyRegistry {
    records: RwLock<HashMap<String, PolicyRecord>>,
}

impl MemoryKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyRegistry for MemoryKeyRegistry {
    async fn register(&self, policy_id: &str, record: PolicyRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(policy_id.to_string(), record);
        Ok(())
    }

    async fn lookup(&self, policy_id: &str) -> Result<Option<PolicyRecord>> {
        Ok(self.records.read().await.get(policy_id).cloned())
    }

    async fn remove(&self, policy_id: &str) -> Result<()> {
        self.records.write().await.remove(policy_id);
        Ok(())
    }
}

/// Registry persisted as a single JSON document
pub struct FileKeyRegistry {
    path: PathBuf,
    records: RwLock<HashMap<String, PolicyRecord>>,
}

impl FileKeyRegistry {
    /// Load the registry at `path`, starting empty if the file doesn't exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = ?path, policies = records.len(), "Opened key registry");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &HashMap<String, PolicyRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp = self.path.with_extension("tmp");
        fs::write(&temp, serde_json::to_vec_pretty(records)?).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyRegistry for FileKeyRegistry {
    async fn register(&self, policy_id: &str, record: PolicyRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let previous = records.insert(policy_id.to_string(), record);
        if let Err(e) = self.persist(&records).await {
            // Keep memory and disk in step
            match previous {
                Some(previous) => records.insert(policy_id.to_string(), previous),
                None => records.remove(policy_id),
            };
            return Err(e);
        }
        debug!(policy_id, "Registered policy key");
        Ok(())
    }

    async fn lookup(&self, policy_id: &str) -> Result<Option<PolicyRecord>> {
        Ok(self.records.read().await.get(policy_id).cloned())
    }

    async fn remove(&self, policy_id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        if records.remove(policy_id).is_some() {
            self.persist(&records).await?;
        }
        Ok(())
    }
}
