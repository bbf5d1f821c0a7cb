//! Access-control seam

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Evidence that a caller satisfies a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessProof {
    /// Wallet address of the viewer
    pub viewer: String,
    /// Subscription or purchase token held by the viewer, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
}

impl AccessProof {
    pub fn for_viewer(viewer: &str) -> Self {
        Self {
            viewer: viewer.to_string(),
            token_id: None,
        }
    }
}

/// The external layer (contract state) that decides whether a proof grants
/// access to a policy. Its verdict is taken as ground truth.
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn has_access(&self, proof: &AccessProof, policy_id: &str) -> Result<bool>;
}

/// Explicit viewer → policy grants held in memory
#[derive(Default)]
pub struct StaticAccessList {
    grants: RwLock<HashMap<String, HashSet<String>>>,
}

impl StaticAccessList {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, viewer: &str, policy_id: &str) {
        self.grants
            .write()
            .await
            .entry(viewer.to_string())
            .or_default()
            .insert(policy_id.to_string());
    }

    pub async fn revoke(&self, viewer: &str, policy_id: &str) {
        if let Some(policies) = self.grants.write().await.get_mut(viewer) {
            policies.remove(policy_id);
        }
    }
}

#[async_trait]
impl AccessControl for StaticAccessList {
    async fn has_access(&self, proof: &AccessProof, policy_id: &str) -> Result<bool> {
        Ok(self
            .grants
            .read()
            .await
            .get(&proof.viewer)
            .is_some_and(|policies| policies.contains(policy_id)))
    }
}
