//! Encryption and decryption pipelines

use crate::access::{AccessControl, AccessProof};
use crate::cipher::{self, KeyMaterial};
use crate::error::{Result, SealError};
use crate::policy::{derive_policy_id, AccessPolicy, PUBLIC_POLICY_ID};
use crate::registry::{KeyRegistry, PolicyRecord};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output of sealing one content item
#[derive(Debug, Clone)]
pub struct EncryptionResult {
    pub ciphertext: Vec<u8>,
    pub policy_id: String,
    /// Absent for public content
    pub key_material: Option<KeyMaterial>,
}

/// Seal plaintext under a policy. Public content passes through untouched.
///
/// Nothing is persisted; registering the key material is up to the caller.
pub fn encrypt(plaintext: &[u8], policy: &AccessPolicy) -> Result<EncryptionResult> {
    let policy_id = derive_policy_id(policy, Utc::now())?;
    if policy.is_public() {
        return Ok(EncryptionResult {
            ciphertext: plaintext.to_vec(),
            policy_id,
            key_material: None,
        });
    }

    let (ciphertext, key_material) = cipher::seal(plaintext)?;
    debug!(
        policy_id = %policy_id,
        plaintext_size = plaintext.len(),
        ciphertext_size = ciphertext.len(),
        "Sealed content"
    );
    Ok(EncryptionResult {
        ciphertext,
        policy_id,
        key_material: Some(key_material),
    })
}

/// A positive access verdict for one policy.
///
/// Only [`SealService::authorize`] hands these out, so holding one means the
/// access check for `policy_id` has already passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    policy_id: String,
}

impl Authorized {
    pub fn policy_id(&self) -> &str {
        &self.policy_id
    }

    pub fn is_public(&self) -> bool {
        self.policy_id == PUBLIC_POLICY_ID
    }
}

/// Sealing and unsealing against a key registry and an access-control layer
#[derive(Clone)]
pub struct SealService {
    registry: Arc<dyn KeyRegistry>,
    access: Arc<dyn AccessControl>,
}

impl SealService {
    pub fn new(registry: Arc<dyn KeyRegistry>, access: Arc<dyn AccessControl>) -> Self {
        Self { registry, access }
    }

    pub fn registry(&self) -> &Arc<dyn KeyRegistry> {
        &self.registry
    }

    /// Seal plaintext and escrow its key material in the registry.
    ///
    /// Either both happen or the call fails; no policy id is handed out
    /// without registered key material.
    pub async fn publish_policy(
        &self,
        plaintext: &[u8],
        policy: &AccessPolicy,
    ) -> Result<EncryptionResult> {
        let sealed = encrypt(plaintext, policy)?;
        self.escrow(&sealed, policy).await?;
        Ok(sealed)
    }

    /// Register the key material of already sealed content. No-op for public content.
    pub async fn escrow(&self, sealed: &EncryptionResult, policy: &AccessPolicy) -> Result<()> {
        let Some(key_material) = &sealed.key_material else {
            return Ok(());
        };
        self.registry
            .register(
                &sealed.policy_id,
                PolicyRecord {
                    policy: policy.clone(),
                    key_material: key_material.clone(),
                    created_at: Utc::now(),
                },
            )
            .await?;
        info!(policy_id = %sealed.policy_id, creator = policy.creator(), "Registered content policy");
        Ok(())
    }

    /// Ask the access-control layer whether the caller may see content
    /// sealed under `policy_id`. Public content is always granted.
    ///
    /// Subscription and pay-per-view policies go through the same verdict.
    pub async fn authorize(
        &self,
        proof: Option<&AccessProof>,
        policy_id: &str,
    ) -> Result<Authorized> {
        let granted = Authorized {
            policy_id: policy_id.to_string(),
        };
        if granted.is_public() {
            return Ok(granted);
        }

        let denied = || SealError::AccessDenied {
            policy_id: policy_id.to_string(),
        };
        let proof = proof.ok_or_else(denied)?;
        if !self.access.has_access(proof, policy_id).await? {
            warn!(policy_id, viewer = %proof.viewer, "Access denied");
            return Err(denied());
        }
        Ok(granted)
    }

    /// Open ciphertext under an access grant
    pub async fn unseal(&self, ciphertext: &[u8], grant: &Authorized) -> Result<Vec<u8>> {
        if grant.is_public() {
            return Ok(ciphertext.to_vec());
        }

        let policy_id = grant.policy_id();
        let record = self
            .registry
            .lookup(policy_id)
            .await?
            .ok_or_else(|| SealError::KeyNotFound(policy_id.to_string()))?;

        let plaintext = cipher::open(ciphertext, &record.key_material)?;
        debug!(policy_id, size = plaintext.len(), "Unsealed content");
        Ok(plaintext)
    }

    /// Recover plaintext for a caller.
    ///
    /// Access is checked before any key material is looked up.
    pub async fn decrypt(
        &self,
        ciphertext: &[u8],
        policy_id: &str,
        proof: Option<&AccessProof>,
    ) -> Result<Vec<u8>> {
        let grant = self.authorize(proof, policy_id).await?;
        self.unseal(ciphertext, &grant).await
    }
}
