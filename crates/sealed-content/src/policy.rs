//! Access policies

use crate::error::{Result, SealError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Policy id for unencrypted content
pub const PUBLIC_POLICY_ID: &str = "public";

const POLICY_ID_PREFIX: &str = "seal_policy_";
const POLICY_ID_HEX_LEN: usize = 16;

/// Who may decrypt a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessPolicy {
    Public {
        creator: String,
    },
    /// Holders of a subscription to the given tier
    Subscription {
        creator: String,
        tier_id: String,
    },
    /// Buyers of this specific content item
    PayPerView {
        creator: String,
        content_id: String,
        price: u64,
    },
}

impl AccessPolicy {
    pub fn public(creator: &str) -> Self {
        AccessPolicy::Public {
            creator: creator.to_string(),
        }
    }

    pub fn subscription(creator: &str, tier_id: &str) -> Self {
        AccessPolicy::Subscription {
            creator: creator.to_string(),
            tier_id: tier_id.to_string(),
        }
    }

    pub fn pay_per_view(creator: &str, content_id: &str, price: u64) -> Self {
        AccessPolicy::PayPerView {
            creator: creator.to_string(),
            content_id: content_id.to_string(),
            price,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, AccessPolicy::Public { .. })
    }

    pub fn creator(&self) -> &str {
        match self {
            AccessPolicy::Public { creator }
            | AccessPolicy::Subscription { creator, .. }
            | AccessPolicy::PayPerView { creator, .. } => creator,
        }
    }

    /// The tier a subscription policy is bound to
    pub fn tier_id(&self) -> Option<&str> {
        match self {
            AccessPolicy::Subscription { tier_id, .. } => Some(tier_id),
            _ => None,
        }
    }
}

/// Derive the id of a policy instance created at `at`.
///
/// The digest covers the policy's JSON form followed by the creation time
/// in nanoseconds, so field values can't run into each other. The same
/// policy registered at two different instants gets two ids.
pub fn derive_policy_id(policy: &AccessPolicy, at: DateTime<Utc>) -> Result<String> {
    if policy.is_public() {
        return Ok(PUBLIC_POLICY_ID.to_string());
    }

    let encoded = serde_json::to_vec(policy)
        .map_err(|e| SealError::EncryptionFailed(format!("unencodable policy: {}", e)))?;
    let stamp = at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| at.timestamp_micros());
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    hasher.update(stamp.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());

    Ok(format!("{}{}", POLICY_ID_PREFIX, &digest[..POLICY_ID_HEX_LEN]))
}
