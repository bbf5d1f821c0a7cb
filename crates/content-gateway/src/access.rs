//! Access verdicts from an HTTP oracle over subscription and purchase state

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sealed_content::{AccessControl, AccessProof, SealError};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct AccessVerdict {
    has_access: bool,
}

/// Asks `GET {base}/access/{policy_id}?viewer=...` whether a viewer may
/// unlock a policy. Every call goes to the oracle; verdicts are not cached.
pub struct HttpAccessOracle {
    client: Client,
    base_url: String,
}

impl HttpAccessOracle {
    pub fn new(base_url: &str) -> Result<Self, SealError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SealError::AccessCheckUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn verdict_url(&self, proof: &AccessProof, policy_id: &str) -> String {
        let mut url = format!(
            "{}/access/{}?viewer={}",
            self.base_url,
            urlencoding::encode(policy_id),
            urlencoding::encode(&proof.viewer)
        );
        if let Some(token_id) = &proof.token_id {
            url.push_str("&token_id=");
            url.push_str(&urlencoding::encode(token_id));
        }
        url
    }
}

#[async_trait]
impl AccessControl for HttpAccessOracle {
    async fn has_access(&self, proof: &AccessProof, policy_id: &str) -> sealed_content::Result<bool> {
        let url = self.verdict_url(proof, policy_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SealError::AccessCheckUnavailable(e.to_string()))?;

        // The oracle doesn't know the policy: nobody holds access to it
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(SealError::AccessCheckUnavailable(format!(
                "oracle returned {}",
                response.status()
            )));
        }

        let verdict: AccessVerdict = response
            .json()
            .await
            .map_err(|e| SealError::AccessCheckUnavailable(e.to_string()))?;
        debug!(policy_id, viewer = %proof.viewer, has_access = verdict.has_access, "Access verdict");
        Ok(verdict.has_access)
    }
}
