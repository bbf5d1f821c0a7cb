//! HTTP client for Walrus publishers and aggregators

use crate::error::{Result, WalrusError};
use crate::store::BlobStore;
use crate::types::{StoreResponse, UploadedBlob};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_PUBLISHERS: [&str; 3] = [
    "https://publisher.walrus-testnet.walrus.space",
    "https://walrus-testnet-publisher.nodes.guru",
    "https://wal-publisher-testnet.staketab.org",
];
const DEFAULT_AGGREGATOR: &str = "https://aggregator.walrus-testnet.walrus.space";
const DEFAULT_EPOCHS: u32 = 1;
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Endpoints and storage duration for a Walrus client
#[derive(Debug, Clone)]
pub struct WalrusConfig {
    /// Publishers, tried in order until one accepts an upload
    pub publishers: Vec<String>,
    pub aggregator: String,
    /// Number of storage epochs to pay for on upload
    pub epochs: u32,
}

impl Default for WalrusConfig {
    fn default() -> Self {
        Self {
            publishers: DEFAULT_PUBLISHERS.iter().map(|s| s.to_string()).collect(),
            aggregator: DEFAULT_AGGREGATOR.to_string(),
            epochs: DEFAULT_EPOCHS,
        }
    }
}

/// HTTP client for storing and reading blobs on Walrus
pub struct WalrusClient {
    upload_client: Client,
    client: Client,
    config: WalrusConfig,
}

impl WalrusClient {
    pub fn new(config: WalrusConfig) -> Result<Self> {
        let upload_client = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            upload_client,
            client,
            config: WalrusConfig {
                publishers: config
                    .publishers
                    .into_iter()
                    .map(|p| p.trim_end_matches('/').to_string())
                    .collect(),
                aggregator: config.aggregator.trim_end_matches('/').to_string(),
                epochs: config.epochs,
            },
        })
    }

    pub fn config(&self) -> &WalrusConfig {
        &self.config
    }

    /// Public aggregator URL for a blob
    pub fn blob_url(&self, blob_id: &str) -> String {
        format!("{}/v1/blobs/{}", self.config.aggregator, blob_id)
    }

    async fn upload_to(&self, publisher: &str, data: &[u8]) -> Result<UploadedBlob> {
        let url = format!("{}/v1/blobs?epochs={}", publisher, self.config.epochs);
        debug!(url = %url, size = data.len(), "Uploading blob to Walrus");

        let response = self
            .upload_client
            .put(&url)
            .body(data.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WalrusError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body: StoreResponse = response.json().await?;
        body.into_uploaded().ok_or_else(|| {
            WalrusError::UnexpectedResponse(
                "neither newlyCreated nor alreadyCertified present".to_string(),
            )
        })
    }
}

#[async_trait]
impl BlobStore for WalrusClient {
    async fn upload(&self, data: &[u8]) -> Result<UploadedBlob> {
        let mut last_error = WalrusError::NoPublishers;

        for publisher in &self.config.publishers {
            match self.upload_to(publisher, data).await {
                Ok(uploaded) => {
                    info!(
                        publisher = %publisher,
                        blob_id = %uploaded.blob_id,
                        end_epoch = uploaded.end_epoch,
                        "Uploaded blob to Walrus"
                    );
                    return Ok(uploaded);
                }
                Err(e) => {
                    warn!(publisher = %publisher, error = %e, "Walrus publisher rejected upload");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn download(&self, blob_id: &str) -> Result<Vec<u8>> {
        let url = self.blob_url(blob_id);
        debug!(url = %url, "Fetching blob from Walrus");

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(WalrusError::BlobNotFound(blob_id.to_string()));
        }
        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Failed to fetch blob");
            return Err(WalrusError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let data = response.bytes().await?.to_vec();
        debug!(blob_id, size = data.len(), "Fetched blob from Walrus");
        Ok(data)
    }

    async fn exists(&self, blob_id: &str) -> bool {
        match self.client.head(self.blob_url(blob_id)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(blob_id, error = %e, "Blob existence check failed");
                false
            }
        }
    }
}
