//! Core types for the content gateway

use crate::error::ContentError;
use content_cache::CacheStats;
use sealed_content::PUBLIC_POLICY_ID;
use serde::{Deserialize, Serialize};

/// Everything needed to locate and unlock one content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub content_id: String,
    pub blob_id: String,
    pub policy_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_id: Option<String>,
    pub media_type: String,
}

impl ContentDescriptor {
    pub fn is_public(&self) -> bool {
        self.policy_id == PUBLIC_POLICY_ID
    }
}

/// Where a content view is in its load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Idle,
    CheckingCache,
    Fetching,
    Decrypting,
    Caching,
    Rendering,
    Errored,
}

impl ViewState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ViewState::Rendering | ViewState::Errored)
    }
}

/// Result of one pass through the content pipeline
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Either `Rendering` or `Errored`
    pub state: ViewState,
    pub payload: Option<Vec<u8>>,
    pub media_type: Option<String>,
    pub from_cache: bool,
    pub error: Option<ContentError>,
}

impl LoadOutcome {
    pub fn rendered(payload: Vec<u8>, media_type: String, from_cache: bool) -> Self {
        Self {
            state: ViewState::Rendering,
            payload: Some(payload),
            media_type: Some(media_type),
            from_cache,
            error: None,
        }
    }

    pub fn errored(error: ContentError) -> Self {
        Self {
            state: ViewState::Errored,
            payload: None,
            media_type: None,
            from_cache: false,
            error: Some(error),
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.state == ViewState::Rendering
    }
}

/// A freshly published content item and the epoch its storage runs until
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedContent {
    #[serde(flatten)]
    pub descriptor: ContentDescriptor,
    pub end_epoch: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache_available: bool,
    pub cache: CacheStats,
}
