//! HTTP server for the content gateway
//!
//! Serves gated content through the pipeline and exposes publishing and
//! cache maintenance endpoints. The maintenance endpoints that drop cache
//! entries are only mounted when an admin token is configured, and require
//! it as a bearer token.

use crate::error::{ContentError, GatewayError};
use crate::pipeline::ContentPipeline;
use crate::types::{ContentDescriptor, HealthResponse};
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use content_cache::CacheStats;
use sealed_content::{AccessPolicy, AccessProof};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Largest plaintext accepted by `POST /content`
const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Shared state for the HTTP server
pub struct ServerState {
    pub pipeline: ContentPipeline,
    pub started_at: DateTime<Utc>,
    /// Bearer token for cache maintenance; without one those routes are not mounted
    pub admin_token: Option<String>,
}

impl ServerState {
    pub fn new(pipeline: ContentPipeline) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
            admin_token: None,
        }
    }

    pub fn with_admin_token(mut self, admin_token: Option<String>) -> Self {
        self.admin_token = admin_token.filter(|t| !t.is_empty());
        self
    }
}

pub type SharedState = Arc<ServerState>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

#[derive(Serialize)]
struct RemovedResponse {
    removed: usize,
}

#[derive(Debug, Deserialize)]
struct ContentParams {
    blob_id: String,
    policy_id: String,
    tier_id: Option<String>,
    media_type: Option<String>,
    viewer: Option<String>,
    token_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PolicyKind {
    Public,
    Subscription,
    PayPerView,
}

#[derive(Debug, Deserialize)]
struct PublishParams {
    policy: PolicyKind,
    creator: String,
    tier_id: Option<String>,
    content_id: Option<String>,
    price: Option<u64>,
    media_type: Option<String>,
}

impl PublishParams {
    fn access_policy(&self) -> Result<AccessPolicy, GatewayError> {
        let missing = |field: &str| GatewayError::BadRequest(format!("{} is required", field));
        match self.policy {
            PolicyKind::Public => Ok(AccessPolicy::public(&self.creator)),
            PolicyKind::Subscription => {
                let tier_id = self.tier_id.as_deref().ok_or_else(|| missing("tier_id"))?;
                Ok(AccessPolicy::subscription(&self.creator, tier_id))
            }
            PolicyKind::PayPerView => {
                let content_id = self
                    .content_id
                    .as_deref()
                    .ok_or_else(|| missing("content_id"))?;
                let price = self.price.ok_or_else(|| missing("price"))?;
                Ok(AccessPolicy::pay_per_view(&self.creator, content_id, price))
            }
        }
    }
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/content", post(publish_content))
        .route("/content/{content_id}", get(get_content))
        .route("/cache/stats", get(cache_stats));

    if state.admin_token.is_some() {
        let maintenance = Router::new()
            .route("/cache", delete(clear_cache))
            .route("/cache/sweep", post(sweep_cache))
            .route("/cache/tiers/{tier_id}", delete(invalidate_tier))
            .route("/cache/{content_id}", delete(evict_content))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));
        router = router.merge(maintenance);
    }

    router
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn start_server(
    state: SharedState,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache = state.pipeline.cache_stats().await;
    let cache_available = state.pipeline.cache().is_available().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache_available,
        cache,
    })
}

/// Serve one content item, decrypted for the viewer
async fn get_content(
    State(state): State<SharedState>,
    Path(content_id): Path<String>,
    Query(params): Query<ContentParams>,
) -> Response {
    let descriptor = ContentDescriptor {
        content_id,
        blob_id: params.blob_id,
        policy_id: params.policy_id,
        tier_id: params.tier_id,
        media_type: params
            .media_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    };
    let proof = params.viewer.map(|viewer| AccessProof {
        viewer,
        token_id: params.token_id,
    });

    let outcome = state
        .pipeline
        .check_and_load(&descriptor, proof.as_ref())
        .await;

    if let Some(err) = outcome.error {
        return content_error_response(&descriptor.content_id, &err);
    }
    let (Some(data), Some(media_type)) = (outcome.payload, outcome.media_type) else {
        error!(content_id = %descriptor.content_id, "Load finished without payload");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
    };

    let cache_header = if outcome.from_cache { "HIT" } else { "MISS" };
    let cache_control = if descriptor.is_public() {
        "public, max-age=86400"
    } else {
        "private, no-store"
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, media_type),
            (header::CACHE_CONTROL, cache_control.to_string()),
            (header::HeaderName::from_static("x-cache"), cache_header.to_string()),
        ],
        Body::from(data),
    )
        .into_response()
}

/// Seal and upload the request body
async fn publish_content(
    State(state): State<SharedState>,
    Query(params): Query<PublishParams>,
    body: Bytes,
) -> Response {
    let policy = match params.access_policy() {
        Ok(policy) => policy,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Empty content");
    }
    let media_type = params
        .media_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    match state.pipeline.publish(&body, &policy, media_type).await {
        Ok(published) => (StatusCode::CREATED, Json(published)).into_response(),
        Err(e) => {
            error!(creator = %params.creator, error = %e, "Failed to publish content");
            let status = match e {
                GatewayError::Walrus(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, "Failed to publish content")
        }
    }
}

/// Reject maintenance requests that don't carry the admin bearer token
async fn require_admin(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let authorized = match (state.admin_token.as_deref(), presented) {
        (Some(expected), Some(presented)) => tokens_match(expected, presented),
        _ => false,
    };
    if !authorized {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected cache maintenance request"
        );
        return error_response(StatusCode::UNAUTHORIZED, "Admin token required");
    }

    next.run(request).await
}

// Compares every byte so timing doesn't reveal the matching prefix
fn tokens_match(expected: &str, presented: &str) -> bool {
    let (expected, presented) = (expected.as_bytes(), presented.as_bytes());
    expected.len() == presented.len()
        && expected
            .iter()
            .zip(presented)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

async fn cache_stats(State(state): State<SharedState>) -> Json<CacheStats> {
    Json(state.pipeline.cache_stats().await)
}

async fn sweep_cache(State(state): State<SharedState>) -> Json<RemovedResponse> {
    let removed = state.pipeline.sweep_expired().await;
    Json(RemovedResponse { removed })
}

async fn clear_cache(State(state): State<SharedState>) -> StatusCode {
    state.pipeline.clear_all().await;
    StatusCode::NO_CONTENT
}

async fn invalidate_tier(
    State(state): State<SharedState>,
    Path(tier_id): Path<String>,
) -> Json<RemovedResponse> {
    let removed = state.pipeline.invalidate_tier(&tier_id).await;
    Json(RemovedResponse { removed })
}

async fn evict_content(
    State(state): State<SharedState>,
    Path(content_id): Path<String>,
) -> StatusCode {
    state.pipeline.evict(&content_id).await;
    StatusCode::NO_CONTENT
}

fn content_error_response(content_id: &str, err: &ContentError) -> Response {
    warn!(content_id, error = %err, "Content unavailable");
    let status = match err {
        ContentError::AccessDenied => StatusCode::FORBIDDEN,
        ContentError::KeyNotFound(_) | ContentError::DecryptionFailed(_) => StatusCode::GONE,
        ContentError::NetworkFetchFailed(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.user_message().to_string(),
            kind: Some(err.kind()),
            retryable: Some(err.is_retryable()),
        }),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            kind: None,
            retryable: None,
        }),
    )
        .into_response()
}
