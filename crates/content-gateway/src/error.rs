//! Error types for the content gateway

use content_cache::CacheError;
use sealed_content::SealError;
use std::fmt;
use walrus_client::WalrusError;

/// Why a content view failed to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// The viewer holds no subscription or purchase for the policy
    AccessDenied,
    /// Key material for the policy is gone
    KeyNotFound(String),
    /// Walrus or the access oracle couldn't be reached
    NetworkFetchFailed(String),
    /// The ciphertext doesn't open with the registered key
    DecryptionFailed(String),
}

impl ContentError {
    /// Whether trying again later can succeed without anything else changing
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContentError::NetworkFetchFailed(_))
    }

    /// Short category for clients: locked, unavailable or offline
    pub fn kind(&self) -> &'static str {
        match self {
            ContentError::AccessDenied => "locked",
            ContentError::KeyNotFound(_) | ContentError::DecryptionFailed(_) => "unavailable",
            ContentError::NetworkFetchFailed(_) => "offline",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ContentError::AccessDenied => "Subscribe or purchase to unlock this content",
            ContentError::KeyNotFound(_) | ContentError::DecryptionFailed(_) => {
                "This content is no longer available"
            }
            ContentError::NetworkFetchFailed(_) => {
                "Couldn't reach the network. Check your connection and try again"
            }
        }
    }
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::AccessDenied => write!(f, "Access denied"),
            ContentError::KeyNotFound(policy_id) => {
                write!(f, "Key not found for policy {}", policy_id)
            }
            ContentError::NetworkFetchFailed(msg) => write!(f, "Network fetch failed: {}", msg),
            ContentError::DecryptionFailed(msg) => write!(f, "Decryption failed: {}", msg),
        }
    }
}

impl std::error::Error for ContentError {}

impl From<WalrusError> for ContentError {
    fn from(err: WalrusError) -> Self {
        ContentError::NetworkFetchFailed(err.to_string())
    }
}

impl From<SealError> for ContentError {
    fn from(err: SealError) -> Self {
        match err {
            SealError::AccessDenied { .. } => ContentError::AccessDenied,
            SealError::KeyNotFound(policy_id) => ContentError::KeyNotFound(policy_id),
            SealError::DecryptionFailed(msg) | SealError::EncryptionFailed(msg) => {
                ContentError::DecryptionFailed(msg)
            }
            err @ (SealError::AccessCheckUnavailable(_)
            | SealError::Registry(_)
            | SealError::Io(_)) => ContentError::NetworkFetchFailed(err.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum GatewayError {
    Seal(SealError),
    Walrus(WalrusError),
    Cache(CacheError),
    Io(Box<std::io::Error>),
    Config(String),
    BadRequest(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Seal(err) => write!(f, "Seal error: {}", err),
            GatewayError::Walrus(err) => write!(f, "Walrus error: {}", err),
            GatewayError::Cache(err) => write!(f, "Cache error: {}", err),
            GatewayError::Io(err) => write!(f, "IO error: {}", err),
            GatewayError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GatewayError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Seal(err) => Some(err),
            GatewayError::Walrus(err) => Some(err),
            GatewayError::Cache(err) => Some(err),
            GatewayError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<SealError> for GatewayError {
    fn from(err: SealError) -> Self {
        GatewayError::Seal(err)
    }
}

impl From<WalrusError> for GatewayError {
    fn from(err: WalrusError) -> Self {
        GatewayError::Walrus(err)
    }
}

impl From<CacheError> for GatewayError {
    fn from(err: CacheError) -> Self {
        GatewayError::Cache(err)
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for GatewayError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        GatewayError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
