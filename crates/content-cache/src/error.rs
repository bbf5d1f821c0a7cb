//! Error types for the content cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// The persistent store could not be opened; the cache runs disabled
    StorageUnavailable(String),
    Io(Box<std::io::Error>),
    Metadata(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::StorageUnavailable(msg) => write!(f, "Cache storage unavailable: {}", msg),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Metadata(msg) => write!(f, "Cache metadata error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Metadata(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
