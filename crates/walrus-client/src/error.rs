//! Error types for the Walrus client

use std::fmt;

#[derive(Debug)]
pub enum WalrusError {
    Http(Box<reqwest::Error>),
    Status { status: u16, url: String },
    BlobNotFound(String),
    UnexpectedResponse(String),
    NoPublishers,
}

impl fmt::Display for WalrusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalrusError::Http(err) => write!(f, "HTTP error: {}", err),
            WalrusError::Status { status, url } => {
                write!(f, "Walrus returned status {} for {}", status, url)
            }
            WalrusError::BlobNotFound(blob_id) => write!(f, "Blob not found: {}", blob_id),
            WalrusError::UnexpectedResponse(msg) => {
                write!(f, "Unexpected Walrus response: {}", msg)
            }
            WalrusError::NoPublishers => write!(f, "No Walrus publishers configured"),
        }
    }
}

impl std::error::Error for WalrusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WalrusError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WalrusError {
    fn from(err: reqwest::Error) -> Self {
        WalrusError::Http(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, WalrusError>;
