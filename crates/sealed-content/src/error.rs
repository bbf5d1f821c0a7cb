//! Error types for sealing and unsealing content

use std::fmt;

#[derive(Debug)]
pub enum SealError {
    /// The access-control layer did not vouch for the caller
    AccessDenied { policy_id: String },
    /// No key material is registered for the policy
    KeyNotFound(String),
    /// Ciphertext, key and nonce don't fit together
    DecryptionFailed(String),
    EncryptionFailed(String),
    /// The access-control layer could not be asked
    AccessCheckUnavailable(String),
    Registry(String),
    Io(Box<std::io::Error>),
}

impl fmt::Display for SealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SealError::AccessDenied { policy_id } => {
                write!(f, "Access denied for policy {}", policy_id)
            }
            SealError::KeyNotFound(policy_id) => {
                write!(f, "Encryption key not found for policy {}", policy_id)
            }
            SealError::DecryptionFailed(msg) => write!(f, "Decryption failed: {}", msg),
            SealError::EncryptionFailed(msg) => write!(f, "Encryption failed: {}", msg),
            SealError::AccessCheckUnavailable(msg) => {
                write!(f, "Access check unavailable: {}", msg)
            }
            SealError::Registry(msg) => write!(f, "Key registry error: {}", msg),
            SealError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for SealError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SealError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SealError {
    fn from(err: std::io::Error) -> Self {
        SealError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for SealError {
    fn from(err: serde_json::Error) -> Self {
        SealError::Registry(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SealError>;
