//! AES-256-GCM sealing with a fresh key and nonce per content item

use crate::error::{Result, SealError};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Symmetric key and nonce needed to open one ciphertext
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    #[serde(with = "hex::serde")]
    pub key: [u8; KEY_LEN],
    #[serde(with = "hex::serde")]
    pub nonce: [u8; NONCE_LEN],
}

impl KeyMaterial {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        Self {
            key: rng.random(),
            nonce: rng.random(),
        }
    }
}

// Keep keys out of logs
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"<redacted>")
            .field("nonce", &hex::encode(self.nonce))
            .finish()
    }
}

/// Encrypt under freshly generated key material.
///
/// Returns the ciphertext (with its 16-byte GCM tag) and the material needed
/// to open it.
pub fn seal(plaintext: &[u8]) -> Result<(Vec<u8>, KeyMaterial)> {
    let material = KeyMaterial::generate();
    let cipher = Aes256Gcm::new(&Key::<Aes256Gcm>::from(material.key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&material.nonce), plaintext)
        .map_err(|e| SealError::EncryptionFailed(e.to_string()))?;
    Ok((ciphertext, material))
}

pub fn open(ciphertext: &[u8], material: &KeyMaterial) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(&Key::<Aes256Gcm>::from(material.key));
    cipher
        .decrypt(Nonce::from_slice(&material.nonce), ciphertext)
        .map_err(|e| SealError::DecryptionFailed(e.to_string()))
}
