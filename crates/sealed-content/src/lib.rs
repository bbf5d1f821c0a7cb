//! Sealed content
//!
//! Encrypts content under an access policy and recovers it for callers the
//! access-control layer vouches for.
//!
//! Key recovery here is an escrow: the symmetric key and nonce are stored
//! next to the policy record and released after a positive access verdict.
//! Anyone who can read the registry can read the key, so this is a
//! placeholder for an external key-custody service that enforces the
//! access check before releasing key material.

mod access;
mod cipher;
mod error;
mod policy;
mod registry;
mod service;

pub use access::{AccessControl, AccessProof, StaticAccessList};
pub use cipher::KeyMaterial;
pub use error::{Result, SealError};
pub use policy::{derive_policy_id, AccessPolicy, PUBLIC_POLICY_ID};
pub use registry::{FileKeyRegistry, KeyRegistry, MemoryKeyRegistry, PolicyRecord};
pub use service::{encrypt, Authorized, EncryptionResult, SealService};
