//! Walrus Blob Client
//!
//! Stores and fetches opaque content blobs on the Walrus network.
//! Uploads go through a publisher (with fallback across several),
//! downloads through an aggregator.

pub mod client;
pub mod error;
pub mod store;
pub mod types;

pub use client::{WalrusClient, WalrusConfig};
pub use error::{Result, WalrusError};
pub use store::{BlobStore, MemoryBlobStore};
pub use types::{StoreResponse, UploadedBlob};
