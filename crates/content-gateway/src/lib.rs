//! Content gateway
//!
//! Loads creator content for a viewer: local cache first, then the Walrus
//! network, then an access check and decryption, caching what was unlocked.

pub mod access;
pub mod config;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod types;

pub use access::HttpAccessOracle;
pub use config::GatewayConfig;
pub use controller::{ViewController, ViewSnapshot};
pub use error::{ContentError, GatewayError, Result};
pub use pipeline::ContentPipeline;
pub use types::{ContentDescriptor, LoadOutcome, PublishedContent, ViewState};
