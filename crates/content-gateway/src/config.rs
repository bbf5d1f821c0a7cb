use crate::error::{GatewayError, Result};
use content_cache::{CacheConfig, CACHE_TTL_SECS, MAX_CACHEABLE_SIZE};
use std::env;
use std::path::PathBuf;
use url::Url;
use walrus_client::WalrusConfig;

const DEFAULT_PORT: u16 = 3005;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub cache_dir: PathBuf,
    pub key_registry_path: PathBuf,
    pub max_cacheable_size: u64,
    pub cache_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub walrus: WalrusConfig,
    /// Without an oracle no viewer is granted access to gated content
    pub access_oracle_url: Option<String>,
    /// Bearer token guarding the cache maintenance routes
    pub admin_token: Option<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let cache_dir = lookup("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./cache/content"));

        let key_registry_path = lookup("KEY_REGISTRY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/key-registry.json"));

        let walrus_defaults = WalrusConfig::default();
        let publishers = lookup("WALRUS_PUBLISHERS")
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or(walrus_defaults.publishers);
        let aggregator = lookup("WALRUS_AGGREGATOR").unwrap_or(walrus_defaults.aggregator);
        let epochs = lookup("WALRUS_EPOCHS")
            .and_then(|e| e.parse().ok())
            .unwrap_or(walrus_defaults.epochs);

        Self {
            port,
            cache_dir,
            key_registry_path,
            max_cacheable_size: parsed("MAX_CACHEABLE_SIZE").unwrap_or(MAX_CACHEABLE_SIZE),
            cache_ttl_secs: parsed("CACHE_TTL_SECS").unwrap_or(CACHE_TTL_SECS),
            sweep_interval_secs: parsed("SWEEP_INTERVAL_SECS")
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            walrus: WalrusConfig {
                publishers,
                aggregator,
                epochs,
            },
            access_oracle_url: lookup("ACCESS_ORACLE_URL").filter(|u| !u.trim().is_empty()),
            admin_token: lookup("ADMIN_TOKEN")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }

    /// Reject endpoint settings that can't be used
    pub fn validate(&self) -> Result<()> {
        if self.walrus.publishers.is_empty() {
            return Err(GatewayError::Config(
                "WALRUS_PUBLISHERS lists no publishers".to_string(),
            ));
        }
        let endpoints = self
            .walrus
            .publishers
            .iter()
            .chain(std::iter::once(&self.walrus.aggregator))
            .chain(self.access_oracle_url.iter());
        for endpoint in endpoints {
            let url = Url::parse(endpoint)
                .map_err(|e| GatewayError::Config(format!("invalid URL {}: {}", endpoint, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(GatewayError::Config(format!(
                    "unsupported scheme in {}",
                    endpoint
                )));
            }
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.max_cacheable_size, self.cache_ttl_secs)
    }
}
