use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Namespace prefix for every tokenomics entry in a shared store.
pub const NAMESPACE: &str = "tokenomics";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<fjall::Error> for CacheError {
    fn from(e: fjall::Error) -> Self {
        CacheError::Backend(e.to_string())
    }
}

/// Fixed-length cache key derived from an asset address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `tokenomics:<hex sha256 of address>`
pub fn derive_key(address: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(address.as_bytes());
    CacheKey(format!("{NAMESPACE}:{:x}", hasher.finalize()))
}

#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>)
    -> Result<(), CacheError>;

    /// Remaining lifetime of a live entry. `Ok(None)` if absent or stored without expiry.
    async fn ttl(&self, key: &[u8]) -> Result<Option<Duration>, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

pub trait Store {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>>;
}
