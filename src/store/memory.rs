use crate::core::cache::{CacheError, KeyValueCollection};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// In-memory collection with per-entry expiry
pub struct MemoryCollection {
    inner: Mutex<HashMap<Vec<u8>, CacheValue>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        let mut cache = self.inner.lock().await;
        let now = Instant::now();
        match cache.get(key) {
            Some(entry) if entry.is_expired(now) => {
                debug!("Cache entry expired for key: {}", String::from_utf8_lossy(key));
                cache.remove(key);
                Ok(None)
            }
            Some(entry) => {
                debug!("Cache HIT for key: {}", String::from_utf8_lossy(key));
                Ok(Some(entry.value.clone()))
            }
            None => {
                debug!("Cache MISS for key: {}", String::from_utf8_lossy(key));
                Ok(None)
            }
        }
    }

    async fn put(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let cache_value = CacheValue {
            value: value.to_vec(),
            expires_at,
        };

        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {}", String::from_utf8_lossy(key));
        cache.insert(key.to_vec(), cache_value);
        Ok(())
    }

    async fn ttl(&self, key: &[u8]) -> Result<Option<Duration>, CacheError> {
        let cache = self.inner.lock().await;
        let now = Instant::now();
        Ok(cache
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|expiry| expiry.saturating_duration_since(now)))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut cache = self.inner.lock().await;
        cache.clear();
        debug!("Cache CLEAR");
        Ok(())
    }
}
