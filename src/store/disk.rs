use crate::core::cache::{CacheError, KeyValueCollection};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<SystemTime>,
}

impl CacheEntry {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Collection persisted in a fjall partition. Expiry is stored next to the value.
pub struct DiskCollection {
    // Keeps the keyspace open for as long as the partition is in use
    _keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Arc<Keyspace>, partition: PartitionHandle) -> Self {
        Self {
            _keyspace: keyspace,
            partition,
        }
    }

    fn load(&self, key: &[u8]) -> Result<Option<CacheEntry>, CacheError> {
        let Some(raw) = self.partition.get(key)? else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_slice(&raw)?;
        if entry.is_expired(SystemTime::now()) {
            debug!("Cache entry expired for key: {}", String::from_utf8_lossy(key));
            self.partition.remove(key)?;
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        let entry = self.load(key)?;
        if entry.is_some() {
            debug!("Cache HIT for key: {}", String::from_utf8_lossy(key));
        } else {
            debug!("Cache MISS for key: {}", String::from_utf8_lossy(key));
        }
        Ok(entry.map(|e| e.value))
    }

    async fn put(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value: value.to_vec(),
            expires_at: ttl.map(|d| SystemTime::now() + d),
        };
        self.partition.insert(key, serde_json::to_vec(&entry)?)?;
        debug!("Cache PUT for key: {}", String::from_utf8_lossy(key));
        Ok(())
    }

    async fn ttl(&self, key: &[u8]) -> Result<Option<Duration>, CacheError> {
        let now = SystemTime::now();
        Ok(self
            .load(key)?
            .and_then(|entry| entry.expires_at)
            .map(|expiry| expiry.duration_since(now).unwrap_or_default()))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let keys = self
            .partition
            .keys()
            .collect::<Result<Vec<_>, fjall::Error>>()?;
        for key in keys {
            self.partition.remove(key)?;
        }
        debug!("Cache CLEAR");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjall::PartitionCreateOptions;
    use tempfile::tempdir;
    use tokio::time::sleep;

    fn open_collection(dir: &std::path::Path) -> DiskCollection {
        let keyspace = Arc::new(fjall::Config::new(dir).open().unwrap());
        let partition = keyspace
            .open_partition("test", PartitionCreateOptions::default())
            .unwrap();
        DiskCollection::new(keyspace, partition)
    }

    #[tokio::test]
    async fn test_disk_cache_get_put() {
        let dir = tempdir().unwrap();
        let cache = open_collection(dir.path());

        assert!(cache.get(b"key1").await.unwrap().is_none());

        cache.put(b"key1", b"123", None).await.unwrap();

        assert_eq!(cache.get(b"key1").await.unwrap(), Some(b"123".to_vec()));
        assert!(cache.get(b"key2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_cache_ttl_expiration() {
        let dir = tempdir().unwrap();
        let cache = open_collection(dir.path());

        cache
            .put(b"key1", b"123", Some(Duration::from_millis(200)))
            .await
            .unwrap();
        assert_eq!(cache.get(b"key1").await.unwrap(), Some(b"123".to_vec()));
        assert!(cache.ttl(b"key1").await.unwrap().unwrap() <= Duration::from_millis(200));

        sleep(Duration::from_millis(300)).await;
        assert!(cache.get(b"key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_cache_clear() {
        let dir = tempdir().unwrap();
        let cache = open_collection(dir.path());

        cache.put(b"key1", b"123", None).await.unwrap();
        cache.put(b"key2", b"456", None).await.unwrap();

        cache.clear().await.unwrap();

        assert!(cache.get(b"key1").await.unwrap().is_none());
        assert!(cache.get(b"key2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_cache_rejects_corrupt_entry() {
        let dir = tempdir().unwrap();
        let cache = open_collection(dir.path());

        cache.partition.insert(b"key1".as_slice(), b"not json".as_slice()).unwrap();

        assert!(matches!(
            cache.get(b"key1").await,
            Err(CacheError::Serialization(_))
        ));
    }
}
