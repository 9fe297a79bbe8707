//! Cache-aside aggregation of price and supply data for one asset.
//!
//! A read first consults the cache. On a miss (or any cache fault) both
//! providers are queried concurrently, each bounded by its own timeout, and
//! the call waits for both to settle. One failed provider yields a partial
//! record; two failed providers yield [`AggregatorError::UpstreamUnavailable`].
//! Successful records are written back with a fixed TTL.
//!
//! The fetch-merge-store work runs in a spawned task, so a caller that gives
//! up early still leaves a populated cache behind. Concurrent misses for the
//! same key share a single refresh.

use crate::core::cache::{CacheError, CacheKey, KeyValueCollection, derive_key};
use crate::core::error::{AggregatorError, FetchCause, FetchError};
use crate::core::provider::{PriceInfoProvider, SupplyInfoProvider};
use crate::core::token::{PriceInfo, SupplyInfo, TokenomicsRecord};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorSettings {
    /// Lifetime of a cached record. Not jittered.
    pub ttl: Duration,
    pub fetch_timeout: Duration,
    pub cache_timeout: Duration,
    /// Coalesce concurrent misses for the same key into one refresh.
    pub single_flight: bool,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            single_flight: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub cache_errors: u64,
    pub upstream_failures: u64,
    /// Percentage of reads served from cache.
    pub hit_rate: f64,
}

#[derive(Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    cache_errors: AtomicU64,
    upstream_failures: AtomicU64,
}

impl CacheStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStatsSnapshot {
            hits,
            misses,
            coalesced: self.coalesced.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

type Refresh = Shared<BoxFuture<'static, Result<TokenomicsRecord, AggregatorError>>>;

struct InFlight {
    id: u64,
    refresh: Refresh,
}

struct Inner {
    price_provider: Arc<dyn PriceInfoProvider>,
    supply_provider: Arc<dyn SupplyInfoProvider>,
    cache: Arc<dyn KeyValueCollection>,
    settings: AggregatorSettings,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    next_refresh_id: AtomicU64,
    stats: CacheStats,
}

/// Unregisters a refresh from `in_flight` when its task ends, whether it
/// returned, panicked or was cancelled. A newer refresh under the same key
/// is left alone.
struct InFlightGuard {
    inner: Arc<Inner>,
    key: CacheKey,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(&self.key).is_some_and(|entry| entry.id == self.id) {
            in_flight.remove(&self.key);
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

impl Aggregator {
    pub fn new(
        price_provider: Arc<dyn PriceInfoProvider>,
        supply_provider: Arc<dyn SupplyInfoProvider>,
        cache: Arc<dyn KeyValueCollection>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                price_provider,
                supply_provider,
                cache,
                settings,
                in_flight: Mutex::new(HashMap::new()),
                next_refresh_id: AtomicU64::new(0),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.inner.settings
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Remaining lifetime of the cached record for `address`, if any.
    pub async fn cached_ttl(&self, address: &str) -> Option<Duration> {
        let key = derive_key(address);
        match self.inner.bounded_cache(self.inner.cache.ttl(key.as_bytes())).await {
            Ok(ttl) => ttl,
            Err(e) => {
                self.inner.cache_fault("ttl", &key, &e);
                None
            }
        }
    }

    #[instrument(name = "GetTokenomics", skip(self), fields(address = %address))]
    pub async fn get_tokenomics(&self, address: &str) -> Result<TokenomicsRecord, AggregatorError> {
        if address.is_empty() {
            return Err(AggregatorError::InvalidAddress);
        }

        let started = Instant::now();
        let key = derive_key(address);

        if let Some(record) = self.inner.read_cached(&key).await {
            CacheStats::bump(&self.inner.stats.hits);
            info!(elapsed = ?started.elapsed(), "Returning cached tokenomics");
            return Ok(record);
        }
        CacheStats::bump(&self.inner.stats.misses);

        let result = self.refresh(address, key).await;
        if result.is_ok() {
            info!(elapsed = ?started.elapsed(), "Returning fresh tokenomics");
        }
        result
    }

    fn refresh(&self, address: &str, key: CacheKey) -> Refresh {
        if !self.inner.settings.single_flight {
            return self.spawn_refresh(address.to_string(), key, None);
        }

        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = in_flight.get(&key) {
            debug!(%key, "Joining in-flight refresh");
            CacheStats::bump(&self.inner.stats.coalesced);
            return existing.refresh.clone();
        }

        // Registered while the lock is held, so the task cannot unregister
        // itself before the entry exists.
        let id = self.inner.next_refresh_id.fetch_add(1, Ordering::Relaxed);
        let refresh = self.spawn_refresh(address.to_string(), key.clone(), Some(id));
        in_flight.insert(
            key,
            InFlight {
                id,
                refresh: refresh.clone(),
            },
        );
        refresh
    }

    /// The refresh task is detached from the caller: dropping the returned
    /// future does not stop the fetch or the cache write.
    fn spawn_refresh(&self, address: String, key: CacheKey, tracked: Option<u64>) -> Refresh {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let _guard = tracked.map(|id| InFlightGuard {
                inner: Arc::clone(&inner),
                key: key.clone(),
                id,
            });
            inner.fetch_and_store(&address, &key).await
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(AggregatorError::TaskAborted(e.to_string())))
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    async fn fetch_and_store(
        &self,
        address: &str,
        key: &CacheKey,
    ) -> Result<TokenomicsRecord, AggregatorError> {
        debug!(address, "Fetching fresh data from providers");

        let (price, supply) = futures::join!(
            self.bounded_fetch(
                self.price_provider.name(),
                self.price_provider.fetch_price_info(address)
            ),
            self.bounded_fetch(
                self.supply_provider.name(),
                self.supply_provider.fetch_supply_info(address)
            ),
        );

        let record = self.merge(address, price, supply)?;
        self.write_cached(key, &record).await;
        Ok(record)
    }

    async fn bounded_fetch<T>(
        &self,
        provider: &str,
        fetch: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        let started = Instant::now();
        let result = match timeout(self.settings.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::new(
                provider,
                FetchCause::Timeout,
                format!("no response within {:?}", self.settings.fetch_timeout),
            )),
        };

        match &result {
            Ok(_) => debug!(provider, elapsed = ?started.elapsed(), "Fetched provider data"),
            Err(e) => warn!(provider, elapsed = ?started.elapsed(), error = %e, "Provider fetch failed"),
        }
        result
    }

    fn merge(
        &self,
        address: &str,
        price: Result<PriceInfo, FetchError>,
        supply: Result<SupplyInfo, FetchError>,
    ) -> Result<TokenomicsRecord, AggregatorError> {
        let fetched_at = Utc::now();
        match (price, supply) {
            (Ok(price), Ok(supply)) => Ok(TokenomicsRecord::merge(
                address,
                Some(price),
                Some(supply),
                fetched_at,
            )),
            (Ok(price), Err(e)) => {
                warn!(error = %e, "Serving partial record without supply data");
                Ok(TokenomicsRecord::merge(address, Some(price), None, fetched_at))
            }
            (Err(e), Ok(supply)) => {
                warn!(error = %e, "Serving partial record without price data");
                Ok(TokenomicsRecord::merge(address, None, Some(supply), fetched_at))
            }
            (Err(price), Err(supply)) => {
                CacheStats::bump(&self.stats.upstream_failures);
                error!(%price, %supply, "All providers failed, nothing to cache");
                Err(AggregatorError::UpstreamUnavailable { price, supply })
            }
        }
    }

    async fn bounded_cache<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        timeout(self.settings.cache_timeout, op)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.settings.cache_timeout)))
    }

    /// Any read fault, including an undecodable entry, is reported as a miss.
    async fn read_cached(&self, key: &CacheKey) -> Option<TokenomicsRecord> {
        let bytes = match self.bounded_cache(self.cache.get(key.as_bytes())).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(%key, "Cache MISS");
                return None;
            }
            Err(e) => {
                self.cache_fault("read", key, &e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => {
                debug!(%key, "Cache HIT");
                Some(record)
            }
            Err(e) => {
                self.cache_fault("decode", key, &CacheError::Serialization(e));
                None
            }
        }
    }

    async fn write_cached(&self, key: &CacheKey, record: &TokenomicsRecord) {
        let ttl = self.settings.ttl;
        let result = match serde_json::to_vec(record) {
            Ok(bytes) => {
                self.bounded_cache(self.cache.put(key.as_bytes(), &bytes, Some(ttl)))
                    .await
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => debug!(%key, ?ttl, "Cached tokenomics record"),
            Err(e) => self.cache_fault("write", key, &e),
        }
    }

    fn cache_fault(&self, op: &str, key: &CacheKey, e: &CacheError) {
        CacheStats::bump(&self.stats.cache_errors);
        warn!(op, %key, error = %e, "Cache operation failed, continuing without cache");
    }
}
