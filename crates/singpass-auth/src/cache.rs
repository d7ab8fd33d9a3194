//! Time-bounded cache of key stores
//!
//! Stores are built once per fetch and shared behind `Arc`; the cache only
//! ever swaps whole stores, it never mutates one. Entries are keyed by the
//! validated source location, so `None` and the explicit default endpoint
//! share an entry.
//!
//! Fetches are single-flight per source: concurrent misses wait on one
//! in-flight fetch and share its result. Forced refreshes (used when a kid is
//! missing, i.e. the provider may have rotated keys) are additionally rate
//! limited so a stream of tokens with unknown kids cannot hammer the
//! provider's endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::jwks::{KeySetFetcher, KeySetSource};
use crate::keys::KeyStore;

#[derive(Debug, Clone)]
struct CachedStore {
    store: Arc<KeyStore>,
    fetched_at: Instant,
}

impl CachedStore {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Read-only key store cache with a TTL and rate-limited forced refresh
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use singpass_auth::{KeySetFetcher, KeyStoreCache, SingpassConfig};
///
/// # tokio_test::block_on(async {
/// let fetcher = KeySetFetcher::new(SingpassConfig::default())?;
/// let cache = KeyStoreCache::new(fetcher, Duration::from_secs(600));
///
/// // Fetched once, then served from memory for ten minutes
/// let store = cache.get(None).await?;
/// # Ok::<(), singpass_auth::FetchError>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct KeyStoreCache {
    fetcher: KeySetFetcher,
    ttl: Duration,
    min_refresh_interval: Duration,
    entries: Arc<RwLock<HashMap<String, CachedStore>>>,
    in_flight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyStoreCache {
    /// Create a cache in front of `fetcher`
    ///
    /// The minimum refresh interval is taken from the fetcher's configuration.
    pub fn new(fetcher: KeySetFetcher, ttl: Duration) -> Self {
        let min_refresh_interval = fetcher.config().min_refresh_interval;
        Self {
            fetcher,
            ttl,
            min_refresh_interval,
            entries: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Override the minimum interval between forced refreshes
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Cache time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The fetcher used on cache misses
    pub fn fetcher(&self) -> &KeySetFetcher {
        &self.fetcher
    }

    /// Get the key store for `source`, fetching it if absent or expired
    ///
    /// # Errors
    /// Returns the [`FetchError`] of the underlying fetch on a miss.
    pub async fn get(&self, source: Option<&str>) -> Result<Arc<KeyStore>, FetchError> {
        let source = self.fetcher.parse_source(source)?;
        let location = source.to_string();

        if let Some(store) = self.fresh_entry(&location).await {
            debug!(jwks_uri = %location, "Using cached key store");
            return Ok(store);
        }

        let flight = self.flight_lock(&location).await;
        let _guard = flight.lock().await;

        // Filled by another caller while this one waited
        if let Some(store) = self.fresh_entry(&location).await {
            debug!(jwks_uri = %location, "Using key store fetched by a concurrent caller");
            return Ok(store);
        }

        self.fetch_and_cache(&source, location).await
    }

    /// Refetch the key store for `source`, ignoring the TTL
    ///
    /// If the entry was fetched less than the minimum refresh interval ago,
    /// the cached store is returned instead of hitting the endpoint again.
    /// Callers racing on the same source share one refetch.
    ///
    /// # Errors
    /// Returns the [`FetchError`] of the underlying fetch.
    pub async fn refresh(&self, source: Option<&str>) -> Result<Arc<KeyStore>, FetchError> {
        let source = self.fetcher.parse_source(source)?;
        let location = source.to_string();

        let seen = self.entry(&location).await.map(|cached| cached.fetched_at);

        let flight = self.flight_lock(&location).await;
        let _guard = flight.lock().await;

        if let Some(cached) = self.entry(&location).await {
            if Some(cached.fetched_at) != seen {
                debug!(jwks_uri = %location, "Key set refreshed by a concurrent caller");
                return Ok(cached.store);
            }

            let since_last = cached.fetched_at.elapsed();
            if since_last < self.min_refresh_interval {
                warn!(
                    jwks_uri = %location,
                    since_last_ms = since_last.as_millis(),
                    "Key set refresh rate limited, using cache"
                );
                return Ok(cached.store);
            }
        }

        self.fetch_and_cache(&source, location).await
    }

    /// Drop the entry for `source`; returns whether one was cached
    ///
    /// An invalid source is simply not cached.
    pub async fn invalidate(&self, source: Option<&str>) -> bool {
        let Ok(location) = self.fetcher.parse_source(source) else {
            return false;
        };
        self.entries
            .write()
            .await
            .remove(&location.to_string())
            .is_some()
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of cached sources, fresh or expired
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is cached
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn entry(&self, location: &str) -> Option<CachedStore> {
        self.entries.read().await.get(location).cloned()
    }

    async fn fresh_entry(&self, location: &str) -> Option<Arc<KeyStore>> {
        self.entry(location)
            .await
            .filter(|cached| cached.is_fresh(self.ttl))
            .map(|cached| cached.store)
    }

    /// Lock serializing fetches of one source
    async fn flight_lock(&self, location: &str) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(location.to_string()).or_default())
    }

    async fn fetch_and_cache(
        &self,
        source: &KeySetSource,
        location: String,
    ) -> Result<Arc<KeyStore>, FetchError> {
        let entries = self.fetcher.fetch(source).await?;
        let store = Arc::new(KeyStore::from_key_set(&entries));

        info!(
            jwks_uri = %location,
            key_count = store.len(),
            ttl_secs = self.ttl.as_secs(),
            "Cached key store"
        );

        self.entries.write().await.insert(
            location,
            CachedStore {
                store: Arc::clone(&store),
                fetched_at: Instant::now(),
            },
        );

        Ok(store)
    }
}
