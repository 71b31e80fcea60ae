/// Lookup cache - durable caller name store with per-key fetch coalescing
use crate::{
    error::{VerifyError, VerifyResult},
    lookup::CacheEntry,
    metrics,
    phone::PhoneKey,
    provider::ProviderError,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use sqlx::{Row, SqlitePool};
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, warn};

const CACHE_TYPE: &str = "caller_name";

type SharedFetch = Shared<BoxFuture<'static, Result<String, ProviderError>>>;
type InFlightMap = HashMap<PhoneKey, SharedFetch>;

/// Caller name cache
#[derive(Clone)]
pub struct LookupCache {
    db: SqlitePool,
    /// Maximum age of a live entry (default: 24 hours)
    ttl: Duration,
    /// One shared fetch per key while the provider call is running
    in_flight: Arc<Mutex<InFlightMap>>,
}

/// Removes the in-flight slot when the fetch task ends, including on panic
struct InFlightGuard {
    in_flight: Arc<Mutex<InFlightMap>>,
    key: PhoneKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_map(&self.in_flight).remove(&self.key);
    }
}

fn lock_map(map: &Mutex<InFlightMap>) -> MutexGuard<'_, InFlightMap> {
    // The map holds no invariants a panicking holder could break
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LookupCache {
    /// Create a new cache with the default TTL
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            ttl: Duration::hours(24),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Set a custom TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the live entry for `key`
    ///
    /// Expired rows are reported as absent but left in place; they are
    /// overwritten by the next fetch or removed by [`Self::purge_expired`].
    pub async fn get(&self, key: &PhoneKey) -> VerifyResult<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT phone, resolved_name, fetched_at
            FROM caller_name_cache
            WHERE phone = ?1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entry = CacheEntry {
            key: PhoneKey::from_normalized(row.try_get("phone")?),
            resolved_name: row.try_get("resolved_name")?,
            fetched_at: from_millis(row.try_get("fetched_at")?)?,
        };

        if entry.is_fresh(Utc::now(), self.ttl) {
            Ok(Some(entry))
        } else {
            debug!("Cache entry for {} is stale", key);
            Ok(None)
        }
    }

    /// Insert or replace the entry for `key`
    ///
    /// A row carrying a strictly newer `fetched_at` is never replaced, so the
    /// newest fetch wins even when writes land out of order.
    pub async fn put(
        &self,
        key: &PhoneKey,
        resolved_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> VerifyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO caller_name_cache (phone, resolved_name, fetched_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(phone) DO UPDATE SET
                resolved_name = excluded.resolved_name,
                fetched_at = excluded.fetched_at
            WHERE excluded.fetched_at >= caller_name_cache.fetched_at
            "#,
        )
        .bind(key.as_str())
        .bind(resolved_name)
        .bind(fetched_at.timestamp_millis())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Return the cached name for `key`, fetching it with `fetch_fn` on a miss
    ///
    /// Concurrent callers for the same key share a single invocation of
    /// `fetch_fn` and all observe its outcome. The fetch runs on its own task:
    /// a caller that stops waiting does not cancel it, and its result is
    /// still stored. Failures are never cached.
    pub async fn resolve<F, Fut>(&self, key: &PhoneKey, fetch_fn: F) -> Result<String, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ProviderError>> + Send + 'static,
    {
        if let Some(entry) = self.get_or_miss(key).await {
            metrics::record_cache_access(CACHE_TYPE, true);
            debug!("Cache HIT: {}", key);
            return Ok(entry.resolved_name);
        }
        metrics::record_cache_access(CACHE_TYPE, false);

        let (fetch, joined) = {
            let mut in_flight = lock_map(&self.in_flight);
            match in_flight.get(key) {
                Some(existing) => (existing.clone(), true),
                None => {
                    let fetch = self.spawn_fetch(key.clone(), fetch_fn());
                    in_flight.insert(key.clone(), fetch.clone());
                    (fetch, false)
                }
            }
        };

        if joined {
            debug!("Joining in-flight lookup for {}", key);
            metrics::record_coalesced_lookup();
        } else {
            debug!("Cache MISS: {}", key);
        }

        fetch.await
    }

    /// Number of keys with a provider fetch currently running
    pub fn in_flight_count(&self) -> usize {
        lock_map(&self.in_flight).len()
    }

    /// Delete the entry for `key` (force a refetch)
    pub async fn invalidate(&self, key: &PhoneKey) -> VerifyResult<()> {
        sqlx::query("DELETE FROM caller_name_cache WHERE phone = ?1")
            .bind(key.as_str())
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Delete expired rows, returning how many were removed
    pub async fn purge_expired(&self) -> VerifyResult<u64> {
        let cutoff = (Utc::now() - self.ttl).timestamp_millis();

        let result = sqlx::query("DELETE FROM caller_name_cache WHERE fetched_at < ?1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Number of stored rows, live or expired
    pub async fn entry_count(&self) -> VerifyResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM caller_name_cache")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Cache read where a storage failure degrades to a miss
    async fn get_or_miss(&self, key: &PhoneKey) -> Option<CacheEntry> {
        match self.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read failed for {}, treating as miss: {}", key, e);
                None
            }
        }
    }

    fn spawn_fetch<Fut>(&self, key: PhoneKey, fetch: Fut) -> SharedFetch
    where
        Fut: Future<Output = Result<String, ProviderError>> + Send + 'static,
    {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let _guard = InFlightGuard {
                in_flight: Arc::clone(&cache.in_flight),
                key: key.clone(),
            };

            // A fetch that finished between our miss and taking the slot has
            // already stored its result
            if let Some(entry) = cache.get_or_miss(&key).await {
                return Ok(entry.resolved_name);
            }

            let result = fetch.await;
            metrics::record_provider_fetch(provider_outcome(&result));

            match &result {
                Ok(name) => {
                    if let Err(e) = cache.put(&key, name, Utc::now()).await {
                        warn!("Failed to cache caller name for {}: {}", key, e);
                    }
                }
                Err(e) => warn!("Caller name fetch failed for {}: {}", key, e),
            }

            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(ProviderError::Unavailable(format!("lookup task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}

fn provider_outcome(result: &Result<String, ProviderError>) -> &'static str {
    match result {
        Ok(_) => "found",
        Err(ProviderError::NoRecord(_)) => "no_record",
        Err(ProviderError::Unavailable(_)) => "unavailable",
    }
}

fn from_millis(ms: i64) -> VerifyResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| VerifyError::Internal(format!("Invalid timestamp: {}", ms)))
}
