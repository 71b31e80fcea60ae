/// Verification orchestrator - normalizer, cache, provider, roster and matcher
use super::{LastLookup, MatchEngine, VerificationResult, VerificationStatus};
use crate::{
    error::{VerifyError, VerifyResult},
    identity::{IdentityRecord, IdentityStore, RosterEntry},
    lookup::LookupCache,
    metrics,
    phone::{PhoneKey, PhoneNormalizer},
    provider::{CallerIdProvider, ProviderError},
};
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Orchestrates single and bulk caller identity verification
#[derive(Clone)]
pub struct VerificationOrchestrator {
    normalizer: PhoneNormalizer,
    cache: LookupCache,
    provider: Arc<dyn CallerIdProvider>,
    identity_store: Arc<dyn IdentityStore>,
    matcher: MatchEngine,
    /// Bound on concurrent per-record lookups in `verify_all`
    concurrency: usize,
    last_lookup: Arc<RwLock<Option<LastLookup>>>,
}

impl VerificationOrchestrator {
    pub fn new(
        normalizer: PhoneNormalizer,
        cache: LookupCache,
        provider: Arc<dyn CallerIdProvider>,
        identity_store: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            normalizer,
            cache,
            provider,
            identity_store,
            matcher: MatchEngine::new(),
            concurrency: 4,
            last_lookup: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the `verify_all` concurrency bound (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    pub fn identity_store(&self) -> &Arc<dyn IdentityStore> {
        &self.identity_store
    }

    /// Resolve the caller name for a raw phone number
    ///
    /// Returns `NoRecord` when the provider has no name for the number.
    pub async fn lookup_name(&self, raw_phone: &str) -> VerifyResult<String> {
        let key = self.normalizer.normalize(raw_phone)?;
        Ok(self.resolve_key(&key).await?)
    }

    /// Drop the cached name for a raw phone number so the next lookup refetches
    pub async fn forget(&self, raw_phone: &str) -> VerifyResult<PhoneKey> {
        let key = self.normalizer.normalize(raw_phone)?;
        self.cache.invalidate(&key).await?;
        info!("Invalidated cached caller name for {}", key);
        Ok(key)
    }

    /// Verify one raw phone number against its claimed identity
    ///
    /// Invalid numbers, unknown identities and an unavailable provider are
    /// returned as errors. A number the provider has no name for is a normal
    /// `Unresolvable` result.
    pub async fn verify_one(&self, raw_phone: &str) -> VerifyResult<VerificationResult> {
        let key = self.normalizer.normalize(raw_phone)?;
        let record = self.identity_store.lookup(&key).await?;

        let result = match self.resolve_key(&key).await {
            Ok(resolved) => self.compose(record, resolved),
            Err(ProviderError::NoRecord(_)) => self.compose(record, String::new()),
            Err(e) => return Err(e.into()),
        };

        metrics::record_verification(result.status.as_str());
        info!("Verified {}: {}", result.phone, result.status.as_str());
        Ok(result)
    }

    /// Verify every identity in the roster
    ///
    /// The roster is read when this is called; a roster failure is the only
    /// error. The returned stream is lazy and yields one result per record in
    /// roster order. Up to the configured number of records are looked up
    /// concurrently, and any per-record failure becomes an `Unresolvable`
    /// slot carrying the failure in `detail`. Calling again re-reads the
    /// roster and the cache.
    pub async fn verify_all(&self) -> VerifyResult<BoxStream<'static, VerificationResult>> {
        let entries = self.identity_store.list_all().await?;
        debug!("Verifying {} roster records", entries.len());

        let this = self.clone();
        let results = stream::iter(entries)
            .map(move |entry| {
                let this = this.clone();
                async move { this.verify_entry(entry).await }
            })
            .buffered(self.concurrency);

        Ok(results.boxed())
    }

    /// Most recent successful caller name resolution, if any
    pub fn last_lookup(&self) -> Option<LastLookup> {
        self.last_lookup
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn verify_entry(&self, entry: RosterEntry) -> VerificationResult {
        let result = match entry {
            RosterEntry::Valid(record) => self.verify_record(record).await,
            RosterEntry::Invalid {
                raw_phone,
                claimed_name,
                reason,
            } => {
                warn!("Roster entry {:?} cannot be looked up: {}", raw_phone, reason);
                unresolvable(raw_phone, claimed_name, reason)
            }
        };

        metrics::record_verification(result.status.as_str());
        result
    }

    async fn verify_record(&self, record: IdentityRecord) -> VerificationResult {
        match self.resolve_key(&record.phone).await {
            Ok(resolved) => self.compose(record, resolved),
            Err(e) => {
                warn!("Lookup failed for roster entry {}: {}", record.phone, e);
                unresolvable(record.phone.to_string(), record.claimed_name, e.to_string())
            }
        }
    }

    async fn resolve_key(&self, key: &PhoneKey) -> Result<String, ProviderError> {
        let provider = Arc::clone(&self.provider);
        let fetch_key = key.clone();
        let resolved = self
            .cache
            .resolve(key, move || async move { provider.fetch(&fetch_key).await })
            .await?;

        self.record_last_lookup(key, &resolved);
        Ok(resolved)
    }

    fn record_last_lookup(&self, key: &PhoneKey, resolved_name: &str) {
        let mut last = self
            .last_lookup
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(LastLookup {
            phone: key.clone(),
            resolved_name: resolved_name.to_string(),
            looked_up_at: Utc::now(),
        });
    }

    fn compose(&self, record: IdentityRecord, resolved_name: String) -> VerificationResult {
        let status = self.matcher.compare(&record.claimed_name, &resolved_name);
        VerificationResult {
            phone: record.phone.to_string(),
            claimed_name: record.claimed_name,
            resolved_name,
            status,
            detail: None,
        }
    }
}

fn unresolvable(phone: String, claimed_name: String, detail: String) -> VerificationResult {
    VerificationResult {
        phone,
        claimed_name,
        resolved_name: String::new(),
        status: VerificationStatus::Unresolvable,
        detail: Some(detail),
    }
}

/// Convenience for callers that want the whole batch
pub async fn collect_all(
    orchestrator: &VerificationOrchestrator,
) -> Result<Vec<VerificationResult>, VerifyError> {
    Ok(orchestrator.verify_all().await?.collect().await)
}
