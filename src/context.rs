/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    db,
    error::{VerifyError, VerifyResult},
    identity::{self, IdentityStore},
    lookup::LookupCache,
    phone::PhoneNormalizer,
    provider::{CallerIdProvider, TwilioLookupClient, TwilioLookupConfig},
    rate_limit::RateLimiter,
    verification::VerificationOrchestrator,
};
use sqlx::SqlitePool;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub cache_db: SqlitePool,
    pub orchestrator: Arc<VerificationOrchestrator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> VerifyResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directory if it doesn't exist
        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory)
                .await
                .map_err(|e| {
                    VerifyError::Internal(format!(
                        "Failed to create directory {:?}: {}",
                        config.storage.data_directory, e
                    ))
                })?;
        }

        // Initialize cache database
        let cache_db =
            db::create_pool(&config.storage.cache_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&cache_db).await?;
        db::test_connection(&cache_db).await?;

        let provider_timeout = Duration::from_secs(config.provider.timeout_secs);
        let credentials = match (&config.provider.account_sid, &config.provider.auth_token) {
            (Some(sid), Some(token)) => Some((sid.clone(), token.clone())),
            _ => None,
        };
        let provider: Arc<dyn CallerIdProvider> = Arc::new(TwilioLookupClient::new(
            TwilioLookupConfig {
                base_url: config.provider.base_url.clone(),
                credentials,
                timeout: provider_timeout,
                ..Default::default()
            },
        )?);

        let normalizer = PhoneNormalizer::new(config.phone.default_country_code.clone());
        let identity_store =
            identity::from_config(&config.identity, normalizer.clone(), provider_timeout)?;

        Ok(Self::from_parts(config, cache_db, provider, identity_store))
    }

    /// Assemble a context from already-built collaborators
    pub fn from_parts(
        config: ServerConfig,
        cache_db: SqlitePool,
        provider: Arc<dyn CallerIdProvider>,
        identity_store: Arc<dyn IdentityStore>,
    ) -> Self {
        let normalizer = PhoneNormalizer::new(config.phone.default_country_code.clone());
        let cache = LookupCache::new(cache_db.clone()).with_ttl(config.cache_ttl());

        let orchestrator = VerificationOrchestrator::new(normalizer, cache, provider, identity_store)
            .with_concurrency(config.verification.verify_all_concurrency);

        let rate_limiter = RateLimiter::new((&config.rate_limit).into());

        Self {
            config: Arc::new(config),
            cache_db,
            orchestrator: Arc::new(orchestrator),
            rate_limiter: Arc::new(rate_limiter),
            started_at: Instant::now(),
        }
    }

    /// Seconds since the context was built
    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
