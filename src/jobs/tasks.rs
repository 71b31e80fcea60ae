/// Background task implementations
use crate::{context::AppContext, error::VerifyResult, metrics};

/// Delete expired cache rows and refresh the cache size gauge
pub async fn purge_expired_cache(ctx: &AppContext) -> VerifyResult<u64> {
    let cache = ctx.orchestrator.cache();
    let removed = cache.purge_expired().await?;

    metrics::CACHE_SIZE.set(cache.entry_count().await?);
    metrics::UPTIME_SECONDS.set(ctx.uptime_seconds());

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::test_config, db, identity::MockIdentityStore, phone::PhoneNormalizer,
        verification::orchestrator::tests::StaticProvider,
    };
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_purge_expired_cache() {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let normalizer = PhoneNormalizer::default();
        let store = MockIdentityStore::with_default_roster(&normalizer).unwrap();
        let ctx = AppContext::from_parts(
            test_config(),
            pool,
            Arc::new(StaticProvider::new(&[])),
            Arc::new(store),
        );

        let cache = ctx.orchestrator.cache();
        let old = normalizer.normalize("+15551234567").unwrap();
        let new = normalizer.normalize("+15557654321").unwrap();
        cache.put(&old, "John Doe", Utc::now() - Duration::days(2)).await.unwrap();
        cache.put(&new, "Jane Smith", Utc::now()).await.unwrap();

        assert_eq!(purge_expired_cache(&ctx).await.unwrap(), 1);
        assert_eq!(cache.entry_count().await.unwrap(), 1);
        assert_eq!(metrics::CACHE_SIZE.get(), 1);
    }
}
