/// HTTP server setup and routing
use crate::{
    api::middleware::track_http_metrics,
    context::AppContext,
    error::{VerifyError, VerifyResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::Json,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Fallback goes in before the layers so unmatched paths are traced, counted and limited
    Router::new()
        .merge(crate::api::routes())
        .fallback(not_found)
        .with_state(ctx.clone())
        .layer(middleware::from_fn(track_http_metrics))
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> VerifyResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Caller ID verification service listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());
    info!("   Identity store: {}", ctx.orchestrator.identity_store().kind());
    info!("   Cache TTL: {}s", ctx.config.cache.ttl_secs);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VerifyError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| VerifyError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::test_config,
        db,
        identity::MockIdentityStore,
        phone::PhoneNormalizer,
        provider::ProviderError,
        verification::orchestrator::tests::StaticProvider,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_router(provider: Arc<StaticProvider>) -> Router {
        test_router_with_config(test_config(), provider).await
    }

    async fn test_router_with_config(
        config: crate::config::ServerConfig,
        provider: Arc<StaticProvider>,
    ) -> Router {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let store = MockIdentityStore::with_default_roster(&PhoneNormalizer::default()).unwrap();

        let ctx = AppContext::from_parts(config, pool, provider, Arc::new(store));
        build_router(ctx)
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn default_provider() -> Arc<StaticProvider> {
        Arc::new(StaticProvider::new(&[
            ("+15551234567", Ok("JOHN DOE")),
            ("+15557654321", Err(ProviderError::NoRecord("+15557654321".to_string()))),
        ]))
    }

    #[tokio::test]
    async fn test_lookup_and_last_caller_name() {
        let router = test_router(default_provider()).await;

        let (status, _) = get(&router, "/get_caller_name").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(&router, "/lookup?phone_number=%2B15551234567").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "JOHN DOE");

        let (status, body) = get(&router, "/get_caller_name").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["caller_name"], "JOHN DOE");
        assert_eq!(body["phone_number"], "+15551234567");
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let router = test_router(default_provider()).await;

        let (status, body) = get(&router, "/lookup").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidRequest");

        let (status, body) = get(&router, "/lookup?phone_number=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidPhoneNumber");

        let (status, body) = get(&router, "/lookup?phone_number=5557654321").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["name"].is_null());
    }

    #[tokio::test]
    async fn test_unmatched_paths_pass_through_middleware() {
        let mut config = test_config();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst_size = 1;
        let router = test_router_with_config(config, default_provider()).await;

        let (status, body) = get(&router, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");

        // The fallback is behind the limiter like any route
        let (status, body) = get(&router, "/still-nope").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "RateLimitExceeded");

        let unmatched = crate::metrics::HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "unmatched", "404"])
            .get();
        assert!(unmatched >= 1);
    }

    #[tokio::test]
    async fn test_forget_refetches() {
        let provider = default_provider();
        let router = test_router(Arc::clone(&provider)).await;

        get(&router, "/lookup?phone_number=5551234567").await;
        get(&router, "/lookup?phone_number=5551234567").await;
        assert_eq!(provider.calls(), 1);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/lookup?phone_number=5551234567")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        get(&router, "/lookup?phone_number=5551234567").await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_verify_identity() {
        let router = test_router(default_provider()).await;

        let (status, body) = get(&router, "/verify_identity?phone_number=555-123-4567").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Verified");
        assert_eq!(body["claimedName"], "John Doe");

        let (status, body) = get(&router, "/verify_identity?phone_number=5550001111").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "UnknownIdentity");
    }

    #[tokio::test]
    async fn test_verify_all_identities() {
        let router = test_router(default_provider()).await;

        let (status, body) = get(&router, "/verify_all_identities").await;
        assert_eq!(status, StatusCode::OK);

        let results = body.as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["phone"], "+15551234567");
        assert_eq!(results[0]["status"], "Verified");
        assert_eq!(results[1]["phone"], "+15557654321");
        assert_eq!(results[1]["status"], "Unresolvable");
    }

    #[tokio::test]
    async fn test_roster_and_health() {
        let router = test_router(default_provider()).await;

        let (status, body) = get(&router, "/solidarity_tech_api/users").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["phone_number"], "+15551234567");
        assert_eq!(body[1]["name"], "Jane Smith");

        let (status, _) = get(&router, "/health/ready").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(&router, "/health/detailed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded"); // no provider credentials in test config

        let (status, _) = get(&router, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
