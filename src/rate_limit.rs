/// Rate Limiting
///
/// One global inbound limiter in front of the verification routes. Every
/// uncached lookup turns into a billed provider call, so the service caps how
/// fast clients can drive them.
use crate::{
    config,
    error::{VerifyError, VerifyResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Burst size
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 50,
            burst_size: 100,
        }
    }
}

impl From<&config::RateLimitConfig> for RateLimitConfig {
    fn from(config: &config::RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            requests_per_second: config.requests_per_second,
            burst_size: config.burst_size,
        }
    }
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    limiter: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            enabled: config.enabled,
            limiter: Arc::new(GovernorLimiter::direct(quota)),
        }
    }

    /// Check the global rate limit
    pub fn check(&self) -> VerifyResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.limiter
            .check()
            .map_err(|_| VerifyError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            })
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Response {
    match ctx.rate_limiter.check() {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
            e.into_response()
        }
    }
}
