/// Caller ID Verify - caller identity verification service
///
/// Checks the name a caller's number is registered to (via a cached
/// caller-ID lookup) against the name claimed in an identity roster.

mod api;
mod config;
mod context;
mod db;
mod error;
mod identity;
mod jobs;
mod lookup;
mod metrics;
mod phone;
mod provider;
mod rate_limit;
mod server;
mod verification;

use config::ServerConfig;
use context::AppContext;
use error::VerifyResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> VerifyResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(config.logging.env_filter()?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Caller ID Verify v{}", env!("CARGO_PKG_VERSION"));

    // Create application context
    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}
