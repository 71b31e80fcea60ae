/// API routes and handlers
pub mod health;
pub mod lookup;
pub mod middleware;
pub mod roster;
pub mod verify;

use crate::{context::AppContext, metrics};
use axum::{http::header, response::IntoResponse, routing::get, Router};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(lookup::routes())
        .merge(verify::routes())
        .merge(roster::routes())
        .route("/metrics", get(prometheus_metrics))
}

/// Prometheus text exposition
async fn prometheus_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}
