/// Identity verification endpoints
use super::lookup::PhoneNumberParams;
use crate::{
    context::AppContext,
    error::VerifyResult,
    verification::{orchestrator::collect_all, VerificationResult},
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/verify_identity", get(verify_identity))
        .route("/verify_all_identities", get(verify_all_identities))
}

/// GET /verify_identity?phone_number=
pub async fn verify_identity(
    State(ctx): State<AppContext>,
    Query(params): Query<PhoneNumberParams>,
) -> VerifyResult<Json<VerificationResult>> {
    let phone_number = params.require()?;
    let result = ctx.orchestrator.verify_one(&phone_number).await?;
    Ok(Json(result))
}

/// GET /verify_all_identities
///
/// One result per roster entry, in roster order.
pub async fn verify_all_identities(
    State(ctx): State<AppContext>,
) -> VerifyResult<Json<Vec<VerificationResult>>> {
    let results = collect_all(&ctx.orchestrator).await?;
    Ok(Json(results))
}
