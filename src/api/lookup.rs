/// Caller name lookup endpoints
use crate::{
    context::AppContext,
    error::{VerifyError, VerifyResult},
    verification::LastLookup,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

const NAME_NOT_FOUND: &str = "Name not found or not available";

/// Query parameters shared by the phone-number endpoints
#[derive(Debug, Deserialize)]
pub struct PhoneNumberParams {
    pub phone_number: Option<String>,
}

impl PhoneNumberParams {
    /// The `phone_number` parameter, rejecting a missing or blank value
    pub fn require(self) -> VerifyResult<String> {
        self.phone_number
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| VerifyError::Validation("phone_number parameter is required".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub phone_number: String,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallerNameResponse {
    pub caller_name: String,
    pub phone_number: String,
    pub looked_up_at: chrono::DateTime<chrono::Utc>,
}

impl From<LastLookup> for CallerNameResponse {
    fn from(last: LastLookup) -> Self {
        Self {
            caller_name: last.resolved_name,
            phone_number: last.phone.to_string(),
            looked_up_at: last.looked_up_at,
        }
    }
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/lookup", get(lookup_phone_number).delete(forget_phone_number))
        .route("/get_caller_name", get(get_caller_name))
}

/// GET /lookup?phone_number=
///
/// Resolve the caller name for a number. A number with no caller name on
/// record is answered with `name: null` rather than an error.
pub async fn lookup_phone_number(
    State(ctx): State<AppContext>,
    Query(params): Query<PhoneNumberParams>,
) -> VerifyResult<Json<LookupResponse>> {
    let phone_number = params.require()?;

    match ctx.orchestrator.lookup_name(&phone_number).await {
        Ok(name) => Ok(Json(LookupResponse {
            phone_number,
            name: Some(name),
            message: None,
        })),
        Err(VerifyError::NoRecord(_)) => Ok(Json(LookupResponse {
            phone_number,
            name: None,
            message: Some(NAME_NOT_FOUND.to_string()),
        })),
        Err(e) => Err(e),
    }
}

/// DELETE /lookup?phone_number=
///
/// Evict the cached caller name so the next lookup goes to the provider.
pub async fn forget_phone_number(
    State(ctx): State<AppContext>,
    Query(params): Query<PhoneNumberParams>,
) -> VerifyResult<Json<serde_json::Value>> {
    let phone_number = params.require()?;
    let key = ctx.orchestrator.forget(&phone_number).await?;

    Ok(Json(serde_json::json!({
        "phone_number": key.as_str(),
        "invalidated": true,
    })))
}

/// GET /get_caller_name
///
/// The most recently resolved caller name.
pub async fn get_caller_name(
    State(ctx): State<AppContext>,
) -> VerifyResult<Json<CallerNameResponse>> {
    ctx.orchestrator
        .last_lookup()
        .map(|last| Json(last.into()))
        .ok_or_else(|| {
            VerifyError::NotFound("Caller name not found or not looked up yet".to_string())
        })
}
