/// Built-in users API
///
/// Serves the static roster in the same shape the remote identity store
/// reads, so a deployment without a registry can point the remote store at
/// itself.
use crate::{
    context::AppContext,
    error::VerifyResult,
    identity::{MockIdentityStore, RosterUser},
    phone::PhoneNormalizer,
};
use axum::{extract::State, routing::get, Json, Router};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/solidarity_tech_api/users", get(list_users))
}

/// GET /solidarity_tech_api/users
pub async fn list_users(State(ctx): State<AppContext>) -> VerifyResult<Json<Vec<RosterUser>>> {
    let normalizer = PhoneNormalizer::new(ctx.config.phone.default_country_code.clone());
    let store = MockIdentityStore::with_default_roster(&normalizer)?;
    Ok(Json(store.roster()))
}
