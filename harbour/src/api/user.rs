//! Stored identity and mirror allow-list endpoints

use axum::{extract::State, Json};

use super::identity::Caller;
use crate::error::FederationResult;
use crate::federation::ClassicIdentity;
use crate::AppState;

/// GET /user
pub async fn get_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> FederationResult<Json<ClassicIdentity>> {
    Ok(Json(state.federation.get_identity(caller).await?))
}

/// GET /mirrors
pub async fn list_mirrors(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.federation.allowed_mirrors().to_vec())
}
