//! Library listing endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use harbour_common::db::UserId;
use serde::Serialize;

use crate::error::{FederationError, FederationResult};
use crate::federation::LibrarySystem;
use crate::services::Library;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LibrariesResponse {
    pub libraries: Vec<Library>,
}

/// GET /libraries/classic/:uid
pub async fn classic_libraries(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> FederationResult<Json<LibrariesResponse>> {
    list(&state, LibrarySystem::Classic, &uid).await
}

/// GET /libraries/alt/:uid
pub async fn alt_libraries(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> FederationResult<Json<LibrariesResponse>> {
    list(&state, LibrarySystem::Alt, &uid).await
}

async fn list(
    state: &AppState,
    system: LibrarySystem,
    uid: &str,
) -> FederationResult<Json<LibrariesResponse>> {
    let user_id: UserId = uid.trim().parse().map_err(|_| FederationError::MissingIdentity)?;
    let libraries = state.federation.list_libraries(system, user_id).await?;
    Ok(Json(LibrariesResponse { libraries }))
}
