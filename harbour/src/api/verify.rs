//! Credential verification endpoints

use axum::{body::Bytes, extract::State, Json};
use serde::de::DeserializeOwned;

use super::identity::Caller;
use crate::error::{FederationError, FederationResult};
use crate::federation::{AltCredentials, AltVerified, ClassicCredentials, ClassicVerified};
use crate::AppState;

/// POST /auth/classic
pub async fn verify_classic(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Bytes,
) -> FederationResult<Json<ClassicVerified>> {
    let credentials: ClassicCredentials = parse_body(&body)?;
    let verified = state.federation.verify_classic(caller, credentials).await?;
    Ok(Json(verified))
}

/// POST /auth/alt
pub async fn verify_alt(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Bytes,
) -> FederationResult<Json<AltVerified>> {
    let credentials: AltCredentials = parse_body(&body)?;
    let verified = state.federation.verify_alt(caller, credentials).await?;
    Ok(Json(verified))
}

/// Any unreadable body, wrong field type included, is malformed input
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> FederationResult<T> {
    serde_json::from_slice(body).map_err(|_| FederationError::DataMalformed)
}
