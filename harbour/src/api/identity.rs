//! Caller identity extraction
//!
//! The internal user id arrives in a trusted header set by the fronting
//! gateway. A missing or non-integer value is not rejected here; operations
//! that need an identity report `MissingIdentity` themselves.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use harbour_common::db::UserId;
use std::convert::Infallible;
use tracing::debug;

use crate::AppState;

/// Caller identity, if a valid one was supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Option<UserId>);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts.headers.get(&*state.identity_header);

        let user_id = raw
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<UserId>().ok());

        if raw.is_some() && user_id.is_none() {
            debug!(header = %state.identity_header, "Ignoring non-integer caller identity");
        }

        Ok(Caller(user_id))
    }
}
