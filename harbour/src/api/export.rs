//! Library export endpoint

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use super::identity::Caller;
use crate::error::FederationResult;
use crate::AppState;

/// GET /export/alt/:kind
///
/// Returns the zip archive as an attachment.
pub async fn export_alt(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(kind): Path<String>,
) -> FederationResult<Response> {
    let archive = state.federation.export(&kind, caller).await?;

    let disposition = format!("attachment; filename=\"{}\"", archive.filename.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive.bytes,
    )
        .into_response())
}
