//! Error taxonomy for the gateway
//!
//! Every failure reaching a handler is one `FederationError`. Each variant maps
//! to a fixed (status, code, message) triple; upstream payloads ride along in a
//! separate `upstream` object and never replace the stable message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Raw upstream response kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamDiagnostic {
    /// None when no HTTP response was received
    pub status_code: Option<u16>,
    pub body: String,
}

impl UpstreamDiagnostic {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            body: body.into(),
        }
    }

    /// Diagnostic for a request that failed before any response
    pub fn transport(error: impl Into<String>) -> Self {
        Self {
            status_code: None,
            body: error.into(),
        }
    }
}

/// Gateway error kinds
#[derive(Debug, Error)]
pub enum FederationError {
    #[error("Request is missing required fields or has the wrong type")]
    DataMalformed,

    #[error("Mirror is not in the allow-list: {0}")]
    BadMirror(String),

    #[error("No valid caller identity was supplied")]
    MissingIdentity,

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Classic end point did not return a session cookie")]
    NoCookie,

    #[error("Unknown upstream error (status {:?})", .0.status_code)]
    UnknownUpstream(UpstreamDiagnostic),

    #[error("Classic end point timed out")]
    ClassicTimeout,

    #[error("{0} timed out")]
    UpstreamTimeout(&'static str),

    #[error("User has no classic account")]
    NoClassicAccount,

    #[error("User has no alt-system account")]
    NoAltAccount,

    #[error("User has no alt-system libraries")]
    NoLibraries,

    #[error("Snapshot user index is not loaded")]
    NotLoaded,

    #[error("Snapshot backend error: {0}")]
    SnapshotBackend(String),

    #[error("Unsupported export type: {0}")]
    UnsupportedExportType(String),

    #[error("Export service failed: {reason}")]
    ExportServiceFailed {
        reason: String,
        upstream: Option<UpstreamDiagnostic>,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Store error: {0}")]
    Store(#[from] harbour_common::Error),
}

impl FederationError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            FederationError::DataMalformed => "DATA_MALFORMED",
            FederationError::BadMirror(_) => "BAD_MIRROR",
            FederationError::MissingIdentity => "MISSING_IDENTITY",
            FederationError::AuthFailed => "AUTH_FAILED",
            FederationError::NoCookie => "NO_COOKIE",
            FederationError::UnknownUpstream(_) => "UNKNOWN_UPSTREAM_ERROR",
            FederationError::ClassicTimeout => "CLASSIC_TIMEOUT",
            FederationError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            FederationError::NoClassicAccount => "NO_CLASSIC_ACCOUNT",
            FederationError::NoAltAccount => "NO_ALT_ACCOUNT",
            FederationError::NoLibraries => "NO_LIBRARIES",
            FederationError::NotLoaded => "SNAPSHOT_NOT_LOADED",
            FederationError::SnapshotBackend(_) => "SNAPSHOT_BACKEND_ERROR",
            FederationError::UnsupportedExportType(_) => "UNSUPPORTED_EXPORT_TYPE",
            FederationError::ExportServiceFailed { .. } => "EXPORT_SERVICE_FAILED",
            FederationError::Archive(_) | FederationError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Stable user-facing message
    pub fn message(&self) -> &'static str {
        match self {
            FederationError::DataMalformed => {
                "Request is missing required fields or has the wrong type"
            }
            FederationError::BadMirror(_) => "The requested mirror site does not exist",
            FederationError::MissingIdentity => "No valid caller identity was supplied",
            FederationError::AuthFailed => "Authentication failed",
            FederationError::NoCookie => "Classic end point did not return a session cookie",
            FederationError::UnknownUpstream(_) => "An unknown error occurred on an upstream service",
            FederationError::ClassicTimeout => {
                "Classic end point timed out before it could respond"
            }
            FederationError::UpstreamTimeout(_) => {
                "An upstream service timed out before it could respond"
            }
            FederationError::NoClassicAccount => "This user has not set up a classic account",
            FederationError::NoAltAccount => "This user has not set up an alt-system account",
            FederationError::NoLibraries => "This user has no alt-system libraries",
            FederationError::NotLoaded => "Snapshot user index is not loaded",
            FederationError::SnapshotBackend(_) => "Unknown snapshot storage problem",
            FederationError::UnsupportedExportType(_) => "This export type does not exist",
            FederationError::ExportServiceFailed { .. } => "Unknown failure from the export service",
            FederationError::Archive(_) | FederationError::Store(_) => "Internal error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FederationError::DataMalformed
            | FederationError::BadMirror(_)
            | FederationError::MissingIdentity
            | FederationError::NoClassicAccount
            | FederationError::NoAltAccount
            | FederationError::NoLibraries
            | FederationError::UnsupportedExportType(_) => StatusCode::BAD_REQUEST,
            FederationError::AuthFailed => StatusCode::NOT_FOUND,
            FederationError::ClassicTimeout | FederationError::UpstreamTimeout(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            FederationError::NoCookie
            | FederationError::UnknownUpstream(_)
            | FederationError::NotLoaded
            | FederationError::SnapshotBackend(_)
            | FederationError::ExportServiceFailed { .. }
            | FederationError::Archive(_)
            | FederationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Upstream payload attached to the response, if any
    pub fn upstream(&self) -> Option<&UpstreamDiagnostic> {
        match self {
            FederationError::UnknownUpstream(diagnostic) => Some(diagnostic),
            FederationError::ExportServiceFailed { upstream, .. } => upstream.as_ref(),
            _ => None,
        }
    }
}

impl IntoResponse for FederationError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
            }
        });

        if let Some(upstream) = self.upstream() {
            body["upstream"] = json!(upstream);
        }

        (self.status(), Json(body)).into_response()
    }
}

/// Result type for gateway operations
pub type FederationResult<T> = Result<T, FederationError>;
