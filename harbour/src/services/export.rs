//! Bibliographic export service client
//!
//! One request per library: the service takes a list of bibcodes and returns
//! the concatenated BibTeX text for them.

use crate::error::UpstreamDiagnostic;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Export client errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export service timed out")]
    Timeout,

    #[error("Export service returned an unexpected response (status {:?})", .0.status_code)]
    Failed(UpstreamDiagnostic),
}

#[derive(Debug, Serialize)]
struct ExportRequest<'a> {
    bibcode: &'a [String],
    sort: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    export: String,
}

/// Export service client
#[derive(Clone)]
pub struct ExportClient {
    http: reqwest::Client,
    service_url: String,
    api_token: Option<String>,
}

impl ExportClient {
    pub fn new(
        service_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("harbour/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            service_url: service_url.into(),
            api_token: api_token.filter(|t| !t.is_empty()),
        })
    }

    /// BibTeX text for `bibcodes`, in the order given
    pub async fn bibtex(&self, bibcodes: &[String]) -> Result<String, ExportError> {
        debug!(count = bibcodes.len(), "Requesting BibTeX export");

        // Export order must match library order
        let payload = ExportRequest {
            bibcode: bibcodes,
            sort: ["NONE"],
        };

        let mut request = self.http.post(&self.service_url).json(&payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status != reqwest::StatusCode::OK {
            return Err(ExportError::Failed(UpstreamDiagnostic::new(status.as_u16(), body)));
        }

        let parsed: ExportResponse = serde_json::from_str(&body)
            .map_err(|_| ExportError::Failed(UpstreamDiagnostic::new(status.as_u16(), body.clone())))?;

        Ok(parsed.export)
    }
}

fn transport_error(err: reqwest::Error) -> ExportError {
    if err.is_timeout() {
        ExportError::Timeout
    } else {
        ExportError::Failed(UpstreamDiagnostic::transport(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_shape() {
        let bibcodes = vec!["2015MNRAS.446.4239E".to_string()];
        let payload = ExportRequest {
            bibcode: &bibcodes,
            sort: ["NONE"],
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"bibcode": ["2015MNRAS.446.4239E"], "sort": ["NONE"]})
        );
    }

    #[test]
    fn test_empty_token_treated_as_absent() {
        let client = ExportClient::new("http://localhost/export", Some(String::new()), Duration::from_secs(1))
            .unwrap();
        assert!(client.api_token.is_none());
    }
}
