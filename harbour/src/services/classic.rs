//! Legacy ("classic") system client
//!
//! Credential verification and live library listing. Every call is a single
//! attempt bounded by the client timeout; nothing is retried here.

use super::{fill_template, Library};
use crate::error::UpstreamDiagnostic;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Message the legacy system returns for a successful login
const LOGGED_IN: &str = "LOGGED_IN";

/// Classic client errors
#[derive(Debug, Error)]
pub enum ClassicError {
    #[error("Classic end point timed out")]
    Timeout,

    #[error("Classic end point returned an unexpected response (status {:?})", .0.status_code)]
    Upstream(UpstreamDiagnostic),

    #[error("Authentication rejected: {0}")]
    AuthFailed(String),

    #[error("Logged in but no session cookie was returned")]
    NoCookie,
}

/// Successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicLogin {
    pub email: String,
    pub cookie: String,
}

/// Login response body; only the fields the gateway relies on
#[derive(Debug, Deserialize)]
struct LoginResponse {
    email: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    loggedin: LoginFlag,
    #[serde(default)]
    cookie: Option<String>,
}

/// The legacy system reports `loggedin` as "1"/"0", occasionally as a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoginFlag {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Default for LoginFlag {
    fn default() -> Self {
        LoginFlag::Int(0)
    }
}

impl LoginFlag {
    fn is_set(&self) -> bool {
        match self {
            LoginFlag::Bool(b) => *b,
            LoginFlag::Int(i) => *i != 0,
            LoginFlag::Text(s) => s.trim().parse::<i64>().map(|i| i != 0).unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LibrariesResponse {
    libraries: Vec<ClassicLibrary>,
}

#[derive(Debug, Deserialize)]
struct ClassicLibrary {
    name: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    entries: Vec<ClassicEntry>,
}

#[derive(Debug, Deserialize)]
struct ClassicEntry {
    bibcode: String,
}

impl From<ClassicLibrary> for Library {
    fn from(library: ClassicLibrary) -> Self {
        Library {
            name: library.name,
            description: library.desc,
            documents: library.entries.into_iter().map(|e| e.bibcode).collect(),
        }
    }
}

/// Legacy system client
#[derive(Clone)]
pub struct ClassicClient {
    http: reqwest::Client,
    auth_url: String,
    libraries_url: String,
}

impl ClassicClient {
    pub fn new(
        auth_url: impl Into<String>,
        libraries_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("harbour/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            auth_url: auth_url.into(),
            libraries_url: libraries_url.into(),
        })
    }

    /// Verify credentials at `mirror`
    ///
    /// The mirror must already be allow-listed; it is substituted verbatim.
    pub async fn verify(
        &self,
        mirror: &str,
        email: &str,
        password: &str,
    ) -> Result<ClassicLogin, ClassicError> {
        let encoded_email = urlencoding::encode(email);
        let encoded_password = urlencoding::encode(password);
        let url = fill_template(
            &self.auth_url,
            &[
                ("mirror", mirror),
                ("email", encoded_email.as_ref()),
                ("password", encoded_password.as_ref()),
            ],
        );

        debug!(mirror = %mirror, email = %email, "Sending classic verification request");

        let response = self.http.post(&url).send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_server_error() {
            return Err(ClassicError::Upstream(UpstreamDiagnostic::new(status.as_u16(), body)));
        }

        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|_| ClassicError::Upstream(UpstreamDiagnostic::new(status.as_u16(), body.clone())))?;

        // Checked before anything else: a response for another account is
        // never trusted, whatever its status or login flag
        if login.email != email {
            return Err(ClassicError::AuthFailed(format!(
                "response email \"{}\" does not match request email \"{}\"",
                login.email, email
            )));
        }

        if status != reqwest::StatusCode::OK || login.message != LOGGED_IN || !login.loggedin.is_set() {
            return Err(ClassicError::AuthFailed(format!(
                "status {}, message \"{}\"",
                status.as_u16(),
                login.message
            )));
        }

        match login.cookie {
            Some(cookie) if !cookie.is_empty() => Ok(ClassicLogin {
                email: login.email,
                cookie,
            }),
            _ => Err(ClassicError::NoCookie),
        }
    }

    /// Fetch the user's libraries with a stored session cookie
    pub async fn libraries(&self, mirror: &str, cookie: &str) -> Result<Vec<Library>, ClassicError> {
        let encoded_cookie = urlencoding::encode(cookie);
        let url = fill_template(
            &self.libraries_url,
            &[("mirror", mirror), ("cookie", encoded_cookie.as_ref())],
        );

        debug!(mirror = %mirror, "Fetching classic libraries");

        let response = self.http.get(&url).send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status != reqwest::StatusCode::OK {
            return Err(ClassicError::Upstream(UpstreamDiagnostic::new(status.as_u16(), body)));
        }

        let parsed: LibrariesResponse = serde_json::from_str(&body)
            .map_err(|_| ClassicError::Upstream(UpstreamDiagnostic::new(status.as_u16(), body.clone())))?;

        Ok(parsed.libraries.into_iter().map(Library::from).collect())
    }
}

fn transport_error(err: reqwest::Error) -> ClassicError {
    if err.is_timeout() {
        ClassicError::Timeout
    } else {
        ClassicError::Upstream(UpstreamDiagnostic::transport(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_flag_variants() {
        let parse = |v: &str| serde_json::from_str::<LoginFlag>(v).unwrap().is_set();
        assert!(parse("\"1\""));
        assert!(!parse("\"0\""));
        assert!(parse("1"));
        assert!(parse("true"));
        assert!(!parse("\"yes\""));
    }

    #[test]
    fn test_login_response_without_cookie() {
        let body = r#"{"email": "user@ads.com", "message": "LOGGED_IN", "loggedin": "1"}"#;
        let login: LoginResponse = serde_json::from_str(body).unwrap();
        assert!(login.cookie.is_none());
        assert!(login.loggedin.is_set());
    }

    #[test]
    fn test_classic_library_reshaped() {
        let body = r#"{"libraries": [{"name": "Name", "desc": "Description",
            "entries": [{"bibcode": "2015MNRAS.446.4239E"}, {"bibcode": "2015A&C....10...61E"}]}]}"#;
        let parsed: LibrariesResponse = serde_json::from_str(body).unwrap();
        let libraries: Vec<Library> = parsed.libraries.into_iter().map(Library::from).collect();

        assert_eq!(libraries[0].description, "Description");
        assert_eq!(
            libraries[0].documents,
            vec!["2015MNRAS.446.4239E", "2015A&C....10...61E"]
        );
    }
}
