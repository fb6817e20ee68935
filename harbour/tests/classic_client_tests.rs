//! Tests for the legacy system client against a mock legacy mirror
//!
//! Tests cover:
//! - Verification outcomes (success, auth failure, missing cookie, server error)
//! - Timeouts surfaced as a distinct outcome
//! - Library listing reshaping and non-200 handling

use harbour::services::{ClassicClient, ClassicError};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MIRROR: &str = "mirror.com";

fn client(server: &MockServer, timeout: Duration) -> ClassicClient {
    ClassicClient::new(
        format!("{}/{{mirror}}/login?email={{email}}&password={{password}}", server.uri()),
        format!("{}/{{mirror}}/libraries?cookie={{cookie}}", server.uri()),
        timeout,
    )
    .unwrap()
}

async fn mount_login(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/mirror.com/login"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_verify_success_returns_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mirror.com/login"))
        .and(query_param("email", "user@ads.com"))
        .and(query_param("password", "p@ss word"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email": "user@ads.com",
            "cookie": "50eefa48dc",
            "loggedin": "1",
            "message": "LOGGED_IN",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let login = client(&server, Duration::from_secs(5))
        .verify(MIRROR, "user@ads.com", "p@ss word")
        .await
        .unwrap();

    assert_eq!(login.email, "user@ads.com");
    assert_eq!(login.cookie, "50eefa48dc");
}

#[tokio::test]
async fn test_verify_wrong_password_is_auth_failure() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        200,
        json!({"email": "user@ads.com", "loggedin": "0", "message": "WRONG_PASSWORD"}),
    )
    .await;

    let result = client(&server, Duration::from_secs(5))
        .verify(MIRROR, "user@ads.com", "bad")
        .await;

    assert!(matches!(result, Err(ClassicError::AuthFailed(_))));
}

#[tokio::test]
async fn test_verify_email_mismatch_is_auth_failure() {
    let server = MockServer::start().await;
    // Fully logged in, but for another account
    mount_login(
        &server,
        200,
        json!({"email": "other@ads.com", "cookie": "abc", "loggedin": "1", "message": "LOGGED_IN"}),
    )
    .await;

    let result = client(&server, Duration::from_secs(5))
        .verify(MIRROR, "user@ads.com", "password")
        .await;

    assert!(matches!(result, Err(ClassicError::AuthFailed(_))));
}

#[tokio::test]
async fn test_verify_logged_in_without_cookie() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        200,
        json!({"email": "user@ads.com", "loggedin": "1", "message": "LOGGED_IN"}),
    )
    .await;

    let result = client(&server, Duration::from_secs(5))
        .verify(MIRROR, "user@ads.com", "password")
        .await;

    assert!(matches!(result, Err(ClassicError::NoCookie)));
}

#[tokio::test]
async fn test_verify_server_error_keeps_diagnostic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(5))
        .verify(MIRROR, "user@ads.com", "password")
        .await;

    match result {
        Err(ClassicError::Upstream(diagnostic)) => {
            assert_eq!(diagnostic.status_code, Some(503));
            assert_eq!(diagnostic.body, "down for maintenance");
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_verify_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"email": "user@ads.com"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_millis(300))
        .verify(MIRROR, "user@ads.com", "password")
        .await;

    assert!(matches!(result, Err(ClassicError::Timeout)));
}

#[tokio::test]
async fn test_libraries_reshaped_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mirror.com/libraries"))
        .and(query_param("cookie", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "libraries": [
                {"name": "First", "desc": "One", "entries": [{"bibcode": "2015MNRAS.446.4239E"}]},
                {"name": "Second", "desc": "Two", "entries": []},
            ]
        })))
        .mount(&server)
        .await;

    let libraries = client(&server, Duration::from_secs(5))
        .libraries(MIRROR, "abc")
        .await
        .unwrap();

    assert_eq!(libraries.len(), 2);
    assert_eq!(libraries[0].name, "First");
    assert_eq!(libraries[0].description, "One");
    assert_eq!(libraries[0].documents, vec!["2015MNRAS.446.4239E"]);
    assert!(libraries[1].documents.is_empty());
}

#[tokio::test]
async fn test_libraries_non_200_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("expired cookie"))
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(5))
        .libraries(MIRROR, "stale")
        .await;

    assert!(matches!(result, Err(ClassicError::Upstream(d)) if d.status_code == Some(403)));
}
