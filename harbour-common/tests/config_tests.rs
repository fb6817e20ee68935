//! Tests for bootstrap config resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate HARBOUR_CONFIG are marked with #[serial].

use harbour_common::config::{SnapshotBackend, TomlConfig, CONFIG_ENV_VAR};
use harbour_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_path_takes_priority_over_env() {
    let env_file = write_config("port = 6001\n");
    let cli_file = write_config("port = 6002\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let (config, source) = TomlConfig::resolve(Some(cli_file.path())).unwrap();

    assert_eq!(config.port, 6002);
    assert_eq!(source.as_deref(), Some(cli_file.path()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli() {
    let env_file = write_config(
        r#"
        identity_header = "X-Caller-Id"

        [snapshot]
        backend = "http"
        location = "https://bucket.example.com"
        "#,
    );
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let (config, _) = TomlConfig::resolve(None).unwrap();

    assert_eq!(config.identity_header, "X-Caller-Id");
    assert_eq!(config.snapshot.backend, SnapshotBackend::Http);
    assert_eq!(config.snapshot.location, "https://bucket.example.com");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_named_missing_file_is_an_error() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/harbour/config.toml");

    let result = TomlConfig::resolve(None);
    assert!(matches!(result, Err(Error::Config(_))));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let file = write_config("port = \"not a number\"\n");
    assert!(matches!(TomlConfig::load(file.path()), Err(Error::Config(_))));
}

#[test]
fn test_unknown_snapshot_backend_is_an_error() {
    let file = write_config("[snapshot]\nbackend = \"ftp\"\n");
    assert!(TomlConfig::load(file.path()).is_err());
}

#[test]
fn test_mirror_list_order_preserved() {
    let file = write_config(
        r#"
        [classic]
        mirrors = ["b.example.com", "a.example.com", "c.example.com"]
        "#,
    );

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(
        config.classic.mirrors,
        vec!["b.example.com", "a.example.com", "c.example.com"]
    );
}
