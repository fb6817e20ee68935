//! Runtime secret resolution for harbour
//!
//! Provides two-tier resolution with ENV → TOML priority for values that should
//! not have to live in a config file.

use harbour_common::config::ExportConfig;
use tracing::{info, warn};

/// Environment variable holding the export service API token
pub const EXPORT_TOKEN_ENV_VAR: &str = "HARBOUR_EXPORT_API_TOKEN";

/// Resolve the export service API token
///
/// **Priority:** ENV → TOML. `None` means requests are sent without
/// an `Authorization` header.
pub fn resolve_export_api_token(export: &ExportConfig) -> Option<String> {
    let env_token = std::env::var(EXPORT_TOKEN_ENV_VAR)
        .ok()
        .filter(|t| is_valid_token(t));
    let toml_token = Some(export.api_token.clone()).filter(|t| is_valid_token(t));

    if env_token.is_some() && toml_token.is_some() {
        warn!(
            "Export API token found in environment and TOML config. Using environment (highest priority)."
        );
    }

    if let Some(token) = env_token {
        info!("Export API token loaded from environment variable");
        return Some(token);
    }

    if let Some(token) = toml_token {
        info!("Export API token loaded from TOML config");
        return Some(token);
    }

    warn!("No export API token configured; export requests will be unauthenticated");
    None
}

/// Validate token (non-empty, non-whitespace)
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn export_config(token: &str) -> ExportConfig {
        ExportConfig {
            api_token: token.to_string(),
            ..ExportConfig::default()
        }
    }

    #[test]
    #[serial]
    fn test_env_token_takes_priority() {
        std::env::set_var(EXPORT_TOKEN_ENV_VAR, "from-env");
        assert_eq!(
            resolve_export_api_token(&export_config("from-toml")).as_deref(),
            Some("from-env")
        );
        std::env::remove_var(EXPORT_TOKEN_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_toml_token_used_without_env() {
        std::env::remove_var(EXPORT_TOKEN_ENV_VAR);
        assert_eq!(
            resolve_export_api_token(&export_config("from-toml")).as_deref(),
            Some("from-toml")
        );
    }

    #[test]
    #[serial]
    fn test_blank_tokens_ignored() {
        std::env::set_var(EXPORT_TOKEN_ENV_VAR, "   ");
        assert!(resolve_export_api_token(&export_config("")).is_none());
        std::env::remove_var(EXPORT_TOKEN_ENV_VAR);
    }
}
