//! Bootstrap configuration and config file resolution
//!
//! All settings are read once at startup and are read-only for the lifetime
//! of the process. Resolution order for the config file:
//! 1. Command-line argument (highest priority)
//! 2. `HARBOUR_CONFIG` environment variable
//! 3. User config file (`~/.config/harbour/config.toml`)
//! 4. System config file (`/etc/harbour/config.toml`, Linux only)
//! 5. Compiled defaults (fallback, logged as a warning)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "HARBOUR_CONFIG";

/// Mirrors accepted for legacy verification, in published order
pub const DEFAULT_CLASSIC_MIRRORS: [&str; 17] = [
    "adstrio.cfa.harvard.edu",
    "adsnun.cfa.harvard.edu",
    "adsate.cfa.harvard.edu",
    "astrobib.u-strasbg.fr",
    "ads.nao.ac.jp",
    "ads.astro.puc.cl",
    "esoads.eso.org",
    "ukads.nottingham.ac.uk",
    "ads.iucaa.ernet.in",
    "ads.inasan.ru",
    "ads.bao.ac.cn",
    "ads.mao.kiev.ua",
    "ads.ari.uni-heidelberg.de",
    "ads.arsip.lipi.go.id",
    "ads.on.br",
    "saaoads.chpc.ac.za",
    "adsabs.harvard.edu",
];

/// Bootstrap configuration loaded from TOML
///
/// Every field has a compiled default, so a partial file only overrides
/// the keys it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to the SQLite database holding identity records
    pub database_path: PathBuf,
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Trusted header carrying the caller's internal user id
    pub identity_header: String,
    pub logging: LoggingConfig,
    pub classic: ClassicConfig,
    pub alt: AltConfig,
    pub snapshot: SnapshotConfig,
    pub export: ExportConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Legacy ("classic") system endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassicConfig {
    /// Verification URL template with `{mirror}`, `{email}` and `{password}`
    pub auth_url: String,
    /// Library listing URL template with `{mirror}` and `{cookie}`
    pub libraries_url: String,
    /// Mirror allow-list
    pub mirrors: Vec<String>,
    pub timeout_secs: u64,
}

/// Alt system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AltConfig {
    /// Mirror used to verify alt-system credentials
    pub mirror: String,
}

/// Where snapshot files are fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotBackend {
    /// Local directory
    Fs,
    /// Plain HTTP GET against a bucket URL
    Http,
}

/// Snapshot store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub backend: SnapshotBackend,
    /// Directory (fs) or base URL (http)
    pub location: String,
    /// Key of the email -> file index
    pub users_key: String,
    pub timeout_secs: u64,
}

/// Export service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub service_url: String,
    /// Bearer token for the export service (empty = no Authorization header)
    pub api_token: String,
    /// Export kinds accepted by the export endpoint
    pub types: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("harbour.db"),
            bind_address: "127.0.0.1".to_string(),
            port: 5730,
            identity_header: "X-Api-Uid".to_string(),
            logging: LoggingConfig::default(),
            classic: ClassicConfig::default(),
            alt: AltConfig::default(),
            snapshot: SnapshotConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ClassicConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://{mirror}/cgi-bin/maint/manage?man_cmd=elogin&man_email={email}&man_passwd={password}".to_string(),
            libraries_url: "http://{mirror}/cgi-bin/maint/libraries?cookie={cookie}".to_string(),
            mirrors: DEFAULT_CLASSIC_MIRRORS.iter().map(|m| m.to_string()).collect(),
            timeout_secs: 30,
        }
    }
}

impl Default for AltConfig {
    fn default() -> Self {
        Self {
            mirror: "adsabs.harvard.edu".to_string(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            backend: SnapshotBackend::Fs,
            location: default_data_dir().join("snapshots").display().to_string(),
            users_key: "users.json".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:5000/v1/export/bibtex".to_string(),
            api_token: String::new(),
            types: vec!["zotero".to_string()],
            timeout_secs: 60,
        }
    }
}

impl ClassicConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SnapshotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ExportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
}

impl TomlConfig {
    /// Parse a config file. Unreadable or invalid files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Resolve and load the bootstrap configuration
    ///
    /// An explicitly named file (CLI or environment) must exist. Without one,
    /// the default locations are tried and compiled defaults are used when
    /// none exists.
    pub fn resolve(cli_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_path {
            info!("Loading config from {} (command line)", path.display());
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                let path = PathBuf::from(path);
                info!("Loading config from {} ({})", path.display(), CONFIG_ENV_VAR);
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        // Priority 3/4: Default file locations
        if let Some(path) = find_config_file() {
            info!("Loading config from {}", path.display());
            return Ok((Self::load(&path)?, Some(path)));
        }

        // Priority 5: Compiled defaults
        warn!("No config file found, using compiled defaults");
        Ok((Self::default(), None))
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.database_path {
            self.database_path = path;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
    }

    /// Reject configurations the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.classic.auth_url.contains("{mirror}") {
            return Err(Error::Config(
                "classic.auth_url must contain a {mirror} placeholder".to_string(),
            ));
        }
        if !self.classic.libraries_url.contains("{cookie}") {
            return Err(Error::Config(
                "classic.libraries_url must contain a {cookie} placeholder".to_string(),
            ));
        }
        if self.identity_header.trim().is_empty() {
            return Err(Error::Config("identity_header must not be empty".to_string()));
        }
        if self.classic.mirrors.iter().any(|m| m.trim().is_empty()) {
            return Err(Error::Config("classic.mirrors contains an empty entry".to_string()));
        }
        if self.snapshot.users_key.trim().is_empty() {
            return Err(Error::Config("snapshot.users_key must not be empty".to_string()));
        }
        Ok(())
    }
}

/// First existing config file in the platform's default locations
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("harbour").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/harbour/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent data directory for the database and local snapshots
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("harbour"))
        .unwrap_or_else(|| PathBuf::from("./harbour_data"))
}
