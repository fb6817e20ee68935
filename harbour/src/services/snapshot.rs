//! Alt-system libraries from flat-file snapshots
//!
//! Snapshot files live in an object store. A process-wide index maps alt-system
//! emails to snapshot file keys; it is loaded once at startup and never
//! mutated. A failed load leaves the index in `LoadFailed`, which every
//! snapshot operation reports as "not loaded".

use super::Library;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Object store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    Backend(String),
}

/// Key-addressed blob fetch
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full object stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Snapshot files in a local directory
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        // Keys are relative paths that stay under the root
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::Backend(format!("invalid object key: {}", key)));
        }

        match tokio::fs::read(self.root.join(relative)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::Backend(format!("{}: {}", key, e))),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

/// Snapshot files behind a plain HTTP bucket endpoint (`GET <base>/<key>`)
pub struct HttpObjectStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let encoded_key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!("{}/{}", self.base_url, encoded_key);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", key, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::Backend(format!("{}: status {}", key, status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", key, e)))?;

        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        format!("bucket {}", self.base_url)
    }
}

/// Snapshot provider errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot user index is not loaded")]
    NotLoaded,

    #[error("No snapshot entry for this email")]
    NoLibraries,

    #[error("Snapshot backend error: {0}")]
    Backend(String),
}

/// Email -> snapshot file key index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotIndex {
    Unloaded,
    Loaded(HashMap<String, String>),
    LoadFailed(String),
}

impl SnapshotIndex {
    /// Load the index object; failures are captured in the returned state
    pub async fn load(store: &dyn ObjectStore, key: &str) -> Self {
        let bytes = match store.get(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not load snapshot user index from {}: {}", store.describe(), e);
                return SnapshotIndex::LoadFailed(e.to_string());
            }
        };

        match serde_json::from_slice::<HashMap<String, String>>(&bytes) {
            Ok(entries) => {
                info!("Loaded snapshot user index: {} users", entries.len());
                Self::from_entries(entries)
            }
            Err(e) => {
                warn!("Snapshot user index {} is not valid JSON: {}", key, e);
                SnapshotIndex::LoadFailed(e.to_string())
            }
        }
    }

    /// Build a loaded index; emails are matched case-insensitively
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        SnapshotIndex::Loaded(
            entries
                .into_iter()
                .map(|(email, file)| (normalize_email(&email), file))
                .collect(),
        )
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, SnapshotIndex::Loaded(_))
    }

    /// Snapshot file key for an email
    pub fn lookup(&self, email: &str) -> Result<&str, SnapshotError> {
        match self {
            SnapshotIndex::Loaded(entries) => entries
                .get(&normalize_email(email))
                .map(String::as_str)
                .filter(|key| !key.is_empty())
                .ok_or(SnapshotError::NoLibraries),
            SnapshotIndex::Unloaded | SnapshotIndex::LoadFailed(_) => Err(SnapshotError::NotLoaded),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Per-document annotations in the annotated snapshot file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Annotation {
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub notes: Vec<String>,
}

/// Library from the annotated snapshot file, documents keyed by bibcode
/// in the order the file lists them
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnnotatedLibrary {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub documents: IndexMap<String, Annotation>,
}

/// Accepts `"x"`, `["x", "y"]` or `null`
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Key of the annotated variant of a snapshot file (`x.json` -> `x.tags.json`)
pub fn annotated_key(key: &str) -> String {
    match key.strip_suffix(".json") {
        Some(stem) => format!("{}.tags.json", stem),
        None => format!("{}.tags.json", key),
    }
}

/// Snapshot-backed library provider
#[derive(Clone)]
pub struct SnapshotProvider {
    store: Arc<dyn ObjectStore>,
    index: Arc<SnapshotIndex>,
}

impl SnapshotProvider {
    pub fn new(store: Arc<dyn ObjectStore>, index: Arc<SnapshotIndex>) -> Self {
        Self { store, index }
    }

    pub fn index(&self) -> &SnapshotIndex {
        &self.index
    }

    /// Libraries listed in the user's snapshot file
    pub async fn libraries(&self, alt_email: &str) -> Result<Vec<Library>, SnapshotError> {
        let key = self.index.lookup(alt_email)?;
        self.fetch_json(key).await
    }

    /// Libraries with per-document tags and notes, used for export
    pub async fn annotated_libraries(
        &self,
        alt_email: &str,
    ) -> Result<Vec<AnnotatedLibrary>, SnapshotError> {
        let key = annotated_key(self.index.lookup(alt_email)?);
        self.fetch_json(&key).await
    }

    async fn fetch_json<T>(&self, key: &str) -> Result<T, SnapshotError>
    where
        T: serde::de::DeserializeOwned,
    {
        debug!(key = %key, "Fetching snapshot file");

        let bytes = self
            .store
            .get(key)
            .await
            .map_err(|e| SnapshotError::Backend(e.to_string()))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| SnapshotError::Backend(format!("{} is not a valid snapshot file: {}", key, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_annotated_key() {
        assert_eq!(annotated_key("user1.json"), "user1.tags.json");
        assert_eq!(annotated_key("libs/user1"), "libs/user1.tags.json");
    }

    #[test]
    fn test_unloaded_index_reports_not_loaded() {
        let index = SnapshotIndex::Unloaded;
        assert!(matches!(index.lookup("a@b.com"), Err(SnapshotError::NotLoaded)));

        let failed = SnapshotIndex::LoadFailed("boom".to_string());
        assert!(matches!(failed.lookup("a@b.com"), Err(SnapshotError::NotLoaded)));
    }

    #[test]
    fn test_lookup_ignores_email_case() {
        let index = SnapshotIndex::from_entries(vec![(
            "User@ADS.com".to_string(),
            "user.json".to_string(),
        )]);
        assert_eq!(index.lookup("user@ads.com").unwrap(), "user.json");
        assert!(matches!(index.lookup("other@ads.com"), Err(SnapshotError::NoLibraries)));
    }

    #[test]
    fn test_annotation_accepts_string_and_null() {
        let annotation: Annotation =
            serde_json::from_str(r#"{"tags": "solo", "notes": null}"#).unwrap();
        assert_eq!(annotation.tags, vec!["solo"]);
        assert!(annotation.notes.is_empty());

        let empty: Annotation = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Annotation::default());
    }

    #[test]
    fn test_annotated_documents_keep_file_order() {
        let library: AnnotatedLibrary = serde_json::from_str(
            r#"{"name": "Lib", "documents": {
                "2015MNRAS.446.4239E": {"tags": ["bar"]},
                "2015A&C....10...61E": {},
                "1999ApJ...517..565P": {"notes": "n"}
            }}"#,
        )
        .unwrap();

        let bibcodes: Vec<&str> = library.documents.keys().map(String::as_str).collect();
        assert_eq!(
            bibcodes,
            vec!["2015MNRAS.446.4239E", "2015A&C....10...61E", "1999ApJ...517..565P"]
        );
    }

    #[tokio::test]
    async fn test_fs_store_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        assert!(matches!(store.get("../etc/passwd").await, Err(StoreError::Backend(_))));
        assert!(matches!(store.get("/etc/passwd").await, Err(StoreError::Backend(_))));
        assert!(matches!(store.get("missing.json").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_index_load_failure_is_captured() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("users.json"), b"not json").unwrap();
        let store = FsObjectStore::new(dir.path());

        let index = SnapshotIndex::load(&store, "users.json").await;
        assert!(matches!(index, SnapshotIndex::LoadFailed(_)));

        let missing = SnapshotIndex::load(&store, "absent.json").await;
        assert!(!missing.is_loaded());
    }

    #[tokio::test]
    async fn test_provider_reads_snapshot_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("user.json"),
            r#"[{"name": "Lib", "description": "Desc", "documents": ["2015MNRAS.446.4239E"]}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("user.tags.json"), "[{\"name\": \"Lib\"").unwrap();

        let index = SnapshotIndex::from_entries(vec![(
            "user@ads.com".to_string(),
            "user.json".to_string(),
        )]);
        let provider = SnapshotProvider::new(Arc::new(FsObjectStore::new(dir.path())), Arc::new(index));

        let libraries = provider.libraries("user@ads.com").await.unwrap();
        assert_eq!(libraries[0].documents, vec!["2015MNRAS.446.4239E"]);

        // Truncated annotated file
        assert!(matches!(
            provider.annotated_libraries("user@ads.com").await,
            Err(SnapshotError::Backend(_))
        ));
    }
}
