//! Outbound collaborators: the legacy system, the snapshot store and the
//! export service

pub mod classic;
pub mod export;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use classic::{ClassicClient, ClassicError, ClassicLogin};
pub use export::{ExportClient, ExportError};
pub use snapshot::{
    AnnotatedLibrary, Annotation, FsObjectStore, HttpObjectStore, ObjectStore, SnapshotError,
    SnapshotIndex, SnapshotProvider, StoreError,
};

/// Library shape shared by the live and snapshot providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Bibliographic codes, in source order
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Substitute `{key}` placeholders in a URL template
pub(crate) fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |url, (key, value)| {
        url.replace(&format!("{{{}}}", key), value)
    })
}
