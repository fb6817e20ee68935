//! harbour library - identity federation and library export gateway
//!
//! Verifies legacy ("classic") credentials, keeps the resulting identity
//! linkage in SQLite and serves the user's libraries from the live legacy
//! system or from alt-system snapshots, including annotated BibTeX export.

use axum::Router;
use harbour_common::config::{SnapshotBackend, TomlConfig};
use harbour_common::db::IdentityStore;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod api;
pub mod archive;
pub mod bibtex;
pub mod config;
pub mod error;
pub mod federation;
pub mod services;

use federation::{FederationOrchestrator, FederationPolicy};
use services::{
    ClassicClient, ExportClient, FsObjectStore, HttpObjectStore, ObjectStore, SnapshotIndex,
    SnapshotProvider,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub federation: Arc<FederationOrchestrator>,
    /// Header carrying the trusted internal user id
    pub identity_header: Arc<str>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(federation: FederationOrchestrator, identity_header: &str) -> Self {
        Self {
            federation: Arc::new(federation),
            identity_header: Arc::from(identity_header),
            started_at: Instant::now(),
        }
    }

    /// Wire every collaborator from the bootstrap config
    ///
    /// Loads the snapshot user index once; a failed load is kept as state.
    pub async fn from_config(
        config: &TomlConfig,
        pool: SqlitePool,
        export_api_token: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let classic = ClassicClient::new(
            config.classic.auth_url.clone(),
            config.classic.libraries_url.clone(),
            config.classic.timeout(),
        )?;

        let store: Arc<dyn ObjectStore> = match config.snapshot.backend {
            SnapshotBackend::Fs => Arc::new(FsObjectStore::new(&config.snapshot.location)),
            SnapshotBackend::Http => Arc::new(HttpObjectStore::new(
                config.snapshot.location.clone(),
                config.snapshot.timeout(),
            )?),
        };
        info!("Snapshot store: {}", store.describe());

        let index = SnapshotIndex::load(store.as_ref(), &config.snapshot.users_key).await;
        let snapshots = SnapshotProvider::new(store, Arc::new(index));

        let exporter = ExportClient::new(
            config.export.service_url.clone(),
            export_api_token,
            config.export.timeout(),
        )?;

        let policy = FederationPolicy {
            mirrors: config.classic.mirrors.clone(),
            alt_mirror: config.alt.mirror.clone(),
            export_types: config.export.types.clone(),
        };

        let federation = FederationOrchestrator::new(
            IdentityStore::new(pool),
            classic,
            snapshots,
            exporter,
            policy,
        );

        Ok(Self::new(federation, &config.identity_header))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let federation = Router::new()
        .route("/auth/classic", post(api::verify_classic))
        .route("/auth/alt", post(api::verify_alt))
        .route("/user", get(api::get_user))
        .route("/mirrors", get(api::list_mirrors))
        .route("/libraries/classic/:uid", get(api::classic_libraries))
        .route("/libraries/alt/:uid", get(api::alt_libraries))
        .route("/export/alt/:kind", get(api::export_alt));

    Router::new()
        .merge(federation)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
