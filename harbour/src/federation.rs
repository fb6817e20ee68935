//! Federation orchestrator
//!
//! Coordinates the identity store, the legacy client, the snapshot provider and
//! the export pipeline. Every collaborator failure is translated into one
//! `FederationError` here; nothing below this layer reaches a handler raw.
//!
//! Verification runs `Received → MirrorValidated → LegacyVerified →
//! IdentityPersisted → Responded`; any step may reject.

use crate::archive::{archive_filename, ArchiveBuilder};
use crate::bibtex;
use crate::error::{FederationError, FederationResult};
use crate::services::{
    ClassicClient, ClassicError, ClassicLogin, ExportClient, ExportError, Library, SnapshotError,
    SnapshotProvider,
};
use harbour_common::db::{ClassicLinkage, IdentityRecord, IdentityStore, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Which backend a library listing targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibrarySystem {
    Classic,
    Alt,
}

/// Legacy verification request body
#[derive(Debug, Default, Deserialize)]
pub struct ClassicCredentials {
    pub classic_email: Option<String>,
    pub classic_password: Option<String>,
    pub classic_mirror: Option<String>,
}

/// Alt-system verification request body
#[derive(Debug, Default, Deserialize)]
pub struct AltCredentials {
    pub alt_email: Option<String>,
    pub alt_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassicVerified {
    pub classic_email: String,
    pub classic_mirror: String,
    pub classic_authed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AltVerified {
    pub alt_email: String,
    pub alt_authed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassicIdentity {
    pub classic_email: String,
    pub classic_mirror: String,
}

/// Finished export archive
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Static policy fixed at startup
#[derive(Debug, Clone)]
pub struct FederationPolicy {
    /// Mirror allow-list, in published order
    pub mirrors: Vec<String>,
    /// Mirror used for alt-system credential checks
    pub alt_mirror: String,
    pub export_types: Vec<String>,
}

pub struct FederationOrchestrator {
    store: IdentityStore,
    classic: ClassicClient,
    snapshots: SnapshotProvider,
    exporter: ExportClient,
    policy: FederationPolicy,
}

impl FederationOrchestrator {
    pub fn new(
        store: IdentityStore,
        classic: ClassicClient,
        snapshots: SnapshotProvider,
        exporter: ExportClient,
        policy: FederationPolicy,
    ) -> Self {
        Self {
            store,
            classic,
            snapshots,
            exporter,
            policy,
        }
    }

    pub fn snapshots(&self) -> &SnapshotProvider {
        &self.snapshots
    }

    /// Verify legacy credentials and persist the legacy field group
    pub async fn verify_classic(
        &self,
        caller: Option<UserId>,
        credentials: ClassicCredentials,
    ) -> FederationResult<ClassicVerified> {
        let (email, password, mirror) = match (
            required(credentials.classic_email),
            required(credentials.classic_password),
            required(credentials.classic_mirror),
        ) {
            (Some(email), Some(password), Some(mirror)) => (email, password, mirror),
            _ => return Err(FederationError::DataMalformed),
        };

        if !self.policy.mirrors.iter().any(|m| *m == mirror) {
            warn!(mirror = %mirror, "Rejected verification for mirror outside allow-list");
            return Err(FederationError::BadMirror(mirror));
        }

        let login = self
            .classic
            .verify(&mirror, &email, &password)
            .await
            .map_err(|e| classic_failure(&mirror, e))?;

        let user_id = caller.ok_or(FederationError::MissingIdentity)?;
        let linkage = ClassicLinkage::new(login.email, mirror, login.cookie)?;
        let upserted = self.store.upsert_classic(user_id, &linkage).await?;

        info!(
            user_id,
            created = upserted.created,
            mirror = %linkage.mirror,
            cookie = %mask(&linkage.cookie),
            "Classic identity verified"
        );

        Ok(ClassicVerified {
            classic_email: upserted.record.classic_email,
            classic_mirror: upserted.record.classic_mirror,
            classic_authed: true,
        })
    }

    /// Verify alt-system credentials and persist the alt-system email
    pub async fn verify_alt(
        &self,
        caller: Option<UserId>,
        credentials: AltCredentials,
    ) -> FederationResult<AltVerified> {
        let (email, password) = match (
            required(credentials.alt_email),
            required(credentials.alt_password),
        ) {
            (Some(email), Some(password)) => (email, password),
            _ => return Err(FederationError::DataMalformed),
        };

        let mirror = &self.policy.alt_mirror;
        let ClassicLogin { email, .. } = self
            .classic
            .verify(mirror, &email, &password)
            .await
            .map_err(|e| classic_failure(mirror, e))?;

        let user_id = caller.ok_or(FederationError::MissingIdentity)?;
        let upserted = self.store.upsert_alt(user_id, &email).await?;

        info!(user_id, created = upserted.created, "Alt-system identity verified");

        Ok(AltVerified {
            alt_email: upserted.record.alt_email,
            alt_authed: true,
        })
    }

    /// Stored legacy identity of the caller
    pub async fn get_identity(&self, caller: Option<UserId>) -> FederationResult<ClassicIdentity> {
        let user_id = caller.ok_or(FederationError::MissingIdentity)?;

        match self.store.find(user_id).await? {
            Some(record) if !record.classic_email.is_empty() => Ok(ClassicIdentity {
                classic_email: record.classic_email,
                classic_mirror: record.classic_mirror,
            }),
            _ => Err(FederationError::NoClassicAccount),
        }
    }

    pub fn allowed_mirrors(&self) -> &[String] {
        &self.policy.mirrors
    }

    /// Libraries of a user from the live legacy system or the snapshots
    pub async fn list_libraries(
        &self,
        system: LibrarySystem,
        user_id: UserId,
    ) -> FederationResult<Vec<Library>> {
        match system {
            LibrarySystem::Classic => {
                let record = self
                    .store
                    .find(user_id)
                    .await?
                    .filter(IdentityRecord::has_classic_session)
                    .ok_or(FederationError::NoClassicAccount)?;

                self.classic
                    .libraries(&record.classic_mirror, &record.classic_cookie)
                    .await
                    .map_err(|e| classic_failure(&record.classic_mirror, e))
            }
            LibrarySystem::Alt => {
                let record = self.alt_record(user_id).await?;
                self.snapshots
                    .libraries(&record.alt_email)
                    .await
                    .map_err(snapshot_failure)
            }
        }
    }

    /// Build the annotated BibTeX archive of the caller's alt-system libraries
    ///
    /// Any failure aborts the whole export; no partial archive is produced.
    pub async fn export(&self, kind: &str, caller: Option<UserId>) -> FederationResult<ExportArchive> {
        if !self.policy.export_types.iter().any(|t| t == kind) {
            return Err(FederationError::UnsupportedExportType(kind.to_string()));
        }

        let user_id = caller.ok_or(FederationError::MissingIdentity)?;
        let record = self.alt_record(user_id).await?;
        let libraries = self
            .snapshots
            .annotated_libraries(&record.alt_email)
            .await
            .map_err(snapshot_failure)?;

        let mut archive = ArchiveBuilder::new();
        for library in &libraries {
            let bibcodes: Vec<String> = library.documents.keys().cloned().collect();

            let text = if bibcodes.is_empty() {
                String::new()
            } else {
                self.exporter.bibtex(&bibcodes).await.map_err(export_failure)?
            };

            let annotated = bibtex::annotate(&text, |bibcode| {
                library
                    .documents
                    .get(bibcode)
                    .map(|a| (a.tags.clone(), a.notes.clone()))
            })
            .map_err(|e| {
                warn!(library = %library.name, "Export text could not be parsed: {}", e);
                FederationError::ExportServiceFailed {
                    reason: e.to_string(),
                    upstream: None,
                }
            })?;

            let entry = archive
                .add_library(&library.name, &annotated)
                .map_err(|e| FederationError::Archive(e.to_string()))?;
            debug!(entry = %entry, documents = bibcodes.len(), "Added library to export archive");
        }

        let bytes = archive
            .finish()
            .map_err(|e| FederationError::Archive(e.to_string()))?;

        info!(user_id, libraries = libraries.len(), kind = %kind, "Export archive built");

        Ok(ExportArchive {
            filename: archive_filename(record.primary_email(), kind),
            bytes,
        })
    }

    /// Record with an alt-system email; the snapshot index must be usable
    async fn alt_record(&self, user_id: UserId) -> FederationResult<IdentityRecord> {
        if !self.snapshots.index().is_loaded() {
            return Err(FederationError::NotLoaded);
        }

        self.store
            .find(user_id)
            .await?
            .filter(IdentityRecord::has_alt_account)
            .ok_or(FederationError::NoAltAccount)
    }
}

/// Present and non-blank
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn classic_failure(mirror: &str, err: ClassicError) -> FederationError {
    match err {
        ClassicError::Timeout => {
            warn!(mirror = %mirror, "Classic end point timed out");
            FederationError::ClassicTimeout
        }
        ClassicError::Upstream(diagnostic) => {
            warn!(mirror = %mirror, status = ?diagnostic.status_code, "Unknown error from classic end point");
            FederationError::UnknownUpstream(diagnostic)
        }
        ClassicError::AuthFailed(reason) => {
            warn!(mirror = %mirror, "Classic authentication failed: {}", reason);
            FederationError::AuthFailed
        }
        ClassicError::NoCookie => {
            warn!(mirror = %mirror, "Classic login returned no cookie");
            FederationError::NoCookie
        }
    }
}

fn snapshot_failure(err: SnapshotError) -> FederationError {
    match err {
        SnapshotError::NotLoaded => FederationError::NotLoaded,
        SnapshotError::NoLibraries => FederationError::NoLibraries,
        SnapshotError::Backend(reason) => {
            tracing::error!("Snapshot backend failure: {}", reason);
            FederationError::SnapshotBackend(reason)
        }
    }
}

fn export_failure(err: ExportError) -> FederationError {
    match err {
        ExportError::Timeout => FederationError::UpstreamTimeout("Export service"),
        ExportError::Failed(diagnostic) => {
            tracing::error!(status = ?diagnostic.status_code, "Unknown error from export service");
            FederationError::ExportServiceFailed {
                reason: "export service returned an unexpected response".to_string(),
                upstream: Some(diagnostic),
            }
        }
    }
}

/// Secrets are logged as one `*` per character
fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}
