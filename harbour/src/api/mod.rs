//! HTTP API handlers for harbour

pub mod buildinfo;
pub mod export;
pub mod health;
pub mod identity;
pub mod libraries;
pub mod user;
pub mod verify;

pub use buildinfo::BuildInfo;
pub use export::export_alt;
pub use health::health_routes;
pub use identity::Caller;
pub use libraries::{alt_libraries, classic_libraries};
pub use user::{get_user, list_mirrors};
pub use verify::{verify_alt, verify_classic};
