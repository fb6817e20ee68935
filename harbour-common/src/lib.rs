//! # Harbour Common Library
//!
//! Shared code for the harbour gateway:
//! - Bootstrap configuration (TOML) and its resolution order
//! - SQLite initialization
//! - The identity record model and its store

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
