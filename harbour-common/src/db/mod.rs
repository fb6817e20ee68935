//! Identity storage

pub mod init;
pub mod models;
pub mod users;

pub use init::*;
pub use models::*;
pub use users::*;
