//! Database models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Internal user id supplied by the trusted identity provider
pub type UserId = i64;

/// Stored linkage between an internal user and external identities
///
/// Empty strings mean "not set".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityRecord {
    pub internal_user_id: UserId,
    pub classic_email: String,
    pub classic_mirror: String,
    pub classic_cookie: String,
    pub alt_email: String,
}

impl IdentityRecord {
    /// True when the record can be used against the live legacy system
    pub fn has_classic_session(&self) -> bool {
        !self.classic_mirror.is_empty() && !self.classic_cookie.is_empty()
    }

    pub fn has_alt_account(&self) -> bool {
        !self.alt_email.is_empty()
    }

    /// Email used to name user-facing files: legacy first, then alt
    pub fn primary_email(&self) -> &str {
        if self.classic_email.is_empty() {
            &self.alt_email
        } else {
            &self.classic_email
        }
    }
}

/// Legacy field group, always written together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicLinkage {
    pub email: String,
    pub mirror: String,
    pub cookie: String,
}

impl ClassicLinkage {
    pub fn new(
        email: impl Into<String>,
        mirror: impl Into<String>,
        cookie: impl Into<String>,
    ) -> Result<Self> {
        let linkage = Self {
            email: email.into(),
            mirror: mirror.into(),
            cookie: cookie.into(),
        };

        if !linkage.cookie.is_empty() && linkage.mirror.is_empty() {
            return Err(Error::InvalidRecord(
                "session cookie given without its issuing mirror".to_string(),
            ));
        }

        Ok(linkage)
    }
}
