//! Identity store: point lookup and field-group upserts by internal user id
//!
//! Each upsert is a single autocommit `INSERT .. ON CONFLICT DO UPDATE`
//! statement, so a record is never visible with half of a field group written
//! and writers only wait on the SQLite busy timeout. Concurrent
//! writers for the same user are not serialized here; the last commit wins.

use crate::db::models::{ClassicLinkage, IdentityRecord, UserId};
use crate::Result;
use sqlx::SqlitePool;

const RETURNING_COLUMNS: &str =
    "RETURNING internal_user_id, classic_email, classic_mirror, classic_cookie, alt_email, revision";

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    /// Record as committed
    pub record: IdentityRecord,
    /// False when an existing record was updated in place
    pub created: bool,
}

/// SQLite-backed identity store
#[derive(Clone)]
pub struct IdentityStore {
    pool: SqlitePool,
}

impl IdentityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load the record for a user, if any
    pub async fn find(&self, user_id: UserId) -> Result<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT internal_user_id, classic_email, classic_mirror, classic_cookie, alt_email
            FROM users
            WHERE internal_user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Create the record or overwrite its legacy field group
    ///
    /// The alt-system email of an existing record is left untouched.
    pub async fn upsert_classic(&self, user_id: UserId, linkage: &ClassicLinkage) -> Result<Upserted> {
        let sql = format!(
            r#"
            INSERT INTO users (internal_user_id, classic_email, classic_mirror, classic_cookie)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(internal_user_id) DO UPDATE SET
                classic_email = excluded.classic_email,
                classic_mirror = excluded.classic_mirror,
                classic_cookie = excluded.classic_cookie,
                revision = users.revision + 1,
                updated_at = CURRENT_TIMESTAMP
            {}
            "#,
            RETURNING_COLUMNS
        );

        let row = sqlx::query_as::<_, UpsertRow>(&sql)
            .bind(user_id)
            .bind(&linkage.email)
            .bind(&linkage.mirror)
            .bind(&linkage.cookie)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    /// Create the record or overwrite its alt-system email
    ///
    /// Legacy fields of an existing record are left untouched.
    pub async fn upsert_alt(&self, user_id: UserId, alt_email: &str) -> Result<Upserted> {
        let sql = format!(
            r#"
            INSERT INTO users (internal_user_id, alt_email)
            VALUES (?, ?)
            ON CONFLICT(internal_user_id) DO UPDATE SET
                alt_email = excluded.alt_email,
                revision = users.revision + 1,
                updated_at = CURRENT_TIMESTAMP
            {}
            "#,
            RETURNING_COLUMNS
        );

        let row = sqlx::query_as::<_, UpsertRow>(&sql)
            .bind(user_id)
            .bind(alt_email)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }
}

/// Row returned by an upsert; revision 0 means the insert path ran
#[derive(sqlx::FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    record: IdentityRecord,
    revision: i64,
}

impl From<UpsertRow> for Upserted {
    fn from(row: UpsertRow) -> Self {
        Upserted {
            record: row.record,
            created: row.revision == 0,
        }
    }
}
