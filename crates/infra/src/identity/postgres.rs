//! Postgres-backed identity store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `ConstraintViolation` | Username (or id) already present |
//! | Database (other) | Any other | `Unavailable` | Other database errors |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` | Connection failures |
//!
//! ## Uniqueness
//!
//! `identities_username_key` is a unique index on `username`. It, not the
//! caller's pre-check, decides which of two concurrent registrations wins.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

use bookstore_auth::{CredentialHash, Identity, IdentityStore, NewIdentity, Role, StoreError};
use bookstore_core::UserId;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    id              UUID PRIMARY KEY,
    username        TEXT NOT NULL,
    credential_hash TEXT NOT NULL,
    role            TEXT NOT NULL DEFAULT 'User',
    created_at      TIMESTAMPTZ NULL,
    updated_at      TIMESTAMPTZ NULL
)
"#;

const CREATE_USERNAME_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS identities_username_key ON identities (username)";

/// Postgres identity store.
///
/// `Send + Sync`; the SQLx pool handles connection sharing.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: PgPool,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, verify the connection, and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        sqlx::query(CREATE_USERNAME_INDEX)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Change an identity's role. Returns `false` when the id is unknown.
    #[instrument(skip(self))]
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE identities SET role = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(role.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_role", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, credential_hash, role, created_at, updated_at
            FROM identities
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_username", e))?;

        row.map(|r| row_to_identity(&r)).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, credential_hash, role, created_at, updated_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.map(|r| row_to_identity(&r)).transpose()
    }

    #[instrument(skip(self, identity), fields(username = %identity.username))]
    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError> {
        // TIMESTAMPTZ keeps microseconds; match it so reads equal the returned value.
        let identity = identity.into_identity(Utc::now().trunc_subsecs(6));

        sqlx::query(
            r#"
            INSERT INTO identities (id, username, credential_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(&identity.username)
        .bind(identity.credential_hash.as_str())
        .bind(identity.role.as_str())
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        Ok(identity)
    }
}

fn row_to_identity(row: &PgRow) -> Result<Identity, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Unavailable(format!("failed to decode identity row: {e}"));

    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let username: String = row.try_get("username").map_err(corrupt)?;
    let credential_hash: String = row.try_get("credential_hash").map_err(corrupt)?;
    let role: String = row.try_get("role").map_err(corrupt)?;
    let created_at: Option<DateTime<Utc>> = row.try_get("created_at").map_err(corrupt)?;
    let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at").map_err(corrupt)?;

    let role: Role = role
        .parse()
        .map_err(|e| StoreError::Unavailable(format!("failed to decode identity row: {e}")))?;

    Ok(Identity {
        id: UserId::from_uuid(id),
        username,
        credential_hash: CredentialHash::from_stored(credential_hash),
        role,
        created_at,
        updated_at,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation
                Some("23505") => StoreError::ConstraintViolation(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
