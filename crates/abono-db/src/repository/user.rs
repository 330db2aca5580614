//! # User Directory
//!
//! Customers and administrators. Authentication lives elsewhere; the ledger
//! only needs to know that a user exists, has the right role, and whether a
//! customer is still active.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::Tx;
use abono_core::{NewUser, User, UserRole, UserStatus};

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, identification, role, status, created_at";

/// Repository for user lookups.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    /// Creates a new UserDirectory.
    pub fn new(pool: SqlitePool) -> Self {
        UserDirectory { pool }
    }

    /// Gets a customer by ID.
    ///
    /// A user with another role is reported as not found.
    pub async fn find_customer_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND role = ?2"
        ))
        .bind(id)
        .bind(UserRole::Customer)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets an administrator by username.
    pub async fn find_administrator_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1 AND role = ?2"
        ))
        .bind(username.trim())
        .bind(UserRole::Administrator)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Inserts a user.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username taken
    pub async fn insert(&self, input: &NewUser) -> DbResult<User> {
        debug!(username = %input.username, role = ?input.role, "Inserting user");

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: input.username.trim().to_string(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            identification: input.identification.trim().to_string(),
            role: input.role,
            status: input.status,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, first_name, last_name, identification,
                role, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.identification)
        .bind(user.role)
        .bind(user.status)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: user.username.clone(),
            },
            other => other,
        })?;

        Ok(user)
    }

    /// Activates or deactivates a user.
    pub async fn set_status(&self, id: &str, status: UserStatus) -> DbResult<()> {
        debug!(id = %id, status = ?status, "Setting user status");

        let result = sqlx::query("UPDATE users SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Customer lookup against the transaction's snapshot.
    pub async fn customer(tx: &mut Tx<'_>, id: &str) -> DbResult<User> {
        Self::with_role(tx, id, UserRole::Customer, "Customer").await
    }

    /// Administrator lookup against the transaction's snapshot.
    pub async fn administrator(tx: &mut Tx<'_>, id: &str) -> DbResult<User> {
        Self::with_role(tx, id, UserRole::Administrator, "Administrator").await
    }

    async fn with_role(tx: &mut Tx<'_>, id: &str, role: UserRole, entity: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND role = ?2"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DbError::not_found(entity, id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
