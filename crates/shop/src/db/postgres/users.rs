//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{Email, PermissionSet, UserId};

use crate::db::RepositoryError;
use crate::models::{NewUser, User};

/// Column list for `shop.user` queries that return a [`User`].
const USER_COLUMNS: &str = "id, name, email, permissions, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    permissions: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let permissions = PermissionSet::parse_all(&row.permissions).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid permission in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            permissions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let query = format!(
            "INSERT INTO shop.\"user\" (name, email, password_hash, permissions)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(&user.name)
            .bind(user.email.as_str())
            .bind(&user.password_hash)
            .bind(user.permissions.to_strings())
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("email already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        row.try_into()
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM shop.\"user\" WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM shop.\"user\" WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Get a user and their password hash for sign-in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let query = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.\"user\" WHERE email = $1"
        );
        let Some(row) = sqlx::query_as::<_, UserWithHashRow>(&query)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some((row.user.try_into()?, row.password_hash)))
    }

    /// List every user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM shop.\"user\" ORDER BY id");
        sqlx::query_as::<_, UserRow>(&query)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Replace a user's permissions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_permissions(
        &self,
        id: UserId,
        permissions: &PermissionSet,
    ) -> Result<User, RepositoryError> {
        let query = format!(
            "UPDATE shop.\"user\"
             SET permissions = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .bind(permissions.to_strings())
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("user"))?
            .try_into()
    }

    /// Store a password reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.\"user\"
             SET reset_token = $2, reset_token_expires_at = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("user"));
        }
        Ok(())
    }

    /// Swap the password hash for a live reset token in a single statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let query = format!(
            "UPDATE shop.\"user\"
             SET password_hash = $3,
                 reset_token = NULL,
                 reset_token_expires_at = NULL,
                 updated_at = $2
             WHERE reset_token = $1 AND reset_token_expires_at >= $2
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(token)
            .bind(now)
            .bind(password_hash)
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}
