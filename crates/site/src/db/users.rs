//! User repository for database operations.
//!
//! Covers the `"user"` table and the credential rows in `account`. The
//! `role` and ban columns are folded into [`Role`] and [`BanState`] when
//! rows are read.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use savers_core::{BanState, Email, Role, UserId};

use super::RepositoryError;
use crate::models::{NewUser, User, UserPage, UserQuery};

/// Provider id of password credential accounts.
pub const CREDENTIAL_PROVIDER: &str = "credential";

const USER_COLUMNS: &str = "id, name, email, email_verified, image, username, display_username, \
     role, banned, ban_reason, ban_expires, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` user queries.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserRow {
    pub(super) id: String,
    pub(super) name: String,
    pub(super) email: String,
    pub(super) email_verified: bool,
    pub(super) image: Option<String>,
    pub(super) username: Option<String>,
    pub(super) display_username: Option<String>,
    pub(super) role: String,
    pub(super) banned: bool,
    pub(super) ban_reason: Option<String>,
    pub(super) ban_expires: Option<DateTime<Utc>>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| RepositoryError::DataCorruption(format!("{e} in database")))?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            email_verified: row.email_verified,
            image: row.image,
            username: row.username,
            display_username: row.display_username,
            role,
            ban: BanState::from_columns(row.banned, row.ban_reason, row.ban_expires),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

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

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row is invalid.
    pub async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE id = $1"#);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user and their credential password hash by email.
    ///
    /// Users without a credential account are returned as `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row is invalid.
    pub async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let sql = format!(
            r#"SELECT u.{}, a.password
               FROM "user" u
               JOIN account a ON a.user_id = u.id AND a.provider_id = $2
               WHERE u.email = $1"#,
            USER_COLUMNS.replace(", ", ", u.")
        );
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(email)
            .bind(CREDENTIAL_PROVIDER)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Some(hash) = row.password else {
            return Ok(None);
        };
        Ok(Some((row.user.try_into()?, hash)))
    }

    /// Create a user with a password credential.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        new_user: &NewUser,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = UserId::generate();

        let sql = format!(
            r#"INSERT INTO "user" (id, name, email, role)
               VALUES ($1, $2, $3, $4)
               RETURNING {USER_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&id)
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(new_user.role.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_write(e, "User already exists", "user"))?;

        // Credential account keyed by the user id
        sqlx::query(
            r"
            INSERT INTO account (id, account_id, provider_id, user_id, password)
            VALUES ($1, $2, $3, $2, $4)
            ",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&id)
        .bind(CREDENTIAL_PROVIDER)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }

    /// List users matching an optional name/email search, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row is invalid.
    pub async fn list(&self, query: &UserQuery) -> Result<UserPage, RepositoryError> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let sql = format!(
            r#"SELECT {USER_COLUMNS} FROM "user"
               WHERE $1::text IS NULL OR name ILIKE $1 OR email ILIKE $1
               ORDER BY created_at DESC
               LIMIT $2 OFFSET $3"#
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(pattern.as_deref())
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM "user"
               WHERE $1::text IS NULL OR name ILIKE $1 OR email ILIKE $1"#,
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(UserPage {
            users: rows
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_role(
        &self,
        id: &UserId,
        role: Role,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            r#"UPDATE "user" SET role = $2, updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Persist a ban state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_ban(
        &self,
        id: &UserId,
        ban: &BanState,
    ) -> Result<Option<User>, RepositoryError> {
        let (banned, reason, expires) = ban.to_columns();
        let sql = format!(
            r#"UPDATE "user"
               SET banned = $2, ban_reason = $3, ban_expires = $4, updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(banned)
            .bind(reason)
            .bind(expires)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Replace the credential password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_password(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE account SET password = $3, updated_at = NOW()
            WHERE user_id = $1 AND provider_id = $2
            ",
        )
        .bind(id)
        .bind(CREDENTIAL_PROVIDER)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a user. Sessions and accounts cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Escape `LIKE` wildcards in user-supplied search text.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
