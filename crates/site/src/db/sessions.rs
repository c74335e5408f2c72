//! Session repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use savers_core::{SessionId, UserId};

use super::RepositoryError;
use super::users::UserRow;
use crate::models::{NewSession, Session, User};

const SESSION_COLUMNS: &str =
    "id, user_id, token, expires_at, ip_address, user_agent, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    token: String,
    expires_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: SessionId::new(row.id),
            user_id: UserId::new(row.user_id),
            token: row.token,
            expires_at: row.expires_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Session joined with its owner; user columns are prefixed with `u_`.
#[derive(Debug, sqlx::FromRow)]
struct SessionUserRow {
    #[sqlx(flatten)]
    session: SessionRow,
    #[sqlx(flatten)]
    user: PrefixedUserRow,
}

#[derive(Debug, sqlx::FromRow)]
struct PrefixedUserRow {
    u_id: String,
    u_name: String,
    u_email: String,
    u_email_verified: bool,
    u_image: Option<String>,
    u_username: Option<String>,
    u_display_username: Option<String>,
    u_role: String,
    u_banned: bool,
    u_ban_reason: Option<String>,
    u_ban_expires: Option<DateTime<Utc>>,
    u_created_at: DateTime<Utc>,
    u_updated_at: DateTime<Utc>,
}

impl From<PrefixedUserRow> for UserRow {
    fn from(row: PrefixedUserRow) -> Self {
        Self {
            id: row.u_id,
            name: row.u_name,
            email: row.u_email,
            email_verified: row.u_email_verified,
            image: row.u_image,
            username: row.u_username,
            display_username: row.u_display_username,
            role: row.u_role,
            banned: row.u_banned,
            ban_reason: row.u_ban_reason,
            ban_expires: row.u_ban_expires,
            created_at: row.u_created_at,
            updated_at: row.u_updated_at,
        }
    }
}

/// Repository for session database operations.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ForeignKey` if the user does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new_session: &NewSession) -> Result<Session, RepositoryError> {
        let sql = format!(
            "INSERT INTO session (id, user_id, token, expires_at, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SESSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(SessionId::generate())
            .bind(&new_session.user_id)
            .bind(&new_session.token)
            .bind(new_session.expires_at)
            .bind(new_session.ip_address.as_deref())
            .bind(new_session.user_agent.as_deref())
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "session token collision", "user"))?;

        Ok(row.into())
    }

    /// Get a session and its user by token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the user row is invalid.
    pub async fn get_by_token(
        &self,
        token: &str,
    ) -> Result<Option<(Session, User)>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            r#"
            SELECT s.id, s.user_id, s.token, s.expires_at, s.ip_address, s.user_agent,
                   s.created_at, s.updated_at,
                   u.id AS u_id, u.name AS u_name, u.email AS u_email,
                   u.email_verified AS u_email_verified, u.image AS u_image,
                   u.username AS u_username, u.display_username AS u_display_username,
                   u.role AS u_role, u.banned AS u_banned, u.ban_reason AS u_ban_reason,
                   u.ban_expires AS u_ban_expires, u.created_at AS u_created_at,
                   u.updated_at AS u_updated_at
            FROM session s
            JOIN "user" u ON u.id = s.user_id
            WHERE s.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = User::try_from(UserRow::from(row.user))?;
        Ok(Some((row.session.into(), user)))
    }

    /// List a user's sessions, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, RepositoryError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM session WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    /// Delete a session by token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_token(&self, token: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM session WHERE token = $1")
            .bind(token)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all sessions of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_for_user(&self, user_id: &UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM session WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
