//! User role and ban state.
//!
//! The persisted schema stores these as loose columns (`role` text, `banned`
//! flag, `ban_reason`, `ban_expires`). In memory they are closed types so
//! combinations like "not banned but with a ban reason" cannot exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason recorded when a ban is issued without one.
pub const DEFAULT_BAN_REASON: &str = "No reason";

/// Access role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular customer account.
    #[default]
    User,
    /// Full access to the admin dashboard.
    Admin,
}

impl Role {
    /// Column value for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Whether this role may use the admin dashboard.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// Whether a user is currently allowed to sign in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum BanState {
    /// No ban on record.
    #[default]
    Active,
    /// Banned, optionally until `expires`.
    Banned {
        reason: String,
        expires: Option<DateTime<Utc>>,
    },
}

impl BanState {
    /// Build a ban with a default reason when none is given.
    #[must_use]
    pub fn banned(reason: Option<&str>, expires: Option<DateTime<Utc>>) -> Self {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_BAN_REASON)
            .to_owned();
        Self::Banned { reason, expires }
    }

    /// Fold the persisted columns into a ban state.
    ///
    /// A `false` flag wins over any leftover reason or expiry.
    #[must_use]
    pub fn from_columns(
        banned: bool,
        reason: Option<String>,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        if banned {
            Self::banned(reason.as_deref(), expires)
        } else {
            Self::Active
        }
    }

    /// Columns to persist: `(banned, ban_reason, ban_expires)`.
    #[must_use]
    pub fn to_columns(&self) -> (bool, Option<&str>, Option<DateTime<Utc>>) {
        match self {
            Self::Active => (false, None, None),
            Self::Banned { reason, expires } => (true, Some(reason.as_str()), *expires),
        }
    }

    /// Whether the ban blocks access at `now`.
    ///
    /// A ban whose expiry has passed no longer applies.
    #[must_use]
    pub fn is_banned_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Active => false,
            Self::Banned { expires, .. } => expires.is_none_or(|at| at > now),
        }
    }

    /// Whether a ban is on record but has expired at `now`.
    #[must_use]
    pub fn has_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self, Self::Banned { expires: Some(at), .. } if *at <= now)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_role_round_trips_through_column_value() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_unbanned_columns_drop_stale_reason() {
        let state = BanState::from_columns(false, Some("spam".into()), None);
        assert_eq!(state, BanState::Active);
        assert_eq!(state.to_columns(), (false, None, None));
    }

    #[test]
    fn test_ban_without_reason_gets_default() {
        let state = BanState::from_columns(true, None, None);
        assert_eq!(
            state,
            BanState::Banned {
                reason: DEFAULT_BAN_REASON.to_owned(),
                expires: None
            }
        );
    }

    #[test]
    fn test_ban_expiry() {
        let now = Utc::now();
        let permanent = BanState::banned(Some("fraud"), None);
        assert!(permanent.is_banned_at(now));
        assert!(!permanent.has_lapsed_at(now));

        let lapsed = BanState::banned(None, Some(now - Duration::minutes(1)));
        assert!(!lapsed.is_banned_at(now));
        assert!(lapsed.has_lapsed_at(now));

        let pending = BanState::banned(None, Some(now + Duration::hours(1)));
        assert!(pending.is_banned_at(now));
    }
}
