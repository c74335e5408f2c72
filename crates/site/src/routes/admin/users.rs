//! User management route handlers.
//!
//! Every write redirects back with a flash message; the acting admin can
//! never ban, remove, or demote themselves.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use savers_core::{BanState, UserId};

use super::log_failure;
use crate::actions::users::parse_role;
use crate::actions::{ActionError, UserForm};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::{Session, User, UserQuery, ViewerView};
use crate::routes::redirect_with;
use crate::state::AppState;

const LIST_PATH: &str = "/admin/users";
const DATE_FORMAT: &str = "%b %-d, %Y";
const DATETIME_FORMAT: &str = "%b %-d, %Y %H:%M UTC";

/// Search and paging parameters of the user list.
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// User row for the admin list.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_admin: bool,
    pub banned: bool,
    pub ban_label: String,
    pub joined: String,
    pub is_self: bool,
}

fn ban_label(ban: &BanState) -> String {
    match ban {
        BanState::Active => "Active".to_owned(),
        BanState::Banned {
            reason,
            expires: Some(until),
        } => format!("Banned until {}: {reason}", until.format(DATETIME_FORMAT)),
        BanState::Banned {
            reason,
            expires: None,
        } => format!("Banned: {reason}"),
    }
}

impl UserRow {
    fn new(user: &User, actor: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.to_string(),
            role: user.role.to_string(),
            is_admin: user.is_admin(),
            banned: matches!(user.ban, BanState::Banned { .. }),
            ban_label: ban_label(&user.ban),
            joined: user.created_at.format(DATE_FORMAT).to_string(),
            is_self: user.id == actor.id,
        }
    }
}

/// Session row on the user detail page.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub ip_address: String,
    pub user_agent: String,
    pub created: String,
    pub expires: String,
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        Self {
            ip_address: session.ip_address.clone().unwrap_or_else(|| "-".to_owned()),
            user_agent: session.user_agent.clone().unwrap_or_else(|| "-".to_owned()),
            created: session.created_at.format(DATETIME_FORMAT).to_string(),
            expires: session.expires_at.format(DATETIME_FORMAT).to_string(),
        }
    }
}

/// User list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/users/index.html")]
pub struct UsersIndexTemplate {
    pub viewer: ViewerView,
    pub current_path: &'static str,
    pub users: Vec<UserRow>,
    pub total: u64,
    pub search: String,
    pub page: u32,
    pub total_pages: u32,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// User detail template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/users/show.html")]
pub struct UserShowTemplate {
    pub viewer: ViewerView,
    pub current_path: &'static str,
    pub user: UserRow,
    pub sessions: Vec<SessionRow>,
}

/// Role change form.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    #[serde(default)]
    pub role: String,
}

/// Ban form; `days` blank means permanent.
#[derive(Debug, Deserialize)]
pub struct BanForm {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub days: String,
}

impl BanForm {
    fn days(&self) -> std::result::Result<Option<u32>, ActionError> {
        match self.days.trim() {
            "" => Ok(None),
            raw => raw.parse::<u32>().map(Some).map_err(|_| {
                ActionError::Validation("Ban length must be a whole number of days".to_owned())
            }),
        }
    }
}

/// Password reset form.
#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub password: String,
}

fn total_pages(total: u64) -> u32 {
    let per_page = u64::from(UserQuery::DEFAULT_LIMIT);
    u32::try_from(total.div_ceil(per_page).max(1)).unwrap_or(u32::MAX)
}

/// Flash redirect for the outcome of a user action.
fn finish(result: std::result::Result<String, ActionError>, action: &str) -> Response {
    match result {
        Ok(notice) => redirect_with(LIST_PATH, "notice", &notice).into_response(),
        Err(e) => {
            log_failure(&e, action);
            redirect_with(LIST_PATH, "error", &e.user_message()).into_response()
        }
    }
}

/// Searchable, paged user list.
#[instrument(skip(admin, state))]
pub async fn index(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> UsersIndexTemplate {
    let page = query.page.unwrap_or(1).max(1);
    let search = query.q.unwrap_or_default();

    let (users, total, error) = match state.users().list(Some(search.as_str()), page).await {
        Ok(found) => (found.users, found.total, query.error),
        Err(e) => {
            log_failure(&e, "Listing users");
            (Vec::new(), 0, Some(e.user_message()))
        }
    };

    let actor = &admin.session.user;
    UsersIndexTemplate {
        viewer: admin.viewer,
        current_path: LIST_PATH,
        users: users.iter().map(|u| UserRow::new(u, actor)).collect(),
        total,
        search,
        page,
        total_pages: total_pages(total),
        notice: query.notice,
        error,
    }
}

/// User detail with active sessions.
///
/// # Errors
///
/// Returns 404 if the user doesn't exist.
#[instrument(skip(admin, state))]
pub async fn show(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<UserShowTemplate> {
    let user = state
        .auth()
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_owned()))?;
    let sessions = state.users().sessions(&id).await?;

    Ok(UserShowTemplate {
        user: UserRow::new(&user, &admin.session.user),
        viewer: admin.viewer,
        current_path: LIST_PATH,
        sessions: sessions.iter().map(SessionRow::from).collect(),
    })
}

/// Create a user with a password.
#[instrument(skip_all)]
pub async fn create(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<UserForm>,
) -> Response {
    let result = state
        .users()
        .create(&form)
        .await
        .map(|user| format!("Created {}", user.email));
    finish(result, "Creating user")
}

/// Change a user's role.
#[instrument(skip(admin, state, form))]
pub async fn set_role(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Form(form): Form<RoleForm>,
) -> Response {
    let users = state.users();
    let result = match parse_role(&form.role) {
        Ok(role) => users
            .set_role(&admin.session.user, &id, role)
            .await
            .map(|user| format!("{} is now {}", user.email, user.role)),
        Err(e) => Err(e),
    };
    finish(result, "Changing role")
}

/// Ban a user, optionally for a number of days.
#[instrument(skip(admin, state, form))]
pub async fn ban(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Form(form): Form<BanForm>,
) -> Response {
    let users = state.users();
    let result = match form.days() {
        Ok(days) => users
            .ban(&admin.session.user, &id, Some(form.reason.as_str()), days)
            .await
            .map(|user| format!("Banned {}", user.email)),
        Err(e) => Err(e),
    };
    finish(result, "Banning user")
}

/// Lift a ban.
#[instrument(skip(_admin, state))]
pub async fn unban(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Response {
    let result = state
        .users()
        .unban(&id)
        .await
        .map(|user| format!("Unbanned {}", user.email));
    finish(result, "Unbanning user")
}

/// Set a new password for a user.
#[instrument(skip(_admin, state, form))]
pub async fn set_password(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Form(form): Form<PasswordForm>,
) -> Response {
    let result = state
        .users()
        .set_password(&id, &form.password)
        .await
        .map(|()| "Password updated".to_owned());
    finish(result, "Setting password")
}

/// Sign a user out of every session.
#[instrument(skip(_admin, state))]
pub async fn revoke_sessions(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Response {
    let result = state
        .users()
        .revoke_sessions(&id)
        .await
        .map(|count| format!("Revoked {count} session(s)"));
    finish(result, "Revoking sessions")
}

/// Remove a user.
#[instrument(skip(admin, state))]
pub async fn delete(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Response {
    let result = state
        .users()
        .remove(&admin.session.user, &id)
        .await
        .map(|()| "User removed".to_owned());
    finish(result, "Removing user")
}
