//! Sign-in, sign-up and sign-out route handlers.
//!
//! Failures redirect back to `/auth` with the message in the query string so
//! a refresh never resubmits the form.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::{instrument, warn};

use super::redirect_with;
use crate::actions::ActionError;
use crate::error::clear_sentry_user;
use crate::filters;
use crate::middleware::{
    CurrentSession, RequestMeta, SESSION_COOKIE, removal_cookie, session_cookie,
};
use crate::models::{AuthSession, ViewerView};
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Sign-in form data.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Sign-up form data.
#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

/// Query parameters of the auth page.
#[derive(Debug, Default, Deserialize)]
pub struct AuthPageQuery {
    pub mode: Option<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Sign-in / sign-up page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/index.html")]
pub struct AuthPageTemplate {
    pub viewer: Option<ViewerView>,
    pub sign_up: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Where a freshly signed-in user lands.
const fn landing_path(auth: &AuthSession) -> &'static str {
    if auth.user.role.is_admin() { "/admin" } else { "/" }
}

fn failure_redirect(err: AuthError, mode: &str) -> Response {
    let message = ActionError::from(err).user_message();
    redirect_with(&format!("/auth?mode={mode}"), "error", &message).into_response()
}

/// Display the auth page; signed-in visitors are sent on.
pub async fn page(session: CurrentSession, Query(query): Query<AuthPageQuery>) -> Response {
    if let Some(auth) = &session.0 {
        return Redirect::to(landing_path(auth)).into_response();
    }

    AuthPageTemplate {
        viewer: None,
        sign_up: query.mode.as_deref() == Some("sign-up"),
        error: query.error,
        notice: query.notice,
    }
    .into_response()
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    RequestMeta(meta): RequestMeta,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> Response {
    match state.auth().sign_in(&form.email, &form.password, &meta).await {
        Ok(auth) => {
            let cookie = session_cookie(&auth.session.token, state.config().is_secure());
            (jar.add(cookie), Redirect::to(landing_path(&auth))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Sign-in failed");
            failure_redirect(e, "sign-in")
        }
    }
}

/// Create an account and sign in.
#[instrument(skip_all)]
pub async fn sign_up(
    State(state): State<AppState>,
    RequestMeta(meta): RequestMeta,
    jar: CookieJar,
    Form(form): Form<SignUpForm>,
) -> Response {
    if form.password != form.password_confirm {
        return redirect_with("/auth?mode=sign-up", "error", "Passwords do not match")
            .into_response();
    }

    match state
        .auth()
        .sign_up(&form.name, &form.email, &form.password, &meta)
        .await
    {
        Ok(auth) => {
            let cookie = session_cookie(&auth.session.token, state.config().is_secure());
            (jar.add(cookie), Redirect::to(landing_path(&auth))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Sign-up failed");
            failure_redirect(e, "sign-up")
        }
    }
}

/// Delete the current session and clear the cookie.
#[instrument(skip_all)]
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(e) = state.auth().sign_out(cookie.value()).await
    {
        warn!(error = %e, "Failed to delete session on sign-out");
    }
    clear_sentry_user();

    let jar = jar.add(removal_cookie(state.config().is_secure()));
    (jar, redirect_with("/auth", "notice", "You have been signed out")).into_response()
}
