//! Authentication extractors and session cookie helpers.
//!
//! The session token travels in the `savers_session` cookie (browsers) or an
//! `Authorization: Bearer` header (API clients). It is resolved once per
//! request and memoized in the request extensions.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use time::Duration;

use crate::error::{error_page, set_sentry_user};
use crate::models::{AuthSession, ViewerView};
use crate::services::auth::{AccessError, AuthService, ClientMeta, SESSION_TTL_DAYS};
use crate::state::AppState;

use super::rate_limit::client_ip_from_parts;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "savers_session";

/// Where anonymous visitors are sent.
pub const SIGN_IN_PATH: &str = "/auth";

/// Path prefix of the JSON admin API.
const ADMIN_API_PREFIX: &str = "/admin/api/";

/// Read the session token from the cookie, falling back to a bearer token.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && !cookie.value().is_empty()
    {
        return Some(cookie.value().to_owned());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Build the session cookie issued after sign-in or sign-up.
#[must_use]
pub fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_owned()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(SESSION_TTL_DAYS))
        .build()
}

/// Build an expired session cookie for sign-out.
#[must_use]
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, String::new()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .build()
}

#[derive(Clone)]
struct ResolvedSession(Option<AuthSession>);

async fn resolve_session(parts: &mut Parts, state: &AppState) -> Option<AuthSession> {
    if let Some(ResolvedSession(session)) = parts.extensions.get::<ResolvedSession>() {
        return session.clone();
    }

    let session = match session_token(&parts.headers) {
        Some(token) => state.auth().get_session(&token).await,
        None => None,
    };

    if let Some(auth) = &session {
        set_sentry_user(&auth.user.id, Some(auth.user.email.as_str()));
    }

    parts.extensions.insert(ResolvedSession(session.clone()));
    session
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        Redirect::to(SIGN_IN_PATH).into_response()
    }
}

/// Extractor for the current identity, if any.
///
/// Never rejects.
pub struct CurrentSession(pub Option<AuthSession>);

impl CurrentSession {
    /// The template view of the signed-in user.
    #[must_use]
    pub fn viewer(&self) -> Option<ViewerView> {
        self.0.as_ref().map(|auth| ViewerView::from(&auth.user))
    }
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_session(parts, state).await))
    }
}

/// Extractor that requires a signed-in user.
///
/// Anonymous requests are redirected to the sign-in page.
pub struct RequireAuth(pub AuthSession);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AccessError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = resolve_session(parts, state).await;
        AuthService::require_auth(session).map(Self)
    }
}

/// Extractor for admin pages and the admin API.
///
/// Anonymous visitors are redirected to `/auth`; signed-in non-admins get the
/// access-denied page and keep their session. Under `/admin/api/` both cases
/// are JSON errors instead.
pub struct RequireAdmin {
    pub session: AuthSession,
    pub viewer: ViewerView,
}

/// Rejection for [`RequireAdmin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminRejection {
    pub reason: AccessError,
    pub api: bool,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match (self.reason, self.api) {
            (AccessError::Unauthenticated, false) => self.reason.into_response(),
            (AccessError::NotAdmin, false) => error_page(
                StatusCode::FORBIDDEN,
                "Access denied",
                "You need an administrator account to view this page.",
            ),
            (reason, true) => {
                let status = match reason {
                    AccessError::Unauthenticated => StatusCode::UNAUTHORIZED,
                    AccessError::NotAdmin => StatusCode::FORBIDDEN,
                };
                let body = json!({ "success": false, "error": reason.to_string() });
                (status, axum::Json(body)).into_response()
            }
        }
    }
}

/// Nested routers see a stripped path, so prefer the original URI.
fn is_admin_api(parts: &Parts) -> bool {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0)
        .path()
        .starts_with(ADMIN_API_PREFIX)
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AdminRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = resolve_session(parts, state).await;
        let session = AuthService::require_admin(session).map_err(|reason| AdminRejection {
            reason,
            api: is_admin_api(parts),
        })?;
        let viewer = ViewerView::from(&session.user);
        Ok(Self { session, viewer })
    }
}

/// Extractor for the client address and user agent recorded on new sessions.
pub struct RequestMeta(pub ClientMeta);

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address =
            client_ip_from_parts(&parts.headers, &parts.extensions).map(|ip| ip.to_string());
        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(512).collect());
        Ok(Self(ClientMeta {
            ip_address,
            user_agent,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{HeaderValue, header::COOKIE};

    use super::*;

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; savers_session=abc123"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok_456"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok_456"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_empty_cookie_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("savers_session="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", true);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::days(SESSION_TTL_DAYS)));

        let removal = removal_cookie(false);
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn test_access_error_redirects_to_sign_in() {
        let response = AccessError::NotAdmin.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get("location").unwrap(), SIGN_IN_PATH);
    }

    #[test]
    fn test_admin_rejections() {
        let page = AdminRejection {
            reason: AccessError::NotAdmin,
            api: false,
        };
        assert_eq!(page.into_response().status(), StatusCode::FORBIDDEN);

        let api = AdminRejection {
            reason: AccessError::Unauthenticated,
            api: true,
        };
        assert_eq!(api.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
