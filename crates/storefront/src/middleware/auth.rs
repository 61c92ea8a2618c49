//! Authentication extractors.
//!
//! The signed-in shopper lives in the session as a [`CurrentUser`]. Both
//! extractors refresh an access token that is about to expire; a refresh
//! failure signs the shopper out.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::session::set_flash;
use crate::models::{CurrentUser, Flash, session_keys};
use crate::services::AuthService;
use crate::state::AppState;

/// Extractor that requires a signed-in shopper.
///
/// Page requests without one are redirected to the login page, with the
/// original path carried in `next`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.first_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection for [`RequireAuth`].
#[derive(Debug)]
pub enum AuthRejection {
    /// Send the browser to the login page, then back to `next`.
    RedirectToLogin { next: String },
    /// No session layer is installed.
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => {
                Redirect::to(&login_url(&next)).into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Login page URL that returns to `next` afterwards.
#[must_use]
pub fn login_url(next: &str) -> String {
    if next.is_empty() || next == "/" {
        "/auth/login".to_string()
    } else {
        format!("/auth/login?next={}", urlencoding::encode(next))
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::Unauthorized)?;

        let next = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

        // A form POST can't be replayed after login; send it back to the page instead
        let next = if parts.method == axum::http::Method::GET {
            next
        } else {
            referer_path(parts).unwrap_or_default()
        };

        current_user(&session, state)
            .await
            .map(Self)
            .ok_or(AuthRejection::RedirectToLogin { next })
    }
}

/// Extractor that optionally gets the signed-in shopper.
///
/// Unlike [`RequireAuth`], this never rejects the request.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>().cloned() {
            Some(session) => current_user(&session, state).await,
            None => None,
        };
        Ok(Self(user))
    }
}

/// Path of the `Referer` header when it points back at this site.
fn referer_path(parts: &Parts) -> Option<String> {
    let referer = parts.headers.get(axum::http::header::REFERER)?.to_str().ok()?;
    let url = url::Url::parse(referer).ok()?;
    let path = match url.query() {
        Some(q) => format!("{}?{q}", url.path()),
        None => url.path().to_string(),
    };
    Some(path)
}

/// Load the shopper from the session, refreshing tokens that are about to expire.
async fn current_user(session: &Session, state: &AppState) -> Option<CurrentUser> {
    let user = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()?;

    if !user.needs_refresh() {
        return Some(user);
    }

    match AuthService::new(state.backend()).refresh(&user.refresh_token).await {
        Ok(auth) => {
            let refreshed = CurrentUser::from_auth(&auth);
            if let Err(e) = set_current_user(session, &refreshed).await {
                tracing::error!(error = %e, "Failed to store refreshed session");
            }
            tracing::debug!(user_id = %refreshed.id, "Refreshed access token");
            Some(refreshed)
        }
        Err(e) => {
            tracing::info!(user_id = %user.id, error = %e, "Session refresh failed, signing out");
            if let Err(e) = clear_current_user(session).await {
                tracing::error!(error = %e, "Failed to clear expired session");
            }
            set_flash(session, Flash::info(e.user_message())).await;
            None
        }
    }
}

/// Store the signed-in shopper in the session.
///
/// The session id is cycled first so a pre-login id can't be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    set_sentry_user(&user.id, Some(&user.email));
    Ok(())
}

/// Remove the signed-in shopper from the session (logout).
///
/// The cart stays with the visitor.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    session.remove::<String>(session_keys::PKCE_VERIFIER).await?;
    clear_sentry_user();
    Ok(())
}
