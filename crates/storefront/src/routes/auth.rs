//! Authentication route handlers.
//!
//! Password sign-in and signup go straight to the backend's auth service.
//! Google sign-in and password recovery both finish at `/auth/callback` with
//! a PKCE code exchange; the verifier and the post-login target wait in the
//! session until then.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::backend::{AuthSession, SignUpOutcome};
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext, clear_current_user, login_url, set_current_user};
use crate::models::session::set_flash;
use crate::models::{CurrentUser, Flash, session_keys};
use crate::routes::safe_redirect;
use crate::services::AuthService;
use crate::state::AppState;

/// Where password-recovery links land once the code is exchanged.
const RECOVERY_TARGET: &str = "/account?tab=settings";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Signup form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    /// Checkbox; present only when ticked.
    pub terms: Option<String>,
}

impl SignupForm {
    /// Checks the auth service doesn't do itself.
    fn validate(&self) -> Result<String, &'static str> {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        if first.is_empty() || last.is_empty() {
            return Err("Please enter your first and last name.");
        }
        if self.email.trim().is_empty() {
            return Err("Please enter your email address.");
        }
        if self.terms.is_none() {
            return Err("Please accept the terms and conditions.");
        }
        Ok(format!("{first} {last}"))
    }
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// `next` target carried through sign-in.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Query parameters on the PKCE callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub next: String,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub ctx: PageContext,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub error: Option<String>,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub ctx: PageContext,
}

/// Store the new session's user and pick the flash to show.
async fn sign_in(session: &Session, auth: &AuthSession) -> Result<CurrentUser, Flash> {
    let user = CurrentUser::from_auth(auth);
    match set_current_user(session, &user).await {
        Ok(()) => Ok(user),
        Err(e) => {
            tracing::error!(error = %e, "Failed to store signed-in user");
            Err(Flash::error("Something went wrong. Please try again."))
        }
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page. Signed-in shoppers go straight on.
pub async fn login_page(
    OptionalAuth(user): OptionalAuth,
    ctx: PageContext,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_redirect(query.next.as_deref(), "/account");
    if user.is_some() {
        return Redirect::to(&next).into_response();
    }
    LoginTemplate { ctx, next }.into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_redirect(form.next.as_deref(), "/account");

    let result = AuthService::new(state.backend())
        .login_with_password(&form.email, &form.password)
        .await;

    match result {
        Ok(auth) => match sign_in(&session, &auth).await {
            Ok(user) => {
                add_breadcrumb("auth", "Signed in with password", None);
                set_flash(
                    &session,
                    Flash::success(format!("Welcome back, {}!", user.first_name())),
                )
                .await;
                Redirect::to(&next).into_response()
            }
            Err(flash) => {
                set_flash(&session, flash).await;
                Redirect::to(&login_url(&next)).into_response()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            set_flash(&session, Flash::error(e.user_message())).await;
            Redirect::to(&login_url(&next)).into_response()
        }
    }
}

/// Sign out. The cart stays with the visitor.
#[instrument(skip(state, session, user))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Response {
    if let Some(user) = user {
        AuthService::new(state.backend())
            .logout(&user.access_token)
            .await;
    }
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session on logout");
    }
    set_flash(&session, Flash::info("You've been signed out.")).await;
    Redirect::to("/").into_response()
}

// =============================================================================
// Signup Routes
// =============================================================================

/// Display the signup page.
pub async fn signup_page(OptionalAuth(user): OptionalAuth, ctx: PageContext) -> Response {
    if user.is_some() {
        return Redirect::to("/account").into_response();
    }
    SignupTemplate {
        ctx,
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        error: None,
    }
    .into_response()
}

/// Handle signup form submission.
///
/// Depending on the project's settings the auth service either signs the new
/// shopper in straight away or emails a confirmation link first.
#[instrument(skip(state, session, ctx, form))]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<SignupForm>,
) -> Response {
    let rerender = |ctx: PageContext, form: &SignupForm, error: String| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            SignupTemplate {
                ctx,
                first_name: form.first_name.clone(),
                last_name: form.last_name.clone(),
                email: form.email.clone(),
                error: Some(error),
            },
        )
            .into_response()
    };

    let full_name = match form.validate() {
        Ok(name) => name,
        Err(message) => return rerender(ctx, &form, message.to_string()),
    };

    let outcome = AuthService::new(state.backend())
        .register_with_password(
            &form.email,
            &form.password,
            &form.password_confirm,
            Some(&full_name),
            &state.absolute_url("/auth/login"),
        )
        .await;

    match outcome {
        Ok(SignUpOutcome::SignedIn(auth)) => {
            add_breadcrumb("auth", "Signed up", None);
            let flash = match sign_in(&session, &auth).await {
                Ok(user) => Flash::success(format!("Welcome to Zeaver, {}!", user.first_name())),
                Err(flash) => flash,
            };
            set_flash(&session, flash).await;
            Redirect::to("/account").into_response()
        }
        Ok(SignUpOutcome::ConfirmationRequired(_)) => {
            add_breadcrumb("auth", "Signed up, confirmation pending", None);
            set_flash(
                &session,
                Flash::info("Check your email to confirm your account, then sign in."),
            )
            .await;
            Redirect::to("/auth/login").into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Signup failed");
            rerender(ctx, &form, e.user_message())
        }
    }
}

// =============================================================================
// Password Recovery
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(ctx: PageContext) -> impl IntoResponse {
    ForgotPasswordTemplate { ctx }
}

/// Email a reset link.
///
/// Always reports success so the form can't be used to discover accounts.
#[instrument(skip(state, session, form))]
pub async fn forgot_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let result = AuthService::new(state.backend())
        .request_password_reset(&form.email, &state.absolute_url("/auth/callback"))
        .await;

    match result {
        Ok(pkce) => {
            let stored = tokio::try_join!(
                session.insert(session_keys::PKCE_VERIFIER, pkce.verifier),
                session.insert(session_keys::AUTH_NEXT, RECOVERY_TARGET),
            );
            if let Err(e) = stored {
                tracing::error!(error = %e, "Failed to store reset verifier");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Password reset request failed"),
    }

    set_flash(
        &session,
        Flash::success("If an account exists for that email, we've sent a link to reset your password."),
    )
    .await;
    Redirect::to("/auth/forgot-password").into_response()
}

// =============================================================================
// PKCE Sign-in
// =============================================================================

async fn fail(session: &Session, message: impl Into<String>) -> Response {
    set_flash(session, Flash::error(message)).await;
    Redirect::to("/auth/login").into_response()
}

/// Start Google sign-in.
#[instrument(skip(state, session))]
pub async fn google(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_redirect(query.next.as_deref(), "/account");
    let (url, pkce) =
        AuthService::new(state.backend()).start_google_sign_in(&state.absolute_url("/auth/callback"));

    let stored = tokio::try_join!(
        session.insert(session_keys::PKCE_VERIFIER, pkce.verifier),
        session.insert(session_keys::AUTH_NEXT, next),
    );
    if let Err(e) = stored {
        tracing::error!(error = %e, "Failed to store sign-in verifier");
        set_flash(&session, Flash::error("Something went wrong. Please try again.")).await;
        return Redirect::to("/auth/login").into_response();
    }

    Redirect::to(&url).into_response()
}

/// Finish Google sign-in or password recovery.
#[instrument(skip(state, session, query))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = &query.error {
        tracing::warn!(error = %error, description = ?query.error_description, "Sign-in provider returned an error");
        let message = query
            .error_description
            .clone()
            .unwrap_or_else(|| "Sign-in was cancelled.".to_string());
        return fail(&session, message).await;
    }

    let verifier = session
        .remove::<String>(session_keys::PKCE_VERIFIER)
        .await
        .ok()
        .flatten();
    let next = session
        .remove::<String>(session_keys::AUTH_NEXT)
        .await
        .ok()
        .flatten();

    let (Some(code), Some(verifier)) = (query.code.as_deref(), verifier) else {
        return fail(&session, "This sign-in link has expired. Please try again.").await;
    };

    let auth = match AuthService::new(state.backend())
        .complete_code_exchange(code, &verifier)
        .await
    {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(error = %e, "Code exchange failed");
            return fail(&session, e.user_message()).await;
        }
    };

    let user = match sign_in(&session, &auth).await {
        Ok(user) => user,
        Err(flash) => return fail(&session, flash.message).await,
    };

    let next = safe_redirect(next.as_deref(), "/account");
    let flash = if next == RECOVERY_TARGET {
        Flash::info("You're signed in. Choose a new password below.")
    } else {
        Flash::success(format!("Welcome, {}!", user.first_name()))
    };
    add_breadcrumb("auth", "Completed code exchange", None);
    set_flash(&session, flash).await;
    Redirect::to(&next).into_response()
}
