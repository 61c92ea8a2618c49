//! Authentication service.
//!
//! Validates credentials locally before handing them to the backend's auth
//! service, and maps its responses onto [`AuthError`].

mod error;

pub use error::AuthError;

use tracing::{info, warn};

use zeaver_core::Email;

use crate::backend::{AuthSession, BackendClient, BackendError, Pkce, SignUpOutcome};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest password the auth service accepts.
const MAX_PASSWORD_LENGTH: usize = 72;

/// Authentication service.
///
/// Handles signup, password login, password changes and the PKCE flows used
/// by Google sign-in and password recovery.
pub struct AuthService<'a> {
    backend: &'a BackendClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(backend: &'a BackendClient) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new account.
    ///
    /// `redirect_to` is where the confirmation email's link lands.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch` if the
    /// password is unacceptable.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        password_confirm: &str,
        full_name: Option<&str>,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = Email::parse(email)?;
        validate_new_password(password, password_confirm)?;

        let outcome = self
            .backend
            .sign_up(&email, password, full_name, redirect_to)
            .await?;
        Ok(outcome)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        if password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.backend.sign_in_with_password(&email, password).await?;
        info!(user_id = %session.user.id, "Signed in with password");
        Ok(session)
    }

    /// Trade a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the refresh token is no longer
    /// accepted.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        self.backend
            .refresh_session(refresh_token)
            .await
            .map_err(|e| match e {
                BackendError::Unauthorized(_) | BackendError::NotFound(_) => AuthError::SessionExpired,
                BackendError::Api { status, .. } if status < 500 => AuthError::SessionExpired,
                other => AuthError::Backend(other),
            })
    }

    /// Revoke the session server-side. Failures are logged, never returned.
    pub async fn logout(&self, access_token: &str) {
        if let Err(e) = self.backend.sign_out(access_token).await {
            warn!(error = %e, "Sign-out call failed");
        }
    }

    /// Change the signed-in shopper's password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch` for an
    /// unacceptable password.
    pub async fn change_password(
        &self,
        access_token: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), AuthError> {
        validate_new_password(password, password_confirm)?;
        self.backend.update_password(access_token, password).await?;
        Ok(())
    }

    // =========================================================================
    // PKCE Flows
    // =========================================================================

    /// Email a reset link. The returned verifier must be kept for the callback.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address, or the
    /// backend's error. Callers hide both from the shopper.
    pub async fn request_password_reset(&self, email: &str, redirect_to: &str) -> Result<Pkce, AuthError> {
        let email = Email::parse(email)?;
        let pkce = Pkce::generate();
        self.backend
            .reset_password_for_email(&email, redirect_to, &pkce)
            .await?;
        Ok(pkce)
    }

    /// Authorization URL for Google sign-in, with the verifier to keep.
    #[must_use]
    pub fn start_google_sign_in(&self, redirect_to: &str) -> (String, Pkce) {
        let pkce = Pkce::generate();
        (self.backend.google_authorize_url(redirect_to, &pkce), pkce)
    }

    /// Finish a PKCE flow started by Google sign-in or a reset email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the code or verifier is rejected.
    pub async fn complete_code_exchange(&self, code: &str, verifier: &str) -> Result<AuthSession, AuthError> {
        self.backend
            .exchange_code_for_session(code, verifier)
            .await
            .map_err(|e| match e {
                BackendError::Api { status, .. } if status < 500 => AuthError::SessionExpired,
                BackendError::Unauthorized(_) | BackendError::NotFound(_) => AuthError::SessionExpired,
                other => AuthError::from(other),
            })
    }
}

/// Check a new password against its confirmation and the length rules.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch`.
pub fn validate_new_password(password: &str, password_confirm: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters."
        )));
    }
    if password != password_confirm {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}
