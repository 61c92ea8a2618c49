//! Authentication error types.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] zeaver_core::EmailError),

    /// Wrong password or unknown account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but its email hasn't been confirmed.
    #[error("email not confirmed")]
    EmailNotConfirmed,

    /// An account with this email already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The session's tokens can no longer be refreshed.
    #[error("session expired")]
    SessionExpired,

    /// Too many attempts.
    #[error("too many attempts")]
    RateLimited,

    /// Any other failure talking to the auth service.
    #[error("backend error: {0}")]
    Backend(#[source] BackendError),
}

impl AuthError {
    /// Message safe to show the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
            Self::InvalidCredentials => "Invalid email or password.".to_string(),
            Self::EmailNotConfirmed => {
                "Please confirm your email address before signing in.".to_string()
            }
            Self::UserAlreadyExists => "An account with this email already exists.".to_string(),
            Self::WeakPassword(msg) => msg.clone(),
            Self::PasswordMismatch => "Passwords do not match.".to_string(),
            Self::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::RateLimited => "Too many attempts. Please wait a moment and try again.".to_string(),
            Self::Backend(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        match classify(&err) {
            Some(mapped) => mapped,
            None => Self::Backend(err),
        }
    }
}

/// Recognize auth service failures the shopper can act on.
fn classify(err: &BackendError) -> Option<AuthError> {
    match err {
        BackendError::RateLimited(_) => Some(AuthError::RateLimited),
        BackendError::Conflict(_) => Some(AuthError::UserAlreadyExists),
        BackendError::Api {
            status,
            code,
            message,
        } => match (code.as_deref(), message.as_str()) {
            (Some("invalid_credentials" | "invalid_grant"), _) | (_, "Invalid login credentials") => {
                Some(AuthError::InvalidCredentials)
            }
            (Some("email_not_confirmed"), _) | (_, "Email not confirmed") => {
                Some(AuthError::EmailNotConfirmed)
            }
            (Some("user_already_exists" | "email_exists"), _) | (_, "User already registered") => {
                Some(AuthError::UserAlreadyExists)
            }
            (Some("weak_password"), _) => Some(AuthError::WeakPassword(message.clone())),
            (Some(c), _) if c.starts_with("over_") => Some(AuthError::RateLimited),
            _ if *status == 429 => Some(AuthError::RateLimited),
            _ => None,
        },
        _ => None,
    }
}
