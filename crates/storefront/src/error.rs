//! Page-level errors and Sentry helpers.
//!
//! Page handlers return `Result<T, AppError>`. Form handlers mostly redirect
//! with a flash message instead, so only failures a shopper can't recover
//! from by re-submitting end up here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::services::auth::AuthError;

/// Error returned from page handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A product, order or page that doesn't exist (or isn't visible).
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::Backend(BackendError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Backend(BackendError::Unauthorized(_))
            | Self::Auth(AuthError::InvalidCredentials | AuthError::EmailNotConfirmed | AuthError::SessionExpired) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Backend(BackendError::Conflict(_)) | Self::Auth(AuthError::UserAlreadyExists) => {
                StatusCode::CONFLICT
            }
            Self::Backend(BackendError::RateLimited(_)) | Self::Auth(AuthError::RateLimited) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Auth(AuthError::WeakPassword(_) | AuthError::PasswordMismatch | AuthError::InvalidEmail(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Backend(_) | Self::Auth(AuthError::Backend(_)) => StatusCode::BAD_GATEWAY,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the shopper sees. Upstream details stay in the logs.
    fn public_message(&self) -> String {
        match self.status() {
            StatusCode::NOT_FOUND => "We couldn't find that page.".to_string(),
            StatusCode::TOO_MANY_REQUESTS => "Too many requests. Please try again shortly.".to_string(),
            StatusCode::BAD_GATEWAY => "Our catalog is temporarily unavailable. Please try again.".to_string(),
            _ => match self {
                Self::Auth(err) => err.user_message(),
                _ => "Something went wrong on our side.".to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, self.public_message()).into_response()
    }
}

/// Attach the signed-in shopper to subsequent Sentry events.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| scope.set_user(None));
}

/// Record a shopper action, e.g. `add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id)]))`.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let data = data
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
        .collect();

    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        data,
        ..Default::default()
    });
}
