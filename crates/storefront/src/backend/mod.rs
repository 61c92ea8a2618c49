//! Managed backend client.
//!
//! # Architecture
//!
//! - The backend is the source of truth: products, orders, profiles and
//!   reviews live in its database, and accounts live in its auth service.
//! - Talks to the REST data API (`/rest/v1`) and the auth API (`/auth/v1`)
//!   over `reqwest`. No local sync.
//! - In-memory caching via `moka` for catalog reads (5 minute TTL). Search
//!   and anything user-scoped always goes to the network.
//!
//! # Example
//!
//! ```rust,ignore
//! use zeaver_storefront::backend::{BackendClient, ProductFilter};
//!
//! let client = BackendClient::new(&config.backend);
//!
//! let featured = client.get_featured_products(6).await?;
//! let rings = client
//!     .get_products(&ProductFilter { category: Some("rings".into()), ..Default::default() })
//!     .await?;
//! ```

mod account;
mod auth;
mod cache;
mod catalog;
mod client;
mod orders;
pub mod query;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use account::ProfileUpdate;
pub use auth::{AuthSession, AuthUser, Pkce, SignUpOutcome, UserMetadata};
pub use catalog::{ProductFilter, ProductSort};
pub use client::{Auth, BackendClient};
pub use orders::{NewOrder, NewOrderItem, PromoLookupError};
pub use query::{Direction, Query, sanitize_search};
pub use types::*;

use serde::Deserialize;
use thiserror::Error;

/// Postgres unique-constraint violation, surfaced by the REST API.
pub const UNIQUE_VIOLATION: &str = "23505";

/// REST API code for "single row requested, zero or many returned".
pub const NO_SINGLE_ROW: &str = "PGRST116";

/// Errors that can occur when talking to the managed backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error body.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, expired or rejected credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unique constraint or duplicate account.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A maintenance operation needs the service-role key.
    #[error("BACKEND_SERVICE_ROLE_KEY is not configured")]
    MissingServiceKey,
}

impl BackendError {
    /// Machine-readable code from the error body, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            Self::Conflict(_) => Some(UNIQUE_VIOLATION),
            _ => None,
        }
    }

    /// Whether this is a unique-constraint violation.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Error body from either API.
///
/// The REST API uses `{code, message, details, hint}`. The auth API uses
/// `{code, error_code, msg}` or the older OAuth `{error, error_description}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl ApiErrorBody {
    pub(crate) fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    pub(crate) fn code(&self) -> Option<String> {
        if let Some(code) = &self.error_code {
            return Some(code.clone());
        }
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            _ => self.error.clone(),
        }
    }

    pub(crate) fn message(&self) -> String {
        self.message
            .as_ref()
            .or(self.msg.as_ref())
            .or(self.error_description.as_ref())
            .or(self.details.as_ref())
            .or(self.error.as_ref())
            .cloned()
            .unwrap_or_else(|| "(no error details provided)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::NotFound("product 123".to_string());
        assert_eq!(err.to_string(), "Not found: product 123");

        let err = BackendError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }

    #[test]
    fn test_conflict_reports_unique_violation_code() {
        let err = BackendError::Conflict("Email already subscribed".to_string());
        assert!(err.is_conflict());
        assert_eq!(err.code(), Some(UNIQUE_VIOLATION));
    }

    #[test]
    fn test_rest_error_body() {
        let body = ApiErrorBody::parse(
            r#"{"code":"23505","details":"Key (email)=(a@b.co) already exists.","hint":null,"message":"duplicate key value violates unique constraint"}"#,
        );
        assert_eq!(body.code().as_deref(), Some("23505"));
        assert_eq!(
            body.message(),
            "duplicate key value violates unique constraint"
        );
    }

    #[test]
    fn test_auth_error_body() {
        let body = ApiErrorBody::parse(
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        assert_eq!(body.code().as_deref(), Some("invalid_credentials"));
        assert_eq!(body.message(), "Invalid login credentials");

        let legacy = ApiErrorBody::parse(
            r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#,
        );
        assert_eq!(legacy.code().as_deref(), Some("invalid_grant"));
        assert_eq!(legacy.message(), "Refresh Token Not Found");
    }

    #[test]
    fn test_unparseable_error_body() {
        let body = ApiErrorBody::parse("<html>Bad Gateway</html>");
        assert_eq!(body.code(), None);
        assert_eq!(body.message(), "(no error details provided)");
    }
}
