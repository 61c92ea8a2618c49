//! Session-related types.
//!
//! Everything a visitor carries between requests: the cart, the signed-in
//! shopper, the checkout draft and one-shot flash messages.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use zeaver_core::checkout::{PaymentSummary, ShippingAddress};
use zeaver_core::{AppliedPromo, Cart, UserId};

use crate::backend::AuthSession;

/// Seconds before expiry at which the access token is refreshed.
const REFRESH_BUFFER_SECS: i64 = 60;

/// Session-stored shopper identity and tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    /// Full name, or the email's local part when none was given.
    pub name: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp when `access_token` expires.
    pub expires_at: i64,
}

impl CurrentUser {
    #[must_use]
    pub fn from_auth(session: &AuthSession) -> Self {
        Self {
            id: session.user.id,
            email: session.user.email.clone().unwrap_or_default(),
            name: session.user.display_name(),
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session
                .expires_at
                .unwrap_or_else(|| Utc::now().timestamp() + session.expires_in),
        }
    }

    /// Whether the access token should be refreshed before use.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at - REFRESH_BUFFER_SECS
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

impl fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }
}

/// Checkout progress kept between steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDraft {
    pub shipping: Option<ShippingAddress>,
    pub payment: Option<PaymentSummary>,
    pub promo: Option<AppliedPromo>,
}

/// Session keys.
pub mod keys {
    /// The signed-in shopper.
    pub const CURRENT_USER: &str = "current_user";

    /// The visitor's cart.
    pub const CART: &str = "cart";

    /// Checkout draft (shipping, payment summary, promo).
    pub const CHECKOUT: &str = "checkout";

    /// Pending flash message.
    pub const FLASH: &str = "flash";

    /// PKCE verifier for an in-flight Google sign-in or password reset.
    pub const PKCE_VERIFIER: &str = "pkce_verifier";

    /// Where to send the shopper after signing in.
    pub const AUTH_NEXT: &str = "auth_next";

    /// The order just placed. Guests can't read orders back through the API.
    pub const LAST_ORDER: &str = "last_order";
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the cart, or an empty one.
pub async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// # Errors
///
/// Returns an error if the session store rejects the write.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}

pub async fn load_draft(session: &Session) -> CheckoutDraft {
    session
        .get::<CheckoutDraft>(keys::CHECKOUT)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// # Errors
///
/// Returns an error if the session store rejects the write.
pub async fn save_draft(session: &Session, draft: &CheckoutDraft) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CHECKOUT, draft).await
}

/// Queue a flash message. Failures are logged; a lost flash is not fatal.
pub async fn set_flash(session: &Session, flash: Flash) {
    if let Err(e) = session.insert(keys::FLASH, flash).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Take the pending flash message, if any.
pub async fn take_flash(session: &Session) -> Option<Flash> {
    session.remove::<Flash>(keys::FLASH).await.ok().flatten()
}
