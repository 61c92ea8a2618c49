//! Session middleware configuration.
//!
//! Production sessions live in `PostgreSQL` via `tower-sessions-sqlx-store`;
//! tests swap in a `MemoryStore` through [`session_layer`].

use sqlx::PgPool;
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "zv_session";

/// Session expiry after inactivity, in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer backed by the `PostgreSQL` store.
///
/// The `tower_sessions` table must exist; `zv-cli migrate sessions` creates it.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    session_layer(
        PostgresStore::new(pool.clone()),
        config.session_key(),
        config.is_https(),
    )
}

/// Session layer over any store.
///
/// The cookie is signed with `key`, HTTP-only and `SameSite=Lax`. It carries
/// `Secure` when the storefront is served over https.
#[must_use]
pub fn session_layer<S: SessionStore>(store: S, key: Key, is_secure: bool) -> SessionManagerLayer<S, SignedCookie> {
    SessionManagerLayer::new(store)
        .with_signed(key)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(SESSION_EXPIRY_SECONDS)))
        .with_secure(is_secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
