//! Session database pool.
//!
//! Shop data lives in the managed backend. The storefront's own `PostgreSQL`
//! holds a single table, `tower_sessions.session`, with each visitor's cart,
//! signed-in user, checkout draft and pending flash message.
//!
//! Create the table before first start:
//! ```bash
//! cargo run -p zeaver-cli -- migrate sessions
//! ```

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Sessions are read and written once per request, so a small pool suffices.
const MAX_CONNECTIONS: u32 = 10;

/// Connect to the session database.
///
/// # Errors
///
/// Returns `sqlx::Error` if no connection can be established within 10s.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
