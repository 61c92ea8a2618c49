//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! zv-cli migrate sessions
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - session database

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tower_sessions_sqlx_store::PostgresStore;

use zeaver_storefront::config::session_database_url;

use super::CommandError;

/// Create the `tower_sessions` schema and session table.
///
/// Safe to run repeatedly.
pub async fn sessions() -> Result<(), CommandError> {
    let database_url = session_database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Session table ready");
    Ok(())
}
