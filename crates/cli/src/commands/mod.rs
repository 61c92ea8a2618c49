//! Subcommand implementations.

pub mod check;
pub mod migrate;
pub mod orders;

use thiserror::Error;

use zeaver_storefront::backend::{BackendClient, BackendError};
use zeaver_storefront::config::{BackendConfig, ConfigError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("BACKEND_SERVICE_ROLE_KEY is required for this command")]
    MissingServiceKey,
}

/// Backend client from the environment.
fn backend() -> Result<BackendClient, CommandError> {
    Ok(BackendClient::new(&BackendConfig::from_env()?))
}

/// Backend client that must carry the service-role key.
fn service_backend() -> Result<BackendClient, CommandError> {
    let client = backend()?;
    if client.has_service_key() {
        Ok(client)
    } else {
        Err(CommandError::MissingServiceKey)
    }
}
