//! Unified error handling for the client.

use crate::config::ConfigError;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Response classification or engine-side store failure
    #[error(transparent)]
    Engine(#[from] rulesync_engine::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    /// The decoder's classification, if this error came from a response.
    pub fn engine_error(&self) -> Option<&rulesync_engine::Error> {
        match self {
            ClientError::Engine(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        self.engine_error().is_some_and(rulesync_engine::Error::is_network)
    }

    /// Server-reported message, if this is a business error.
    pub fn business_message(&self) -> Option<&str> {
        self.engine_error().and_then(rulesync_engine::Error::business_message)
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
