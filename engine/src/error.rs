//! Error types for the rulesync engine.

use thiserror::Error;

/// All possible errors from the rulesync engine.
///
/// The first four variants classify a remote response, in the order the
/// [`ResponseDecoder`](crate::ResponseDecoder) checks for them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Response classification
    #[error("network error: {0}")]
    Network(String),

    #[error("empty serialization: {0}")]
    EmptySerialization(String),

    #[error("business error: {0}")]
    Business(String),

    #[error("mapping error: {0}")]
    Mapping(String),

    // Persistence
    #[error("store error: {0}")]
    Store(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl Error {
    /// Server-reported message, if this is a business error.
    pub fn business_message(&self) -> Option<&str> {
        match self {
            Error::Business(message) => Some(message),
            _ => None,
        }
    }

    /// True for failures that happened before any body was read.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
