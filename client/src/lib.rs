//! Rulesync client - keeps a local SQLite mirror of remote rule sets.
//!
//! [`RemoteClient`] talks to the REST API and routes every response through
//! the engine's decoder. [`SyncService`] reconciles decoded rule sets into the
//! store created by [`db::create_pool`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod sync;

pub use api::{RemoteClient, RequestContext, DEFAULT_COUNT, DEFAULT_PAGE};
pub use config::{Config, ConfigError};
pub use error::{ClientError, Result};
pub use sync::SyncService;
