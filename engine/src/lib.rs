//! # Rulesync Engine
//!
//! The pure core of proxy rule-set synchronization.
//!
//! This crate turns raw REST responses into typed rule sets and reconciles
//! them into a local store with tombstones. The same inputs always produce the
//! same store contents.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine never opens a socket or a file; the host hands it
//!   bytes and a store
//! - **Deterministic**: Reconciling the same batch twice performs no writes the
//!   second time
//! - **Testable**: Pure logic over [`MemoryStore`], no mocks needed
//!
//! ## Core Concepts
//!
//! ### Rule sets
//!
//! A [`RuleSet`] is identified by its server `uuid` and carries:
//! - Ordered [`Rule`]s (type, action, value)
//! - Server timestamps (`create_at`, `remote_updated_at`)
//! - Local flags: subscribed, editable, deleted (tombstone)
//!
//! ### Decoding
//!
//! The [`ResponseDecoder`] classifies a [`RawResponse`] into exactly one
//! [`Error`] kind or a mapped entity. Entities implement [`FromJson`]; elements
//! that fail to map are dropped from arrays rather than failing the batch.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] applies remote rule sets to any [`RuleSetStore`]:
//! insert when absent, skip when `remote_updated_at` and `deleted` already
//! match, replace otherwise. [`plan`] exposes the decision on its own so async
//! stores can apply it themselves.
//!
//! ## Quick Start
//!
//! ```rust
//! use rulesync_engine::{MemoryStore, RawResponse, Reconciler, ResponseDecoder, RuleSet, RuleSetStore};
//!
//! let body = r#"[{
//!     "id": "a1",
//!     "name": "Ads",
//!     "created_at": "2020-01-01T00:00:00Z",
//!     "updated_at": "2020-01-02T00:00:00Z",
//!     "rules": [{"pattern": "*.ads.com", "action": "reject", "type": "domain"}]
//! }]"#;
//!
//! // 1. Decode the response
//! let response = RawResponse::new(200, body);
//! let rule_sets: Vec<RuleSet> = ResponseDecoder::new().decode_array(&response).unwrap();
//!
//! // 2. Reconcile into a store
//! let mut store = MemoryStore::new();
//! let result = Reconciler::new(&mut store).reconcile_all(rule_sets).unwrap();
//! assert_eq!(result.inserted, vec!["a1"]);
//!
//! // 3. Query live rule sets
//! let live = store.all_not_deleted().unwrap();
//! assert!(live[0].is_subscribed);
//! assert!(!live[0].editable);
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module provides C-compatible functions for the iOS host. All
//! data is exchanged as JSON strings.
//!
//! ## Persistence
//!
//! Use [`MemoryStore::export_state`] and [`MemoryStore::import_state`] with
//! [`StoreSnapshot`] for persistence. Snapshots serialize to JSON with
//! deterministic ordering.

pub mod decoder;
pub mod error;
pub mod ffi;
pub mod mapper;
pub mod reconcile;
pub mod rule;
pub mod ruleset;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use decoder::{value_for_key_path, RawResponse, ResponseDecoder, ERROR_MESSAGE_KEY_PATH};
pub use error::{Error, Result};
pub use mapper::{map_array, DateTransform, DecodedDate, FromJson};
pub use reconcile::{plan, ReconcileAction, ReconcileResult, Reconciler};
pub use rule::{Rule, RuleAction, RuleType, UnknownVariant};
pub use ruleset::RuleSet;
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{MemoryStore, RuleSetStore};

/// Type aliases for clarity
pub type Uuid = String;
/// Seconds since the Unix epoch
pub type Timestamp = i64;
