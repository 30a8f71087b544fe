//! Rule-set records and their sync metadata.

use crate::{Rule, Timestamp, Uuid};
use serde::{Deserialize, Serialize};

/// A named, server-identified collection of rules.
///
/// `uuid` is the identity. `is_subscribed`, `editable` and `deleted` are
/// client-local flags; `deleted` is a tombstone and the record stays in the
/// store after deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Server-assigned unique identifier
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    /// Count reported by the server; may differ from `rules.len()`
    pub rule_count: i64,
    /// Creation time (seconds since epoch)
    pub create_at: Timestamp,
    /// Server-side last modification time (seconds since epoch)
    pub remote_updated_at: Timestamp,
    pub is_official: bool,
    pub is_subscribed: bool,
    /// Soft delete flag (tombstone)
    pub deleted: bool,
    pub editable: bool,
    /// Ordered rules; order decides matching precedence
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Create an empty rule set with the given identity.
    ///
    /// Flags start as for a freshly decoded remote record before
    /// reconciliation: not subscribed, live, editable.
    pub fn new(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            name: String::new(),
            description: String::new(),
            rule_count: 0,
            create_at: 0,
            remote_updated_at: 0,
            is_official: false,
            is_subscribed: false,
            deleted: false,
            editable: true,
            rules: Vec::new(),
        }
    }

    /// Create a rule set authored on this device.
    pub fn new_local(uuid: impl Into<Uuid>, name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            name: name.into(),
            create_at: now,
            ..Self::new(uuid)
        }
    }

    /// Check if the rule set is live (not a tombstone).
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Mark the rule set as deleted (tombstone).
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Apply the flags every remote-origin rule set carries: subscribed,
    /// live and read-only.
    pub fn mark_remote_origin(&mut self) {
        self.is_subscribed = true;
        self.deleted = false;
        self.editable = false;
    }

    /// Replace the rules wholesale.
    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules;
    }
}
