//! Snapshot types for persisting and restoring store state.
//!
//! Snapshots are the bridge between the in-memory store and whatever the host
//! persists to disk. `BTreeMap` keeps serialization order deterministic.

use crate::{error::Result, Error, RuleSet, Uuid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time copy of every rule set, tombstones included.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// All rule sets keyed by uuid
    pub rule_sets: BTreeMap<Uuid, RuleSet>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            rule_sets: BTreeMap::new(),
        }
    }

    /// Add a rule set to the snapshot.
    pub fn add_rule_set(&mut self, rule_set: RuleSet) {
        self.rule_sets.insert(rule_set.uuid.clone(), rule_set);
    }

    pub fn get_rule_set(&self, uuid: &str) -> Option<&RuleSet> {
        self.rule_sets.get(uuid)
    }

    /// Count records, tombstones included.
    pub fn record_count(&self) -> usize {
        self.rule_sets.len()
    }

    /// Count live (non-deleted) records.
    pub fn active_record_count(&self) -> usize {
        self.rule_sets.values().filter(|r| r.is_active()).count()
    }

    /// Check that every entry is keyed by its own uuid.
    pub fn validate(&self) -> Result<()> {
        if self.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        for (key, rule_set) in &self.rule_sets {
            if key != &rule_set.uuid {
                return Err(Error::InvalidSnapshot(format!(
                    "rule set keyed as '{}' has uuid '{}'",
                    key, rule_set.uuid
                )));
            }
        }

        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rule, RuleAction, RuleType};

    fn sample() -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::new();
        let mut ads = RuleSet::new("a1");
        ads.rules = vec![Rule::new(RuleType::Domain, RuleAction::Reject, "*.ads.com")];
        snapshot.add_rule_set(ads);

        let mut gone = RuleSet::new("b2");
        gone.mark_deleted();
        snapshot.add_rule_set(gone);
        snapshot
    }

    #[test]
    fn create_empty_snapshot() {
        let snapshot = StoreSnapshot::new();
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(snapshot.record_count(), 0);
    }

    #[test]
    fn counts() {
        let snapshot = sample();
        assert_eq!(snapshot.record_count(), 2);
        assert_eq!(snapshot.active_record_count(), 1);
        assert!(snapshot.get_rule_set("b2").unwrap().deleted);
    }

    #[test]
    fn json_roundtrip() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        let parsed = StoreSnapshot::from_json(&json).unwrap();
        assert_eq!(snapshot, parsed);
    }

    #[test]
    fn deterministic_output() {
        let json1 = sample().to_json().unwrap();
        let json2 = sample().to_json().unwrap();
        assert_eq!(json1, json2);
        assert!(json1.find("\"a1\"").unwrap() < json1.find("\"b2\"").unwrap());
    }

    #[test]
    fn reject_future_format() {
        let mut snapshot = sample();
        snapshot.format_version = SNAPSHOT_FORMAT_VERSION + 1;
        let json = snapshot.to_json().unwrap();

        let result = StoreSnapshot::from_json(&json);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn reject_mismatched_key() {
        let mut snapshot = StoreSnapshot::new();
        snapshot
            .rule_sets
            .insert("wrong".into(), RuleSet::new("right"));

        assert!(matches!(
            snapshot.validate(),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn reject_garbage() {
        assert!(matches!(
            StoreSnapshot::from_json("{]"),
            Err(Error::InvalidSnapshot(_))
        ));
    }
}
