//! Local store abstraction and the in-memory implementation.
//!
//! The sync engine only needs three primitives from persistence: get by id,
//! insert-or-replace, and soft delete. Each write must be atomic for a single
//! record; nothing here spans records.

use crate::{error::Result, Error, RuleSet, StoreSnapshot, Uuid};
use std::collections::HashMap;

/// Persistence used by the [`Reconciler`](crate::Reconciler).
pub trait RuleSetStore {
    /// Get a rule set by uuid, tombstones included.
    fn get(&self, uuid: &str) -> Result<Option<RuleSet>>;

    /// Insert the rule set, replacing any record with the same uuid.
    fn upsert(&mut self, rule_set: RuleSet) -> Result<()>;

    /// Mark a rule set deleted without removing it.
    ///
    /// Returns `false` when no record has this uuid.
    fn soft_delete(&mut self, uuid: &str) -> Result<bool>;

    /// All live rule sets, oldest first.
    fn all_not_deleted(&self) -> Result<Vec<RuleSet>>;

    /// Uuids of live, subscribed rule sets (the batch refresh input).
    fn subscribed_uuids(&self) -> Result<Vec<Uuid>> {
        Ok(self
            .all_not_deleted()?
            .into_iter()
            .filter(|r| r.is_subscribed)
            .map(|r| r.uuid)
            .collect())
    }
}

/// A `HashMap`-backed store.
///
/// Counts every write so callers can tell a skipped reconcile from a rewrite.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rule_sets: HashMap<Uuid, RuleSet>,
    writes: u64,
    read_only: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `upsert`/`soft_delete` writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Make every subsequent write fail with [`Error::Store`].
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Count of records, tombstones included.
    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::Store("store is read-only".into()));
        }
        Ok(())
    }

    /// Export the current contents as a snapshot.
    pub fn export_state(&self) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::new();
        for rule_set in self.rule_sets.values() {
            snapshot.add_rule_set(rule_set.clone());
        }
        snapshot
    }

    /// Replace the current contents with a snapshot's.
    pub fn import_state(&mut self, snapshot: StoreSnapshot) -> Result<()> {
        snapshot.validate()?;
        self.rule_sets = snapshot.rule_sets.into_iter().collect();
        Ok(())
    }
}

impl RuleSetStore for MemoryStore {
    fn get(&self, uuid: &str) -> Result<Option<RuleSet>> {
        Ok(self.rule_sets.get(uuid).cloned())
    }

    fn upsert(&mut self, rule_set: RuleSet) -> Result<()> {
        self.check_writable()?;
        self.rule_sets.insert(rule_set.uuid.clone(), rule_set);
        self.writes += 1;
        Ok(())
    }

    fn soft_delete(&mut self, uuid: &str) -> Result<bool> {
        self.check_writable()?;
        match self.rule_sets.get_mut(uuid) {
            Some(rule_set) => {
                rule_set.mark_deleted();
                self.writes += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn all_not_deleted(&self) -> Result<Vec<RuleSet>> {
        let mut live: Vec<_> = self
            .rule_sets
            .values()
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        live.sort_by(|a, b| a.create_at.cmp(&b.create_at).then_with(|| a.uuid.cmp(&b.uuid)));
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_set(uuid: &str, create_at: i64) -> RuleSet {
        let mut rule_set = RuleSet::new(uuid);
        rule_set.create_at = create_at;
        rule_set
    }

    #[test]
    fn upsert_and_get() {
        let mut store = MemoryStore::new();
        store.upsert(rule_set("a1", 10)).unwrap();

        let found = store.get("a1").unwrap().unwrap();
        assert_eq!(found.uuid, "a1");
        assert!(store.get("missing").unwrap().is_none());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn upsert_replaces_by_uuid() {
        let mut store = MemoryStore::new();
        store.upsert(rule_set("a1", 10)).unwrap();

        let mut replacement = rule_set("a1", 10);
        replacement.name = "Renamed".into();
        store.upsert(replacement).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a1").unwrap().unwrap().name, "Renamed");
    }

    #[test]
    fn soft_delete_keeps_tombstone() {
        let mut store = MemoryStore::new();
        store.upsert(rule_set("a1", 10)).unwrap();

        assert!(store.soft_delete("a1").unwrap());
        assert!(!store.soft_delete("missing").unwrap());

        let tombstone = store.get("a1").unwrap().unwrap();
        assert!(tombstone.deleted);
        assert_eq!(store.len(), 1);
        assert!(store.all_not_deleted().unwrap().is_empty());
    }

    #[test]
    fn all_not_deleted_sorted_by_creation() {
        let mut store = MemoryStore::new();
        store.upsert(rule_set("late", 300)).unwrap();
        store.upsert(rule_set("early", 100)).unwrap();
        store.upsert(rule_set("gone", 200)).unwrap();
        store.soft_delete("gone").unwrap();

        let uuids: Vec<_> = store
            .all_not_deleted()
            .unwrap()
            .into_iter()
            .map(|r| r.uuid)
            .collect();
        assert_eq!(uuids, vec!["early", "late"]);
    }

    #[test]
    fn subscribed_uuids_skip_local_sets() {
        let mut store = MemoryStore::new();
        let mut remote = rule_set("remote", 1);
        remote.mark_remote_origin();
        store.upsert(remote).unwrap();
        store.upsert(RuleSet::new_local("local", "Mine", 2)).unwrap();

        assert_eq!(store.subscribed_uuids().unwrap(), vec!["remote"]);
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let mut store = MemoryStore::new();
        store.set_read_only(true);

        let result = store.upsert(rule_set("a1", 1));
        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn export_import_roundtrip() {
        let mut store = MemoryStore::new();
        store.upsert(rule_set("a1", 1)).unwrap();
        store.upsert(rule_set("a2", 2)).unwrap();
        store.soft_delete("a2").unwrap();

        let snapshot = store.export_state();
        let mut restored = MemoryStore::new();
        restored.import_state(snapshot).unwrap();

        assert_eq!(restored.len(), 2);
        assert!(restored.get("a2").unwrap().unwrap().deleted);
    }
}
