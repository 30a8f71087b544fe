//! Reconciliation of remote rule sets into the local store.
//!
//! # Algorithm
//!
//! For each remote rule set, in input order:
//!
//! 1. Force the remote-origin flags (subscribed, live, read-only)
//! 2. Look up the local record by uuid, tombstones included
//! 3. Absent: insert
//! 4. Present with equal `remote_updated_at` and equal `deleted`: skip
//! 5. Otherwise: replace the local record wholesale
//!
//! Only those two fields take part in the equality check. A server change that
//! does not bump `updated_at` is therefore not picked up until it does.
//! Because step 1 always clears `deleted`, a local tombstone never matches and
//! is overwritten by the next sync of that uuid.

use crate::{error::Result, RuleSet, RuleSetStore, Uuid};
use serde::{Deserialize, Serialize};

/// What reconciling one remote rule set did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileAction {
    /// No local record existed; the remote one was inserted
    Insert,
    /// Local record already in sync; nothing written
    Skip,
    /// Local record replaced by the remote one
    Replace,
}

impl ReconcileAction {
    /// Whether this action writes to the store.
    pub fn writes(&self) -> bool {
        !matches!(self, ReconcileAction::Skip)
    }
}

/// Decide what to do with `remote` given the current local record.
///
/// `remote` is expected to already carry the remote-origin flags.
pub fn plan(local: Option<&RuleSet>, remote: &RuleSet) -> ReconcileAction {
    match local {
        None => ReconcileAction::Insert,
        Some(local)
            if local.remote_updated_at == remote.remote_updated_at
                && local.deleted == remote.deleted =>
        {
            ReconcileAction::Skip
        }
        Some(_) => ReconcileAction::Replace,
    }
}

/// Uuids grouped by what reconciliation did with them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub inserted: Vec<Uuid>,
    pub replaced: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
}

impl ReconcileResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the outcome for one uuid.
    pub fn record(&mut self, uuid: Uuid, action: ReconcileAction) {
        match action {
            ReconcileAction::Insert => self.inserted.push(uuid),
            ReconcileAction::Replace => self.replaced.push(uuid),
            ReconcileAction::Skip => self.skipped.push(uuid),
        }
    }

    /// Number of store writes performed.
    pub fn written(&self) -> usize {
        self.inserted.len() + self.replaced.len()
    }

    /// Total rule sets seen.
    pub fn total(&self) -> usize {
        self.written() + self.skipped.len()
    }
}

/// Applies remote rule sets to a [`RuleSetStore`].
pub struct Reconciler<'a, S: RuleSetStore> {
    store: &'a mut S,
}

impl<'a, S: RuleSetStore> Reconciler<'a, S> {
    /// Create a reconciler writing into `store`.
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Reconcile one remote rule set. Store errors propagate unchanged.
    pub fn reconcile(&mut self, mut remote: RuleSet) -> Result<ReconcileAction> {
        remote.mark_remote_origin();

        let local = self.store.get(&remote.uuid)?;
        let action = plan(local.as_ref(), &remote);

        if action.writes() {
            self.store.upsert(remote)?;
        }

        Ok(action)
    }

    /// Reconcile rule sets in input order.
    ///
    /// Stops at the first store error. Writes made before the failure stay
    /// applied; each record is its own transaction.
    pub fn reconcile_all(
        &mut self,
        remotes: impl IntoIterator<Item = RuleSet>,
    ) -> Result<ReconcileResult> {
        let mut result = ReconcileResult::new();
        for remote in remotes {
            let uuid = remote.uuid.clone();
            let action = self.reconcile(remote)?;
            tracing::trace!(uuid = %uuid, ?action, "Reconciled rule set");
            result.record(uuid, action);
        }
        Ok(result)
    }
}
