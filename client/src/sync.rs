//! Sync service - mirrors remote rule sets into the local SQLite store.
//!
//! Reconciling one uuid is a read, a decision and maybe a write. Those three
//! steps run under a per-uuid lock so two syncs of the same rule set cannot
//! interleave and act on a stale read. Different uuids proceed in parallel.

use crate::api::{RemoteClient, RequestContext};
use crate::db::{self, Pool};
use crate::error::Result;
use dashmap::DashMap;
use rulesync_engine::{plan, ReconcileAction, ReconcileResult, RuleSet, Uuid};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Fetches rule sets and reconciles them into the local store.
pub struct SyncService {
    client: RemoteClient,
    pool: Pool,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl SyncService {
    pub fn new(client: RemoteClient, pool: Pool) -> Self {
        Self {
            client,
            pool,
            locks: DashMap::new(),
        }
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Number of uuids with a lock currently held or awaited.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    async fn lock_uuid(&self, uuid: &str) -> UuidGuard<'_> {
        let lock = self.locks.entry(uuid.to_string()).or_default().clone();
        UuidGuard {
            locks: &self.locks,
            uuid: uuid.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Reconcile one remote rule set into the store.
    ///
    /// Forces the remote-origin flags, then inserts, skips or replaces. Store
    /// errors propagate and are not retried.
    pub async fn reconcile(&self, mut remote: RuleSet) -> Result<ReconcileAction> {
        remote.mark_remote_origin();

        let _guard = self.lock_uuid(&remote.uuid).await;

        let local = db::get_rule_set(&self.pool, &remote.uuid).await?;
        let action = plan(local.as_ref(), &remote);
        if action.writes() {
            db::upsert_rule_set(&self.pool, &remote).await?;
        }

        tracing::trace!(uuid = %remote.uuid, ?action, "Reconciled rule set");
        Ok(action)
    }

    /// Reconcile rule sets in input order, stopping at the first store error.
    /// Writes made before the failure stay applied.
    pub async fn reconcile_all(
        &self,
        remotes: impl IntoIterator<Item = RuleSet>,
    ) -> Result<ReconcileResult> {
        let mut result = ReconcileResult::new();
        for remote in remotes {
            let uuid = remote.uuid.clone();
            let action = self.reconcile(remote).await?;
            result.record(uuid, action);
        }

        tracing::info!(
            inserted = result.inserted.len(),
            replaced = result.replaced.len(),
            skipped = result.skipped.len(),
            "Sync complete"
        );
        Ok(result)
    }

    /// Fetch one page of the rule set list and reconcile it.
    pub async fn sync_page(
        &self,
        page: u32,
        count: u32,
        ctx: &RequestContext,
    ) -> Result<ReconcileResult> {
        let remotes = self.client.get_rule_sets(page, count, ctx).await?;
        self.reconcile_all(remotes).await
    }

    /// Fetch one rule set by uuid and reconcile it.
    pub async fn sync_detail(&self, uuid: &str, ctx: &RequestContext) -> Result<ReconcileAction> {
        let remote = self.client.get_rule_set_detail(uuid, ctx).await?;
        self.reconcile(remote).await
    }

    /// Refresh every live subscribed rule set in one batch request.
    ///
    /// Sends nothing when there is nothing subscribed.
    pub async fn refresh_subscribed(&self, ctx: &RequestContext) -> Result<ReconcileResult> {
        let uuids = db::get_subscribed_uuids(&self.pool).await?;
        if uuids.is_empty() {
            tracing::debug!("No subscribed rule sets to refresh");
            return Ok(ReconcileResult::new());
        }

        let remotes = self.client.update_rule_set_list_detail(&uuids, ctx).await?;
        self.reconcile_all(remotes).await
    }

    /// Tombstone a rule set locally. Returns `false` if it was never stored.
    pub async fn unsubscribe(&self, uuid: &str) -> Result<bool> {
        let _guard = self.lock_uuid(uuid).await;

        let found = db::soft_delete_rule_set(&self.pool, uuid).await?;
        tracing::info!(uuid = %uuid, found, "Unsubscribed rule set");
        Ok(found)
    }

    /// Live rule sets in the local store, oldest first.
    pub async fn local_rule_sets(&self) -> Result<Vec<RuleSet>> {
        Ok(db::get_live_rule_sets(&self.pool).await?)
    }
}

/// Holds one uuid's lock. On drop, the map entry goes away once nobody else
/// holds or waits for it.
struct UuidGuard<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    uuid: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UuidGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.uuid, |_, lock| Arc::strong_count(lock) == 1);
    }
}
