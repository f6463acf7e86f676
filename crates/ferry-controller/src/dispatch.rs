//! Migration dispatch
//!
//! Runs the oldest pending migration of a plan:
//! 1. a migration that never started resets the plan's migration status
//! 2. the migration becomes the plan's active one
//! 3. until the snapshot is complete, plan inputs are snapshotted onto the
//!    migration; entries already present are never overwritten
//! 4. the engine runs against the snapshot
//! 5. the plan status is persisted
//!
//! Only the head migration is touched; the rest wait for later passes.

use crate::engine::{ExecutionEngine, PlanContext};
use crate::error::ReconcileError;
use crate::selection::pending_migrations;
use crate::store::ObjectStore;
use ferry_api::condition::{FAILED, SUCCEEDED};
use ferry_api::snapshot::{DESTINATION_PROVIDER, PLAN_MAP, PLAN_UID, SOURCE_PROVIDER};
use ferry_api::{Migration, Plan, Snapshot};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Dispatches pending migrations to the execution engine
pub struct Dispatcher {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn ExecutionEngine>,
    fast_requeue: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("fast_requeue", &self.fast_requeue)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create new dispatcher
    #[inline]
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn ExecutionEngine>,
        fast_requeue: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            fast_requeue,
        }
    }

    /// Execute the head pending migration of a validated plan
    ///
    /// # Returns
    /// Requeue delay; zero when nothing else is due.
    ///
    /// # Errors
    /// Any store, snapshot, context or engine failure aborts the pass.
    pub async fn execute(&self, plan: &mut Plan) -> Result<Duration, ReconcileError> {
        let pending = pending_migrations(self.store.as_ref(), plan).await?;
        let Some(head) = pending.first() else {
            tracing::debug!("no pending migrations");
            return Ok(Duration::ZERO);
        };
        let mut migration = head.clone();

        if !migration.status.marked_started() {
            plan.status.migration.mark_reset();
            plan.status.conditions.delete_condition(&[SUCCEEDED, FAILED]);
        }
        plan.status.migration.active = Some(migration.meta.uid);

        if !migration.status.snapshot.contains(PLAN_UID) {
            Self::snapshot(plan, &mut migration)?;
            migration.meta.resource_version = self.store.update_migration(&migration).await?;
            tracing::info!(migration = %migration.meta.key(), "snapshot captured");
        }

        let mut delay = {
            let mut ctx = PlanContext::build(plan, &mut migration)?;
            self.engine.run(&mut ctx).await?
        };

        plan.meta.resource_version = self.store.update_plan_status(plan).await?;

        if pending.len() > 1 && delay.is_zero() {
            delay = self.fast_requeue;
        }
        tracing::debug!(
            migration = %migration.meta.key(),
            pending = pending.len(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "dispatched"
        );
        Ok(delay)
    }

    /// Capture plan inputs onto the migration
    fn snapshot(plan: &Plan, migration: &mut Migration) -> Result<(), ReconcileError> {
        let providers = &plan.referenced.provider;
        let (Some(source), Some(destination)) = (&providers.source, &providers.destination)
        else {
            return Err(ReconcileError::Context(format!(
                "plan {} has unresolved providers",
                plan.meta.key()
            )));
        };

        // Entries left by an interrupted capture are kept. The plan uid
        // goes last and marks the snapshot complete.
        let snapshot = &mut migration.status.snapshot;
        capture(snapshot, SOURCE_PROVIDER, source)?;
        capture(snapshot, DESTINATION_PROVIDER, destination)?;
        capture(snapshot, PLAN_MAP, &plan.spec.map)?;
        capture(snapshot, PLAN_UID, &plan.meta.uid)?;
        Ok(())
    }
}

fn capture<T: Serialize>(
    snapshot: &mut Snapshot,
    key: &str,
    value: &T,
) -> Result<(), ReconcileError> {
    if snapshot.contains(key) {
        tracing::warn!(key, "snapshot entry already present; keeping it");
        return Ok(());
    }
    snapshot.set(key, value)?;
    Ok(())
}
