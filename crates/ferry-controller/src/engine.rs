//! Execution engine contract
//!
//! The dispatcher hands the engine a [`PlanContext`] built from the plan and
//! the migration snapshot. The engine returns how long to wait before the
//! next pass; [`Duration::ZERO`] means it has nothing pending.

use crate::error::ReconcileError;
use crate::store::{ObjectStore, StoreError};
use async_trait::async_trait;
use ferry_api::condition::{EXECUTING, FAILED, SUCCEEDED};
use ferry_api::snapshot::{DESTINATION_PROVIDER, PLAN_MAP, SOURCE_PROVIDER};
use ferry_api::{Category, Condition, ConditionStatus, Migration, Plan, PlanMap, Provider};
use std::sync::Arc;
use std::time::Duration;

/// Engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Inputs for one engine run
///
/// Providers and the field map come from the migration snapshot, so edits to
/// the plan after the migration started do not reach the engine.
#[derive(Debug)]
pub struct PlanContext<'a> {
    pub plan: &'a mut Plan,
    pub migration: &'a mut Migration,
    pub source: Provider,
    pub destination: Provider,
    pub map: PlanMap,
}

impl<'a> PlanContext<'a> {
    /// Build context from a snapshotted migration
    ///
    /// # Errors
    /// `ReconcileError::Context` if a snapshot entry is missing,
    /// `ReconcileError::Snapshot` if one does not decode.
    pub fn build(plan: &'a mut Plan, migration: &'a mut Migration) -> Result<Self, ReconcileError> {
        let snapshot = &migration.status.snapshot;
        let missing = |key: &str| {
            ReconcileError::Context(format!(
                "migration {} snapshot has no '{key}'",
                migration.meta.key()
            ))
        };

        let source: Provider = snapshot
            .get(SOURCE_PROVIDER)?
            .ok_or_else(|| missing(SOURCE_PROVIDER))?;
        let destination: Provider = snapshot
            .get(DESTINATION_PROVIDER)?
            .ok_or_else(|| missing(DESTINATION_PROVIDER))?;
        let map: PlanMap = snapshot.get(PLAN_MAP)?.ok_or_else(|| missing(PLAN_MAP))?;

        Ok(Self {
            plan,
            migration,
            source,
            destination,
            map,
        })
    }
}

/// Runs one step of a migration
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Advance the active migration
    ///
    /// # Returns
    /// Delay before the next pass; zero for none.
    async fn run(&self, ctx: &mut PlanContext<'_>) -> Result<Duration, EngineError>;
}

/// Engine that completes a migration in two runs
///
/// The first run marks the migration started and raises `Executing`; the
/// next one marks it completed and raises a durable `Succeeded`.
pub struct SimulatedEngine {
    store: Arc<dyn ObjectStore>,
    step: Duration,
}

impl std::fmt::Debug for SimulatedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedEngine")
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

impl SimulatedEngine {
    /// Create new simulated engine
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, step: Duration) -> Self {
        Self { store, step }
    }
}

#[async_trait]
impl ExecutionEngine for SimulatedEngine {
    async fn run(&self, ctx: &mut PlanContext<'_>) -> Result<Duration, EngineError> {
        let conditions = &mut ctx.plan.status.conditions;

        if ctx.migration.status.marked_started() {
            ctx.migration.status.mark_completed();
            conditions.delete_condition(&[EXECUTING, FAILED]);
            conditions.set_condition(
                Condition::new(
                    SUCCEEDED,
                    ConditionStatus::True,
                    Category::Advisory,
                    "The plan execution has SUCCEEDED.",
                )
                .durable(),
            );
            tracing::info!(
                migration = %ctx.migration.meta.key(),
                vms = ctx.plan.spec.vms.len(),
                "migration completed"
            );
        } else {
            ctx.migration.status.mark_started();
            conditions.set_condition(
                Condition::new(
                    EXECUTING,
                    ConditionStatus::True,
                    Category::Advisory,
                    "The plan is EXECUTING.",
                )
                .durable(),
            );
            tracing::info!(
                migration = %ctx.migration.meta.key(),
                source = %ctx.source.meta.key(),
                destination = %ctx.destination.meta.key(),
                "migration started"
            );
        }

        let version = self.store.update_migration(&*ctx.migration).await?;
        ctx.migration.meta.resource_version = version;

        if ctx.migration.status.marked_completed() {
            Ok(Duration::ZERO)
        } else {
            Ok(self.step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_api::snapshot::PLAN_UID;
    use ferry_api::{ObjectKey, ObjectMeta, PlanSpec, ProviderType};

    fn provider(name: &str, provider_type: ProviderType) -> Provider {
        Provider::new(ObjectMeta::new("ns", name), provider_type, "")
    }

    #[test]
    fn context_reads_snapshot_not_plan() {
        let mut plan = Plan::new(ObjectMeta::new("ns", "p"), PlanSpec::default());
        let mut migration = Migration::new(ObjectMeta::new("ns", "m"), ObjectKey::new("ns", "p"));
        let snapshot = &mut migration.status.snapshot;
        snapshot.set(PLAN_UID, &plan.meta.uid).unwrap();
        snapshot
            .set(SOURCE_PROVIDER, &provider("vc", ProviderType::VSphere))
            .unwrap();
        snapshot
            .set(DESTINATION_PROVIDER, &provider("host", ProviderType::OpenShift))
            .unwrap();
        snapshot.set(PLAN_MAP, &PlanMap::default()).unwrap();

        plan.referenced.provider.source = Some(provider("edited", ProviderType::VSphere));

        let ctx = PlanContext::build(&mut plan, &mut migration).unwrap();
        assert_eq!(ctx.source.meta.name, "vc");
        assert_eq!(ctx.destination.meta.name, "host");
    }

    #[test]
    fn context_requires_snapshot() {
        let mut plan = Plan::new(ObjectMeta::new("ns", "p"), PlanSpec::default());
        let mut migration = Migration::new(ObjectMeta::new("ns", "m"), ObjectKey::new("ns", "p"));

        let err = PlanContext::build(&mut plan, &mut migration).unwrap_err();
        assert!(matches!(err, ReconcileError::Context(_)));
    }
}
