//! Watch predicates and event-to-plan mapping
//!
//! Triggers carry only plan keys; the reconciler re-fetches everything.

use crate::store::{Change, ObjectStore, StoreError, WatchEvent};
use ferry_api::{Generational, Migration, ObjectKey, Plan, Provider};

/// Plan changes: create, delete, and updates that change the spec
#[must_use]
pub fn plan_predicate(change: &Change<Plan>) -> bool {
    match change {
        Change::Created(_) | Change::Deleted(_) => true,
        Change::Updated { old, new } => old.meta.generation != new.meta.generation,
    }
}

/// Provider changes: updates once the provider is reconciled, and deletes
#[must_use]
pub fn provider_predicate(change: &Change<Provider>) -> bool {
    match change {
        Change::Created(_) => false,
        Change::Updated { new, .. } => new.reconciled(),
        Change::Deleted(_) => true,
    }
}

/// Migration changes: create and update
#[must_use]
pub fn migration_predicate(change: &Change<Migration>) -> bool {
    matches!(change, Change::Created(_) | Change::Updated { .. })
}

/// Plans to reconcile for a watch event
///
/// # Errors
/// Listing failures when a provider change has to be mapped.
pub async fn plan_keys(
    store: &dyn ObjectStore,
    event: &WatchEvent,
) -> Result<Vec<ObjectKey>, StoreError> {
    match event {
        WatchEvent::Plan(change) if plan_predicate(change) => Ok(vec![change.object().meta.key()]),
        WatchEvent::Provider(change) if provider_predicate(change) => {
            let provider = change.object().meta.key();
            Ok(store
                .list_plans()
                .await?
                .into_iter()
                .filter(|plan| plan.references_provider(&provider))
                .map(|plan| plan.meta.key())
                .collect())
        }
        WatchEvent::Migration(change) if migration_predicate(change) => {
            Ok(vec![change.object().spec.plan.clone()])
        }
        _ => Ok(Vec::new()),
    }
}
