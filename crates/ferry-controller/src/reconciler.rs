//! Plan reconciliation pass
//!
//! A pass never fails: every outcome becomes an [`Action`]. The order is
//! fixed:
//!
//! ```text
//! fetch -> postpone? -> stage { validate, Ready } -> events -> persist
//!       -> blocked? -> dispatch
//! ```
//!
//! Failures before the status write leave the stored plan untouched. Only a
//! plan missing at the fetch ends the pass without a requeue; anything that
//! vanishes later is a failed write and gets the fast requeue.

use crate::dispatch::Dispatcher;
use crate::engine::ExecutionEngine;
use crate::error::{ErrorKind, ReconcileError};
use crate::events::{record_condition_changes, EventRecorder};
use crate::logging::reconcile_span;
use crate::readiness::DependencyGate;
use crate::settings::Settings;
use crate::store::ObjectStore;
use crate::validation::PlanValidator;
use ferry_api::condition::READY;
use ferry_api::{Category, Condition, ConditionStatus, ObjectKey};
use ferry_inventory::Inventory;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Scheduling decision for a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run again after the delay
    Requeue(Duration),
    /// Wait for the next change notification
    Done,
}

impl Action {
    fn after(delay: Duration) -> Self {
        if delay.is_zero() {
            Action::Done
        } else {
            Action::Requeue(delay)
        }
    }
}

/// Outcome label for metrics
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Done,
    Gone,
    Requeued,
    Postponed,
    Blocked,
    Failed(ErrorKind),
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::Done => "done",
            Outcome::Gone => "gone",
            Outcome::Requeued => "requeued",
            Outcome::Postponed => "postponed",
            Outcome::Blocked => "blocked",
            Outcome::Failed(kind) => kind.as_str(),
        }
    }
}

/// Reconciles plans
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    gate: DependencyGate,
    validator: PlanValidator,
    dispatcher: Dispatcher,
    recorder: Arc<dyn EventRecorder>,
    settings: Settings,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create new reconciler
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        inventory: Option<Arc<dyn Inventory>>,
        engine: Arc<dyn ExecutionEngine>,
        recorder: Arc<dyn EventRecorder>,
        settings: Settings,
    ) -> Self {
        Self {
            gate: DependencyGate::new(Arc::clone(&store)),
            validator: PlanValidator::new(Arc::clone(&store), inventory),
            dispatcher: Dispatcher::new(Arc::clone(&store), engine, settings.fast_requeue()),
            store,
            recorder,
            settings,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one pass for a plan
    pub async fn reconcile(&self, key: &ObjectKey) -> Action {
        let started = Instant::now();
        let span = reconcile_span(key);
        let (action, outcome) = self.pass(key).instrument(span.clone()).await;
        span.record("outcome", outcome.label());

        metrics::counter!("ferry_reconcile_total", "result" => outcome.label()).increment(1);
        metrics::histogram!("ferry_reconcile_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        action
    }

    async fn pass(&self, key: &ObjectKey) -> (Action, Outcome) {
        let mut plan = match self.store.get_plan(key).await {
            Ok(plan) => plan,
            Err(e) if e.is_not_found() => {
                tracing::debug!("plan gone");
                return (Action::Done, Outcome::Gone);
            }
            Err(e) => return self.failed(&ReconcileError::from(e)),
        };

        match self.gate.postpone().await {
            Ok(false) => {}
            Ok(true) => {
                tracing::info!("waiting for dependencies");
                return (Action::Requeue(self.settings.slow_requeue()), Outcome::Postponed);
            }
            Err(e) => {
                tracing::warn!(error = %e, "dependency check failed");
                return (Action::Requeue(self.settings.slow_requeue()), Outcome::Postponed);
            }
        }

        plan.status.conditions.begin_staging();
        if let Err(e) = self.validator.validate(&mut plan).await {
            return self.failed(&e);
        }
        let conditions = &mut plan.status.conditions;
        if !conditions.has_blocker_condition() {
            conditions.set_condition(Condition::new(
                READY,
                ConditionStatus::True,
                Category::Required,
                "The migration plan is ready.",
            ));
        }
        let diff = conditions.end_staging();
        record_condition_changes(self.recorder.as_ref(), &plan.meta.key(), &diff);

        plan.status.observed_generation = plan.meta.generation;
        match self.store.update_plan_status(&plan).await {
            Ok(version) => plan.meta.resource_version = version,
            Err(e) => return self.failed(&ReconcileError::from(e)),
        }

        if plan.status.conditions.has_blocker_condition() {
            tracing::info!("plan has blocker conditions");
            return (Action::Done, Outcome::Blocked);
        }

        match self.dispatcher.execute(&mut plan).await {
            Ok(delay) => {
                let action = Action::after(delay);
                let outcome = match action {
                    Action::Done => Outcome::Done,
                    Action::Requeue(_) => Outcome::Requeued,
                };
                (action, outcome)
            }
            Err(e) => self.failed(&e),
        }
    }

    fn failed(&self, error: &ReconcileError) -> (Action, Outcome) {
        let kind = error.kind();
        let action = match kind {
            ErrorKind::NotReady => {
                tracing::info!(error = %error, "not ready");
                Action::Requeue(self.settings.slow_requeue())
            }
            ErrorKind::Validation | ErrorKind::Persistence => {
                tracing::error!(error = %error, kind = kind.as_str(), "reconcile failed");
                Action::Requeue(self.settings.fast_requeue())
            }
        };
        (action, Outcome::Failed(kind))
    }
}
