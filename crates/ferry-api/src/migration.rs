//! Migration: one request to execute a plan

use crate::meta::{ObjectKey, ObjectMeta, Resource};
use crate::plan::Plan;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Migration spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSpec {
    /// Parent plan
    pub plan: ObjectKey,
}

/// Migration status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Snapshot::is_empty")]
    pub snapshot: Snapshot,
}

impl MigrationStatus {
    #[inline]
    #[must_use]
    pub fn marked_started(&self) -> bool {
        self.started.is_some()
    }

    #[inline]
    #[must_use]
    pub fn marked_completed(&self) -> bool {
        self.completed.is_some()
    }

    /// Record the start of execution
    pub fn mark_started(&mut self) {
        if self.started.is_none() {
            self.started = Some(Utc::now());
        }
    }

    /// Record the end of execution
    pub fn mark_completed(&mut self) {
        if self.completed.is_none() {
            self.completed = Some(Utc::now());
        }
    }
}

/// Migration object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub meta: ObjectMeta,
    pub spec: MigrationSpec,
    #[serde(default)]
    pub status: MigrationStatus,
}

impl Migration {
    /// Create new migration for a plan
    #[inline]
    #[must_use]
    pub fn new(meta: ObjectMeta, plan: ObjectKey) -> Self {
        Self {
            meta,
            spec: MigrationSpec { plan },
            status: MigrationStatus::default(),
        }
    }

    /// Check if this migration belongs to the plan
    #[inline]
    #[must_use]
    pub fn matches(&self, plan: &Plan) -> bool {
        self.spec.plan.namespace == plan.meta.namespace && self.spec.plan.name == plan.meta.name
    }
}

impl Resource for Migration {
    const KIND: &'static str = "Migration";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanSpec;

    #[test]
    fn matches_by_namespaced_name() {
        let plan = Plan::new(ObjectMeta::new("ns", "p"), PlanSpec::default());
        let own = Migration::new(ObjectMeta::new("ns", "m"), ObjectKey::new("ns", "p"));
        let other = Migration::new(ObjectMeta::new("ns", "m2"), ObjectKey::new("other", "p"));

        assert!(own.matches(&plan));
        assert!(!other.matches(&plan));
    }

    #[test]
    fn start_and_complete_are_sticky() {
        let mut status = MigrationStatus::default();
        assert!(!status.marked_started());

        status.mark_started();
        let started = status.started;
        status.mark_started();
        assert_eq!(status.started, started);

        status.mark_completed();
        assert!(status.marked_completed());
    }
}
