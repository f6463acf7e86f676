//! Plan: the migration policy object
//!
//! A plan spec names the source and destination providers, a field map and the
//! VMs to move. The status carries staged conditions, the observed
//! generation and the identity of the active migration.

use crate::condition::Conditions;
use crate::meta::{ObjectKey, ObjectMeta, Resource, Uid};
use crate::provider::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source/destination provider references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ObjectKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<ObjectKey>,
}

/// Source network id to destination network name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPair {
    pub source: String,
    pub destination: String,
}

/// Source datastore id to destination storage class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePair {
    pub source: String,
    pub destination: String,
}

/// Field map applied while migrating
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMap {
    #[serde(default)]
    pub network: Vec<NetworkPair>,
    #[serde(default)]
    pub storage: Vec<StoragePair>,
}

/// VM reference, by inventory id or by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VmRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl VmRef {
    /// Reference by id
    #[inline]
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
        }
    }

    /// Reference by name
    #[inline]
    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
        }
    }

    /// Check if the reference names anything at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.name.is_empty()
    }
}

impl std::fmt::Display for VmRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.id.is_empty(), self.name.is_empty()) {
            (false, _) => write!(f, "id:{}", self.id),
            (true, false) => write!(f, "name:{}", self.name),
            (true, true) => f.write_str("<empty>"),
        }
    }
}

/// Plan spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub provider: ProviderPair,
    #[serde(default)]
    pub target_namespace: String,
    #[serde(default)]
    pub map: PlanMap,
    #[serde(default)]
    pub vms: Vec<VmRef>,
}

/// Plan-level view of migration execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMigrationStatus {
    /// Uid of the migration currently owning the plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<Uid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
}

impl PlanMigrationStatus {
    /// Forget the previous run before a new migration begins
    #[inline]
    pub fn mark_reset(&mut self) {
        self.active = None;
        self.started = None;
        self.completed = None;
    }
}

/// Plan status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub migration: PlanMigrationStatus,
}

/// Provider objects resolved during validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferencedProviders {
    pub source: Option<Provider>,
    pub destination: Option<Provider>,
}

/// Objects resolved from the plan spec for the current pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Referenced {
    pub provider: ReferencedProviders,
}

/// Plan object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: PlanSpec,
    #[serde(default)]
    pub status: PlanStatus,
    /// Never persisted
    #[serde(skip)]
    pub referenced: Referenced,
}

impl Plan {
    /// Create new plan
    #[inline]
    #[must_use]
    pub fn new(meta: ObjectMeta, spec: PlanSpec) -> Self {
        Self {
            meta,
            spec,
            status: PlanStatus::default(),
            referenced: Referenced::default(),
        }
    }

    /// Check if a provider is referenced as source or destination
    #[must_use]
    pub fn references_provider(&self, provider: &ObjectKey) -> bool {
        self.spec.provider.source.as_ref() == Some(provider)
            || self.spec.provider.destination.as_ref() == Some(provider)
    }
}

impl Resource for Plan {
    const KIND: &'static str = "Plan";

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

    #[test]
    fn referenced_is_not_persisted() {
        let mut plan = Plan::new(ObjectMeta::new("ns", "p"), PlanSpec::default());
        plan.referenced.provider.source = Some(Provider::new(
            ObjectMeta::new("ns", "src"),
            crate::ProviderType::VSphere,
            "https://vcenter",
        ));

        let json = serde_json::to_string(&plan).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert!(back.referenced.provider.source.is_none());
        assert_eq!(back.meta, plan.meta);
    }

    #[test]
    fn mark_reset_clears_active() {
        let mut status = PlanMigrationStatus {
            active: Some(Uid::new()),
            started: Some(Utc::now()),
            completed: None,
        };
        status.mark_reset();
        assert_eq!(status, PlanMigrationStatus::default());
    }

    #[test]
    fn references_provider_matches_either_side() {
        let mut spec = PlanSpec::default();
        spec.provider.source = Some(ObjectKey::new("ns", "src"));
        spec.provider.destination = Some(ObjectKey::new("ns", "dst"));
        let plan = Plan::new(ObjectMeta::new("ns", "p"), spec);

        assert!(plan.references_provider(&ObjectKey::new("ns", "src")));
        assert!(plan.references_provider(&ObjectKey::new("ns", "dst")));
        assert!(!plan.references_provider(&ObjectKey::new("other", "src")));
    }
}
