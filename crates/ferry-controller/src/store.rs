//! Object store
//!
//! [`ObjectStore`] is what the reconciler reads and writes. Writes carry the
//! resource version the caller last saw; a stale version is a
//! [`StoreError::Conflict`] and the write is dropped.
//!
//! [`MemoryStore`] keeps one map per kind, bumps `generation` only when the
//! spec changes, and publishes every change on a broadcast channel.

use async_trait::async_trait;
use dashmap::DashMap;
use ferry_api::{
    AdmissionRequest, Admitter, Host, Migration, ObjectKey, Operation, Plan, Provider, Resource,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const WATCH_CAPACITY: usize = 1024;

/// Store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    /// Object already exists
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    /// Write based on a stale resource version
    #[error("{kind} {key} conflict: resource version {given}, current {current}")]
    Conflict {
        kind: &'static str,
        key: ObjectKey,
        given: u64,
        current: u64,
    },

    /// Admission gate refused the write
    #[error("{kind} {key} rejected: {message}")]
    Rejected {
        kind: &'static str,
        key: ObjectKey,
        message: String,
    },

    /// Backend unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Change to one object
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Created(T),
    Updated { old: T, new: T },
    Deleted(T),
}

impl<T> Change<T> {
    /// The object as it is now (or was, when deleted)
    #[must_use]
    pub fn object(&self) -> &T {
        match self {
            Change::Created(obj) | Change::Deleted(obj) => obj,
            Change::Updated { new, .. } => new,
        }
    }
}

/// Change notification
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Plan(Change<Plan>),
    Provider(Change<Provider>),
    Migration(Change<Migration>),
    Host(Change<Host>),
}

/// Persistent object access used by the reconciler
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a plan
    async fn get_plan(&self, key: &ObjectKey) -> Result<Plan, StoreError>;

    /// All plans
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError>;

    /// All migrations
    async fn list_migrations(&self) -> Result<Vec<Migration>, StoreError>;

    /// All providers
    async fn list_providers(&self) -> Result<Vec<Provider>, StoreError>;

    /// Fetch a provider
    async fn get_provider(&self, key: &ObjectKey) -> Result<Provider, StoreError>;

    /// All hosts
    async fn list_hosts(&self) -> Result<Vec<Host>, StoreError>;

    /// Write the plan status subresource
    ///
    /// # Returns
    /// The new resource version.
    async fn update_plan_status(&self, plan: &Plan) -> Result<u64, StoreError>;

    /// Write a migration, status included
    ///
    /// # Returns
    /// The new resource version.
    async fn update_migration(&self, migration: &Migration) -> Result<u64, StoreError>;

    /// Subscribe to change notifications
    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}

/// A kind the [`MemoryStore`] can hold
pub trait Stored: Resource + Serialize + PartialEq {
    /// Whether writes of this kind pass the admission gate
    const ADMITTED: bool = false;

    fn table(store: &MemoryStore) -> &DashMap<ObjectKey, Self>;

    fn event(change: Change<Self>) -> WatchEvent;

    /// Spec equality; a spec change bumps `generation`
    fn same_spec(&self, other: &Self) -> bool;
}

impl Stored for Plan {
    fn table(store: &MemoryStore) -> &DashMap<ObjectKey, Self> {
        &store.plans
    }

    fn event(change: Change<Self>) -> WatchEvent {
        WatchEvent::Plan(change)
    }

    fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl Stored for Provider {
    const ADMITTED: bool = true;

    fn table(store: &MemoryStore) -> &DashMap<ObjectKey, Self> {
        &store.providers
    }

    fn event(change: Change<Self>) -> WatchEvent {
        WatchEvent::Provider(change)
    }

    fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl Stored for Migration {
    fn table(store: &MemoryStore) -> &DashMap<ObjectKey, Self> {
        &store.migrations
    }

    fn event(change: Change<Self>) -> WatchEvent {
        WatchEvent::Migration(change)
    }

    fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl Stored for Host {
    fn table(store: &MemoryStore) -> &DashMap<ObjectKey, Self> {
        &store.hosts
    }

    fn event(change: Change<Self>) -> WatchEvent {
        WatchEvent::Host(change)
    }

    fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

/// In-process [`ObjectStore`]
pub struct MemoryStore {
    plans: DashMap<ObjectKey, Plan>,
    migrations: DashMap<ObjectKey, Migration>,
    providers: DashMap<ObjectKey, Provider>,
    hosts: DashMap<ObjectKey, Host>,
    version: AtomicU64,
    events: broadcast::Sender<WatchEvent>,
    admission: Option<Arc<dyn Admitter>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("plans", &self.plans.len())
            .field("migrations", &self.migrations.len())
            .field("providers", &self.providers.len())
            .field("hosts", &self.hosts.len())
            .field("version", &self.version.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create new empty store
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            plans: DashMap::new(),
            migrations: DashMap::new(),
            providers: DashMap::new(),
            hosts: DashMap::new(),
            version: AtomicU64::new(0),
            events,
            admission: None,
        }
    }

    /// With admission gate for admitted kinds
    #[must_use]
    pub fn with_admission(mut self, admitter: Arc<dyn Admitter>) -> Self {
        self.admission = Some(admitter);
        self
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, event: WatchEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn admit<T: Stored>(
        &self,
        operation: Operation,
        obj: &T,
        old: Option<&T>,
    ) -> Result<(), StoreError> {
        let Some(admitter) = self.admission.as_ref().filter(|_| T::ADMITTED) else {
            return Ok(());
        };

        let rejected = |message: String| StoreError::Rejected {
            kind: T::KIND,
            key: obj.key(),
            message,
        };
        let object = serde_json::to_value(obj).map_err(|e| rejected(e.to_string()))?;
        let old_object = old
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| rejected(e.to_string()))?;

        let response = admitter.admit(&AdmissionRequest {
            uid: obj.meta().uid.to_string(),
            kind: T::KIND.to_string(),
            operation,
            object,
            old_object,
        });
        if response.allowed {
            Ok(())
        } else {
            Err(rejected(response.message.unwrap_or_default()))
        }
    }

    /// Insert a new object
    ///
    /// # Errors
    /// `AlreadyExists` if the key is taken, `Rejected` if admission refuses.
    pub fn create<T: Stored>(&self, mut obj: T) -> Result<T, StoreError> {
        let key = obj.key();
        self.admit(Operation::Create, &obj, None)?;

        let table = T::table(self);
        let stored = match table.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::AlreadyExists { kind: T::KIND, key });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                obj.meta_mut().generation = 1;
                obj.meta_mut().resource_version = self.next_version();
                slot.insert(obj.clone());
                obj
            }
        };

        self.publish(T::event(Change::Created(stored.clone())));
        Ok(stored)
    }

    /// Replace an object
    ///
    /// `generation` is bumped when the spec differs from the stored one.
    ///
    /// # Errors
    /// `NotFound`, `Conflict` on a stale resource version, or `Rejected`.
    pub fn update<T: Stored>(&self, obj: T) -> Result<T, StoreError> {
        self.replace(obj, true)
    }

    fn replace<T: Stored>(&self, mut obj: T, admit: bool) -> Result<T, StoreError> {
        let key = obj.key();
        let table = T::table(self);
        let Some(mut current) = table.get_mut(&key) else {
            return Err(StoreError::NotFound { kind: T::KIND, key });
        };

        let given = obj.meta().resource_version;
        let actual = current.meta().resource_version;
        if given != actual {
            return Err(StoreError::Conflict {
                kind: T::KIND,
                key,
                given,
                current: actual,
            });
        }
        if admit {
            self.admit(Operation::Update, &obj, Some(&*current))?;
        }

        let old = current.clone();
        let generation = if obj.same_spec(&old) {
            old.meta().generation
        } else {
            old.meta().generation + 1
        };
        {
            let meta = obj.meta_mut();
            meta.uid = old.meta().uid;
            meta.creation_timestamp = old.meta().creation_timestamp;
            meta.generation = generation;
            meta.resource_version = self.next_version();
        }
        *current = obj.clone();
        drop(current);

        self.publish(T::event(Change::Updated {
            old,
            new: obj.clone(),
        }));
        Ok(obj)
    }

    /// Remove an object
    ///
    /// # Errors
    /// `NotFound` if absent.
    pub fn delete<T: Stored>(&self, key: &ObjectKey) -> Result<T, StoreError> {
        let (_, removed) = T::table(self)
            .remove(key)
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                key: key.clone(),
            })?;
        self.publish(T::event(Change::Deleted(removed.clone())));
        Ok(removed)
    }

    /// Fetch an object
    ///
    /// # Errors
    /// `NotFound` if absent.
    pub fn get<T: Stored>(&self, key: &ObjectKey) -> Result<T, StoreError> {
        T::table(self)
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                key: key.clone(),
            })
    }

    /// All objects of a kind, ordered by key
    #[must_use]
    pub fn list<T: Stored>(&self) -> Vec<T> {
        let mut all: Vec<T> = T::table(self)
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(Resource::key);
        all
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_plan(&self, key: &ObjectKey) -> Result<Plan, StoreError> {
        self.get(key)
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        Ok(self.list())
    }

    async fn list_migrations(&self) -> Result<Vec<Migration>, StoreError> {
        Ok(self.list())
    }

    async fn list_providers(&self) -> Result<Vec<Provider>, StoreError> {
        Ok(self.list())
    }

    async fn get_provider(&self, key: &ObjectKey) -> Result<Provider, StoreError> {
        self.get(key)
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, StoreError> {
        Ok(self.list())
    }

    async fn update_plan_status(&self, plan: &Plan) -> Result<u64, StoreError> {
        let mut stored: Plan = self.get(&plan.key())?;
        stored.meta.resource_version = plan.meta.resource_version;
        stored.status = plan.status.clone();
        Ok(self.replace(stored, false)?.meta.resource_version)
    }

    async fn update_migration(&self, migration: &Migration) -> Result<u64, StoreError> {
        Ok(self.replace(migration.clone(), false)?.meta.resource_version)
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_api::{AdmissionResponse, ObjectMeta, PlanSpec, ProviderType};
    use pretty_assertions::assert_eq;

    fn plan(name: &str) -> Plan {
        Plan::new(ObjectMeta::new("ns", name), PlanSpec::default())
    }

    #[test]
    fn create_assigns_version_and_generation() {
        let store = MemoryStore::new();
        let created = store.create(plan("p")).unwrap();
        assert_eq!(created.meta.generation, 1);
        assert!(created.meta.resource_version > 0);
        assert!(matches!(
            store.create(plan("p")),
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn spec_change_bumps_generation() {
        let store = MemoryStore::new();
        let mut p = store.create(plan("p")).unwrap();

        p.spec.target_namespace = "target".to_string();
        let updated = store.update(p).unwrap();
        assert_eq!(updated.meta.generation, 2);

        let mut same = updated.clone();
        same.status.observed_generation = 2;
        let unchanged = store.update(same).unwrap();
        assert_eq!(unchanged.meta.generation, 2);
    }

    #[test]
    fn stale_write_conflicts() {
        let store = MemoryStore::new();
        let p = store.create(plan("p")).unwrap();
        let stale = p.clone();
        store.update(p).unwrap();

        let err = store.update(stale).unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn status_update_keeps_spec_and_generation() {
        let store = MemoryStore::new();
        let p = store.create(plan("p")).unwrap();

        let mut edited = p.clone();
        edited.spec.description = "ignored".to_string();
        edited.status.observed_generation = 1;
        let version = store.update_plan_status(&edited).await.unwrap();

        let stored = store.get_plan(&p.key()).await.unwrap();
        assert_eq!(stored.meta.resource_version, version);
        assert_eq!(stored.meta.generation, 1);
        assert_eq!(stored.spec.description, "");
        assert_eq!(stored.status.observed_generation, 1);
    }

    #[tokio::test]
    async fn watch_sees_changes() {
        let store = MemoryStore::new();
        let mut rx = store.watch();

        let p = store.create(plan("p")).unwrap();
        store.delete::<Plan>(&p.key()).unwrap();

        assert!(matches!(rx.recv().await.unwrap(), WatchEvent::Plan(Change::Created(_))));
        assert!(matches!(rx.recv().await.unwrap(), WatchEvent::Plan(Change::Deleted(_))));
    }

    struct DenyAll;

    impl Admitter for DenyAll {
        fn admit(&self, request: &AdmissionRequest) -> AdmissionResponse {
            AdmissionResponse::deny(request, "no")
        }
    }

    #[test]
    fn admission_applies_to_providers_only() {
        let store = MemoryStore::new().with_admission(Arc::new(DenyAll));
        let provider = Provider::new(ObjectMeta::new("ns", "p"), ProviderType::VSphere, "x");

        assert!(matches!(
            store.create(provider),
            Err(StoreError::Rejected { kind: "Provider", .. })
        ));
        assert!(store.create(plan("p")).is_ok());
    }

    #[test]
    fn list_is_ordered_by_key() {
        let store = MemoryStore::new();
        store.create(plan("b")).unwrap();
        store.create(plan("a")).unwrap();
        let names: Vec<String> = store.list::<Plan>().into_iter().map(|p| p.meta.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
