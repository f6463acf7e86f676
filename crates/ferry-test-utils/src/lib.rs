//! Testing utilities for the Ferry workspace
//!
//! Shared fixtures, a scripted engine, and an in-memory inventory.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ferry_api::condition::READY;
use ferry_api::{
    Category, Condition, ConditionStatus, Migration, NetworkPair, ObjectKey, ObjectMeta, Plan,
    PlanSpec, Provider, ProviderType, StoragePair, VmRef,
};
use ferry_controller::{
    EngineError, ExecutionEngine, MemoryRecorder, MemoryStore, PlanContext, Reconciler, Settings,
};
use ferry_inventory::{Datastore, Inventory, InventoryError, Network, Vm};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub const NAMESPACE: &str = "ferry";
pub const SOURCE: &str = "vcenter";
pub const DESTINATION: &str = "host";
pub const PLAN: &str = "plan-1";

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NAMESPACE, name)
}

/// Fixed timestamp `secs` after a base instant
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Reconciled provider with `Ready=True`
pub fn ready_provider(name: &str, provider_type: ProviderType) -> Provider {
    let url = match provider_type {
        ProviderType::OpenShift => String::new(),
        _ => format!("https://{name}.example/sdk"),
    };
    let mut provider = Provider::new(ObjectMeta::new(NAMESPACE, name), provider_type, url);
    provider.spec.secret = Some(key(&format!("{name}-secret")));
    provider.status.observed_generation = 1;
    provider.status.conditions.set_condition(Condition::new(
        READY,
        ConditionStatus::True,
        Category::Required,
        "The provider is ready.",
    ));
    provider
}

/// Plan from the source provider to the destination provider
pub fn valid_plan() -> Plan {
    let mut spec = PlanSpec {
        description: "test plan".to_string(),
        target_namespace: "apps".to_string(),
        vms: vec![VmRef::by_id("vm-1"), VmRef::by_name("db")],
        ..PlanSpec::default()
    };
    spec.provider.source = Some(key(SOURCE));
    spec.provider.destination = Some(key(DESTINATION));
    spec.map.network.push(NetworkPair {
        source: "net-1".to_string(),
        destination: "pod".to_string(),
    });
    spec.map.storage.push(StoragePair {
        source: "ds-1".to_string(),
        destination: "standard".to_string(),
    });
    Plan::new(ObjectMeta::new(NAMESPACE, PLAN), spec)
}

/// Migration of the fixture plan created at `at(secs)`
pub fn migration(name: &str, secs: i64) -> Migration {
    migration_in(NAMESPACE, name, secs)
}

pub fn migration_in(namespace: &str, name: &str, secs: i64) -> Migration {
    Migration::new(
        ObjectMeta::new(namespace, name).created_at(at(secs)),
        key(PLAN),
    )
}

/// Store seeded with ready providers and the fixture plan
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .create(ready_provider(SOURCE, ProviderType::VSphere))
        .unwrap();
    store
        .create(ready_provider(DESTINATION, ProviderType::OpenShift))
        .unwrap();
    store.create(valid_plan()).unwrap();
    store
}

/// Inventory that knows the fixture plan's VMs, network and datastore
pub fn full_inventory() -> StaticInventory {
    StaticInventory::new()
        .with_vm("vm-1", "web")
        .with_vm("vm-2", "db")
        .with_network("net-1")
        .with_datastore("ds-1")
}

/// Fast settings for tests
pub fn test_settings() -> Settings {
    Settings::new()
}

/// Reconciler over `store` with the given inventory and engine
pub fn reconciler(
    store: &Arc<MemoryStore>,
    inventory: Option<Arc<dyn Inventory>>,
    engine: Arc<dyn ExecutionEngine>,
    recorder: Arc<MemoryRecorder>,
) -> Reconciler {
    Reconciler::new(store.clone(), inventory, engine, recorder, test_settings())
}

/// In-memory [`Inventory`]
#[derive(Debug, Default, Clone)]
pub struct StaticInventory {
    vms: Vec<Vm>,
    networks: HashSet<String>,
    datastores: HashSet<String>,
    not_ready: bool,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vm(mut self, id: &str, name: &str) -> Self {
        self.vms.push(Vm {
            id: id.to_string(),
            name: name.to_string(),
            path: format!("/dc/vm/{name}"),
        });
        self
    }

    pub fn with_network(mut self, id: &str) -> Self {
        self.networks.insert(id.to_string());
        self
    }

    pub fn with_datastore(mut self, id: &str) -> Self {
        self.datastores.insert(id.to_string());
        self
    }

    /// Every lookup answers not-ready
    pub fn loading(mut self) -> Self {
        self.not_ready = true;
        self
    }

    fn check_ready(&self, path: &str) -> Result<(), InventoryError> {
        if self.not_ready {
            Err(InventoryError::NotReady {
                path: path.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn find_vm(&self, _provider: &Provider, vm: &VmRef) -> Result<Vm, InventoryError> {
        self.check_ready("vms")?;
        self.vms
            .iter()
            .find(|v| (!vm.id.is_empty() && v.id == vm.id) || (vm.id.is_empty() && v.name == vm.name))
            .cloned()
            .ok_or_else(|| InventoryError::NotFound {
                path: format!("vms/{vm}"),
            })
    }

    async fn find_network(&self, _provider: &Provider, id: &str) -> Result<Network, InventoryError> {
        self.check_ready("networks")?;
        if self.networks.contains(id) {
            Ok(Network {
                id: id.to_string(),
                name: id.to_string(),
            })
        } else {
            Err(InventoryError::NotFound {
                path: format!("networks/{id}"),
            })
        }
    }

    async fn find_datastore(
        &self,
        _provider: &Provider,
        id: &str,
    ) -> Result<Datastore, InventoryError> {
        self.check_ready("datastores")?;
        if self.datastores.contains(id) {
            Ok(Datastore {
                id: id.to_string(),
                name: id.to_string(),
            })
        } else {
            Err(InventoryError::NotFound {
                path: format!("datastores/{id}"),
            })
        }
    }
}

/// What a [`ScriptedEngine`] run returns
#[derive(Debug, Clone)]
pub enum Step {
    Requeue(Duration),
    Fail(String),
}

/// Engine that replays scripted results and records what it was given
///
/// Once the script runs out, every run returns a zero delay.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Step>>,
    runs: Mutex<Vec<Run>>,
}

/// One recorded engine run
#[derive(Debug, Clone)]
pub struct Run {
    pub migration: ObjectKey,
    pub source: Provider,
    pub destination: Provider,
    pub active: Option<ferry_api::Uid>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn runs(&self) -> Vec<Run> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl ExecutionEngine for ScriptedEngine {
    async fn run(&self, ctx: &mut PlanContext<'_>) -> Result<Duration, EngineError> {
        self.runs.lock().push(Run {
            migration: ctx.migration.meta.key(),
            source: ctx.source.clone(),
            destination: ctx.destination.clone(),
            active: ctx.plan.status.migration.active,
        });
        match self.script.lock().pop_front() {
            None => Ok(Duration::ZERO),
            Some(Step::Requeue(delay)) => Ok(delay),
            Some(Step::Fail(message)) => Err(EngineError::Failed(message)),
        }
    }
}

/// Names of conditions currently on the plan
pub fn condition_types(plan: &Plan) -> Vec<String> {
    plan.status
        .conditions
        .list()
        .iter()
        .map(|c| c.type_.clone())
        .collect()
}

/// Reasons of conditions by type
pub fn condition_reasons(plan: &Plan) -> HashMap<String, String> {
    plan.status
        .conditions
        .list()
        .iter()
        .map(|c| (c.type_.clone(), c.reason.clone()))
        .collect()
}
