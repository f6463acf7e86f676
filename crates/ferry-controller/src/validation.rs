//! Plan validation
//!
//! Raises a `Critical` condition for each problem found in the plan spec and
//! records the resolved providers on `plan.referenced`. Must run inside a
//! staging pass: conditions that are no longer raised drop out when staging
//! ends.
//!
//! Inventory checks only run once the source provider is valid and ready.

use crate::error::ReconcileError;
use crate::store::ObjectStore;
use ferry_api::{
    Category, Condition, ConditionStatus, ObjectKey, Plan, Provider, ProviderType, VmRef,
};
use ferry_inventory::{Inventory, InventoryError};
use ferry_webhook::provider::is_dns1123_label;
use std::collections::HashSet;
use std::sync::Arc;

pub const SOURCE_PROVIDER_NOT_VALID: &str = "SourceProviderNotValid";
pub const DESTINATION_PROVIDER_NOT_VALID: &str = "DestinationProviderNotValid";
pub const SOURCE_PROVIDER_NOT_READY: &str = "SourceProviderNotReady";
pub const DESTINATION_PROVIDER_NOT_READY: &str = "DestinationProviderNotReady";
pub const TARGET_NAMESPACE_NOT_VALID: &str = "TargetNamespaceNotValid";
pub const VM_NOT_FOUND: &str = "VMNotFound";
pub const DUPLICATE_VM: &str = "DuplicateVM";
pub const NETWORK_MAP_NOT_VALID: &str = "NetworkMapNotValid";
pub const STORAGE_MAP_NOT_VALID: &str = "StorageMapNotValid";

// Reasons
pub const NOT_SET: &str = "NotSet";
pub const NOT_FOUND: &str = "NotFound";
pub const TYPE_NOT_VALID: &str = "TypeNotValid";
pub const NOT_VALID: &str = "NotValid";
pub const NOT_UNIQUE: &str = "NotUnique";
pub const NOT_READY: &str = "NotReady";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Source,
    Destination,
}

impl Side {
    fn not_valid(self) -> &'static str {
        match self {
            Side::Source => SOURCE_PROVIDER_NOT_VALID,
            Side::Destination => DESTINATION_PROVIDER_NOT_VALID,
        }
    }

    fn not_ready(self) -> &'static str {
        match self {
            Side::Source => SOURCE_PROVIDER_NOT_READY,
            Side::Destination => DESTINATION_PROVIDER_NOT_READY,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Destination => "destination",
        }
    }

    /// Source must not be the host cluster type; destination must be.
    fn accepts(self, provider_type: ProviderType) -> bool {
        match self {
            Side::Source => provider_type != ProviderType::OpenShift,
            Side::Destination => provider_type == ProviderType::OpenShift,
        }
    }
}

fn critical(type_: &str, reason: &str, message: String) -> Condition {
    Condition::new(type_, ConditionStatus::True, Category::Critical, message).with_reason(reason)
}

/// Validates plans against the store and provider inventory
pub struct PlanValidator {
    store: Arc<dyn ObjectStore>,
    inventory: Option<Arc<dyn Inventory>>,
}

impl std::fmt::Debug for PlanValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanValidator")
            .field("inventory", &self.inventory.is_some())
            .finish_non_exhaustive()
    }
}

impl PlanValidator {
    /// Create new validator; without an inventory, inventory checks are skipped
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, inventory: Option<Arc<dyn Inventory>>) -> Self {
        Self { store, inventory }
    }

    /// Validate the plan, staging conditions on its status
    ///
    /// # Errors
    /// - `ReconcileError::Inventory` with a not-ready inventory (slow requeue)
    /// - `ReconcileError::Build` for a VM reference with neither id nor name
    /// - `ReconcileError::Store` / `ReconcileError::Inventory` on lookup failures
    pub async fn validate(&self, plan: &mut Plan) -> Result<(), ReconcileError> {
        let source_key = plan.spec.provider.source.clone();
        let destination_key = plan.spec.provider.destination.clone();
        let source = self.validate_provider(plan, Side::Source, source_key).await?;
        let destination = self
            .validate_provider(plan, Side::Destination, destination_key)
            .await?;
        plan.referenced.provider.source = source;
        plan.referenced.provider.destination = destination;

        Self::validate_target_namespace(plan);
        Self::validate_vm_refs(plan)?;

        let usable_source = plan
            .referenced
            .provider
            .source
            .clone()
            .filter(|p| Side::Source.accepts(p.spec.provider_type) && p.is_ready());
        if let (Some(provider), Some(inventory)) = (usable_source, self.inventory.as_deref()) {
            Self::validate_vms(plan, &provider, inventory).await?;
            Self::validate_network_map(plan, &provider, inventory).await?;
            Self::validate_storage_map(plan, &provider, inventory).await?;
        }

        Ok(())
    }

    /// Resolve one provider reference
    ///
    /// # Returns
    /// The provider if it exists, whatever its type or readiness.
    async fn validate_provider(
        &self,
        plan: &mut Plan,
        side: Side,
        key: Option<ObjectKey>,
    ) -> Result<Option<Provider>, ReconcileError> {
        let conditions = &mut plan.status.conditions;
        let Some(key) = key else {
            conditions.set_condition(critical(
                side.not_valid(),
                NOT_SET,
                format!("The {} provider is not set.", side.label()),
            ));
            return Ok(None);
        };

        let provider = match self.store.get_provider(&key).await {
            Ok(provider) => provider,
            Err(e) if e.is_not_found() => {
                conditions.set_condition(
                    critical(
                        side.not_valid(),
                        NOT_FOUND,
                        format!("The {} provider is not valid.", side.label()),
                    )
                    .with_items(vec![key.to_string()]),
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if !side.accepts(provider.spec.provider_type) {
            conditions.set_condition(
                critical(
                    side.not_valid(),
                    TYPE_NOT_VALID,
                    format!(
                        "The {} provider type '{}' is not valid.",
                        side.label(),
                        provider.spec.provider_type
                    ),
                )
                .with_items(vec![key.to_string()]),
            );
        } else if !provider.is_ready() {
            conditions.set_condition(
                critical(
                    side.not_ready(),
                    NOT_READY,
                    format!("The {} provider is not ready.", side.label()),
                )
                .with_items(vec![key.to_string()]),
            );
        }

        Ok(Some(provider))
    }

    fn validate_target_namespace(plan: &mut Plan) {
        let namespace = &plan.spec.target_namespace;
        let condition = if namespace.is_empty() {
            Some(critical(
                TARGET_NAMESPACE_NOT_VALID,
                NOT_SET,
                "Target namespace is not set.".to_string(),
            ))
        } else if is_dns1123_label(namespace) {
            None
        } else {
            Some(
                critical(
                    TARGET_NAMESPACE_NOT_VALID,
                    NOT_VALID,
                    "Target namespace is not valid.".to_string(),
                )
                .with_items(vec![namespace.clone()]),
            )
        };
        if let Some(condition) = condition {
            plan.status.conditions.set_condition(condition);
        }
    }

    /// Structural checks that need no inventory
    fn validate_vm_refs(plan: &mut Plan) -> Result<(), ReconcileError> {
        if let Some(index) = plan.spec.vms.iter().position(VmRef::is_empty) {
            return Err(ReconcileError::Build(format!(
                "plan {}: vm[{index}] has neither id nor name",
                plan.meta.key()
            )));
        }

        let mut seen = HashSet::new();
        let duplicates: Vec<String> = plan
            .spec
            .vms
            .iter()
            .filter(|vm| !seen.insert(*vm))
            .map(ToString::to_string)
            .collect();
        if !duplicates.is_empty() {
            plan.status.conditions.set_condition(
                critical(
                    DUPLICATE_VM,
                    NOT_UNIQUE,
                    "Duplicate (source) VM.".to_string(),
                )
                .with_items(duplicates),
            );
        }
        Ok(())
    }

    async fn validate_vms(
        plan: &mut Plan,
        provider: &Provider,
        inventory: &dyn Inventory,
    ) -> Result<(), ReconcileError> {
        let mut missing = Vec::new();
        let mut resolved: HashSet<String> = HashSet::new();
        let mut duplicates = Vec::new();

        for vm in &plan.spec.vms {
            match inventory.find_vm(provider, vm).await {
                Ok(found) => {
                    if !resolved.insert(found.id.clone()) {
                        duplicates.push(vm.to_string());
                    }
                }
                Err(e) if e.is_not_found() => missing.push(vm.to_string()),
                Err(e) => return Err(e.into()),
            }
        }

        let conditions = &mut plan.status.conditions;
        if !missing.is_empty() {
            conditions.set_condition(
                critical(
                    VM_NOT_FOUND,
                    NOT_FOUND,
                    "VM not found.".to_string(),
                )
                .with_items(missing),
            );
        }
        // A VM referenced once by id and once by name only shows up here.
        if !duplicates.is_empty() && conditions.find(DUPLICATE_VM).is_none() {
            conditions.set_condition(
                critical(
                    DUPLICATE_VM,
                    NOT_UNIQUE,
                    "Duplicate (source) VM.".to_string(),
                )
                .with_items(duplicates),
            );
        }
        Ok(())
    }

    async fn validate_network_map(
        plan: &mut Plan,
        provider: &Provider,
        inventory: &dyn Inventory,
    ) -> Result<(), ReconcileError> {
        let mut missing = Vec::new();
        for pair in &plan.spec.map.network {
            if is_missing(inventory.find_network(provider, &pair.source).await)? {
                missing.push(pair.source.clone());
            }
        }
        if !missing.is_empty() {
            plan.status.conditions.set_condition(
                critical(
                    NETWORK_MAP_NOT_VALID,
                    NOT_FOUND,
                    "Map source network not found.".to_string(),
                )
                .with_items(missing),
            );
        }
        Ok(())
    }

    async fn validate_storage_map(
        plan: &mut Plan,
        provider: &Provider,
        inventory: &dyn Inventory,
    ) -> Result<(), ReconcileError> {
        let mut missing = Vec::new();
        for pair in &plan.spec.map.storage {
            if is_missing(inventory.find_datastore(provider, &pair.source).await)? {
                missing.push(pair.source.clone());
            }
        }
        if !missing.is_empty() {
            plan.status.conditions.set_condition(
                critical(
                    STORAGE_MAP_NOT_VALID,
                    NOT_FOUND,
                    "Map source datastore not found.".to_string(),
                )
                .with_items(missing),
            );
        }
        Ok(())
    }
}

fn is_missing<T>(found: Result<T, InventoryError>) -> Result<bool, ReconcileError> {
    match found {
        Ok(_) => Ok(false),
        Err(e) if e.is_not_found() => Ok(true),
        Err(e) => Err(e.into()),
    }
}
