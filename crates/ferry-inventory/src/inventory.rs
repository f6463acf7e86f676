//! Inventory lookups
//!
//! Each lookup resolves against one provider's inventory. A reference by id
//! is a direct `get`; a reference by name lists with a `name` filter and
//! takes the first match.

use crate::client::RestClient;
use crate::error::InventoryError;
use crate::model::{Datastore, Network, Vm};
use async_trait::async_trait;
use ferry_api::{Provider, VmRef};
use serde::de::DeserializeOwned;

/// Provider inventory lookups used by plan validation
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Resolve a VM reference
    ///
    /// # Errors
    /// `InventoryError::NotFound` when no VM matches.
    async fn find_vm(&self, provider: &Provider, vm: &VmRef) -> Result<Vm, InventoryError>;

    /// Resolve a network by id
    ///
    /// # Errors
    /// `InventoryError::NotFound` when no network matches.
    async fn find_network(&self, provider: &Provider, id: &str) -> Result<Network, InventoryError>;

    /// Resolve a datastore by id
    ///
    /// # Errors
    /// `InventoryError::NotFound` when no datastore matches.
    async fn find_datastore(
        &self,
        provider: &Provider,
        id: &str,
    ) -> Result<Datastore, InventoryError>;
}

/// [`Inventory`] backed by the inventory web service
#[derive(Debug)]
pub struct WebInventory {
    client: RestClient,
}

impl WebInventory {
    /// Create new web inventory
    #[inline]
    #[must_use]
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    fn collection(provider: &Provider, kind: &str) -> String {
        format!(
            "providers/{}/{}/{}",
            provider.spec.provider_type.as_str(),
            provider.meta.uid,
            kind
        )
    }

    async fn lookup<T: DeserializeOwned + Send>(
        &self,
        provider: &Provider,
        kind: &str,
        id: &str,
        name: &str,
    ) -> Result<T, InventoryError> {
        let collection = Self::collection(provider, kind);
        if !id.is_empty() {
            return self.client.get(&format!("{collection}/{id}"), &[]).await;
        }

        let mut found: Vec<T> = self.client.list(&collection, &[("name", name)]).await?;
        if found.is_empty() {
            return Err(InventoryError::NotFound {
                path: format!("{collection}?name={name}"),
            });
        }
        Ok(found.swap_remove(0))
    }
}

#[async_trait]
impl Inventory for WebInventory {
    async fn find_vm(&self, provider: &Provider, vm: &VmRef) -> Result<Vm, InventoryError> {
        self.lookup(provider, "vms", &vm.id, &vm.name).await
    }

    async fn find_network(&self, provider: &Provider, id: &str) -> Result<Network, InventoryError> {
        self.lookup(provider, "networks", id, "").await
    }

    async fn find_datastore(
        &self,
        provider: &Provider,
        id: &str,
    ) -> Result<Datastore, InventoryError> {
        self.lookup(provider, "datastores", id, "").await
    }
}
