//! Dependency readiness gate
//!
//! Plans are not reconciled while any provider or host is behind on its own
//! reconciliation; their status may describe a spec that no longer exists.

use crate::store::{ObjectStore, StoreError};
use ferry_api::Generational;
use std::sync::Arc;

/// Decides whether a plan pass must wait for dependencies
#[derive(Clone)]
pub struct DependencyGate {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for DependencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGate").finish_non_exhaustive()
    }
}

impl DependencyGate {
    /// Create new gate
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Check if any provider or host has not observed its latest generation
    ///
    /// # Errors
    /// Listing failures are returned unchanged.
    pub async fn postpone(&self) -> Result<bool, StoreError> {
        for provider in self.store.list_providers().await? {
            if !provider.reconciled() {
                tracing::debug!(
                    provider = %provider.meta.key(),
                    generation = provider.meta.generation,
                    observed = provider.status.observed_generation,
                    "provider not reconciled"
                );
                return Ok(true);
            }
        }

        for host in self.store.list_hosts().await? {
            if !host.reconciled() {
                tracing::debug!(
                    host = %host.meta.key(),
                    generation = host.meta.generation,
                    observed = host.status.observed_generation,
                    "host not reconciled"
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}
