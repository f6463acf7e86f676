//! YAML manifests for seeding a [`MemoryStore`]
//!
//! ```yaml
//! providers:
//!   - meta: { namespace: ferry, name: host }
//!     spec: { type: openshift }
//! plans: []
//! migrations: []
//! ```

use crate::store::{MemoryStore, StoreError};
use ferry_api::{Host, Migration, Plan, Provider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest error
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Objects to load, applied dependencies first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub providers: Vec<Provider>,
    pub hosts: Vec<Host>,
    pub plans: Vec<Plan>,
    pub migrations: Vec<Migration>,
}

impl Manifest {
    /// Read a manifest file
    ///
    /// # Errors
    /// `ManifestError::Io` or `ManifestError::Parse`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse manifest YAML
    ///
    /// # Errors
    /// `ManifestError::Parse` on invalid YAML.
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Create every object in the store
    ///
    /// # Errors
    /// The first store rejection stops the load.
    pub fn apply(&self, store: &MemoryStore) -> Result<(), ManifestError> {
        for provider in &self.providers {
            store.create(provider.clone())?;
        }
        for host in &self.hosts {
            store.create(host.clone())?;
        }
        for plan in &self.plans {
            store.create(plan.clone())?;
        }
        for migration in &self.migrations {
            store.create(migration.clone())?;
        }
        tracing::info!(
            providers = self.providers.len(),
            hosts = self.hosts.len(),
            plans = self.plans.len(),
            migrations = self.migrations.len(),
            "manifest applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_api::{ObjectKey, ProviderType, Resource};
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r"
providers:
  - meta: { namespace: ferry, name: host }
    spec: { type: openshift }
    status:
      observed_generation: 1
      conditions:
        - { type: Ready, status: 'True', category: Required, message: ok }
plans:
  - meta: { namespace: ferry, name: plan-1 }
    spec:
      target_namespace: apps
      provider:
        destination: { namespace: ferry, name: host }
      vms:
        - { id: vm-1 }
migrations:
  - meta: { namespace: ferry, name: run-1 }
    spec:
      plan: { namespace: ferry, name: plan-1 }
";

    #[test]
    fn parses_and_applies() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.providers[0].spec.provider_type, ProviderType::OpenShift);
        assert!(manifest.providers[0].is_ready());
        assert_eq!(manifest.plans[0].spec.vms.len(), 1);

        let store = MemoryStore::new();
        manifest.apply(&store).unwrap();
        let plan: Plan = store.get(&ObjectKey::new("ferry", "plan-1")).unwrap();
        assert_eq!(plan.key(), ObjectKey::new("ferry", "plan-1"));
        assert_eq!(store.list::<Migration>().len(), 1);
    }

    #[test]
    fn duplicate_objects_fail() {
        let mut manifest = Manifest::parse(MANIFEST).unwrap();
        manifest.plans.push(manifest.plans[0].clone());
        assert!(matches!(
            manifest.apply(&MemoryStore::new()),
            Err(ManifestError::Store(StoreError::AlreadyExists { .. }))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        std::fs::write(&path, MANIFEST).unwrap();
        assert_eq!(Manifest::load(&path).unwrap().migrations.len(), 1);
    }
}
