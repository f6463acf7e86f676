//! Provider: a source or destination virtualization platform

use crate::condition::{Conditions, READY};
use crate::meta::{Generational, ObjectKey, ObjectMeta, Resource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider platform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Cluster the VMs land in
    OpenShift,
    VSphere,
    OVirt,
}

impl ProviderType {
    /// Path segment used by the inventory service
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenShift => "openshift",
            ProviderType::VSphere => "vsphere",
            ProviderType::OVirt => "ovirt",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// API endpoint; empty for the host cluster
    #[serde(default)]
    pub url: String,
    /// Credentials secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<ObjectKey>,
}

/// Provider status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub conditions: Conditions,
}

/// Provider object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub meta: ObjectMeta,
    pub spec: ProviderSpec,
    #[serde(default)]
    pub status: ProviderStatus,
}

impl Provider {
    /// Create new provider
    #[inline]
    #[must_use]
    pub fn new(meta: ObjectMeta, provider_type: ProviderType, url: impl Into<String>) -> Self {
        Self {
            meta,
            spec: ProviderSpec {
                provider_type,
                url: url.into(),
                secret: None,
            },
            status: ProviderStatus::default(),
        }
    }

    /// Check if the provider controller reports it ready
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.conditions.is_true(READY)
    }

    /// Check if this is the cluster the controller runs in
    #[inline]
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.spec.provider_type == ProviderType::OpenShift && self.spec.url.is_empty()
    }
}

impl Resource for Provider {
    const KIND: &'static str = "Provider";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl Generational for Provider {
    fn observed_generation(&self) -> i64 {
        self.status.observed_generation
    }
}
