//! Host: a hypervisor host within a source provider

use crate::condition::Conditions;
use crate::meta::{Generational, ObjectKey, ObjectMeta, Resource};
use serde::{Deserialize, Serialize};

/// Host spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSpec {
    /// Owning provider
    pub provider: ObjectKey,
    /// Inventory id of the host
    pub id: String,
    /// Preferred transfer network address
    #[serde(default)]
    pub ip_address: String,
}

/// Host status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub conditions: Conditions,
}

/// Host object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub meta: ObjectMeta,
    pub spec: HostSpec,
    #[serde(default)]
    pub status: HostStatus,
}

impl Resource for Host {
    const KIND: &'static str = "Host";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl Generational for Host {
    fn observed_generation(&self) -> i64 {
        self.status.observed_generation
    }
}
