//! Object identity and metadata
//!
//! Every persisted object carries an [`ObjectMeta`]: a stable uid, its
//! namespaced name, a spec generation counter and a resource version used
//! for optimistic concurrency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub Uuid);

impl Uid {
    /// Generate new uid
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespaced object name, used both as identity and as a reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ObjectKey {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create new key
    #[inline]
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Renders as `namespace/name`, or just `name` for cluster-scoped keys.
impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Error parsing an [`ObjectKey`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object key: '{0}'")]
pub struct ObjectKeyError(pub String);

impl FromStr for ObjectKey {
    type Err = ObjectKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = match s.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => ("", s),
        };
        if name.is_empty() || name.contains('/') {
            return Err(ObjectKeyError(s.to_string()));
        }
        Ok(Self::new(namespace, name))
    }
}

/// Metadata shared by all persisted objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub uid: Uid,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    /// Spec generation, bumped on every spec change
    #[serde(default = "first_generation")]
    pub generation: i64,
    /// Opaque version for optimistic concurrency
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default = "Utc::now")]
    pub creation_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

fn first_generation() -> i64 {
    1
}

impl ObjectMeta {
    /// Create metadata for a new object
    #[inline]
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: Uid::new(),
            namespace: namespace.into(),
            name: name.into(),
            generation: first_generation(),
            resource_version: 0,
            creation_timestamp: Utc::now(),
            labels: BTreeMap::new(),
        }
    }

    /// With explicit creation timestamp
    #[inline]
    #[must_use]
    pub fn created_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.creation_timestamp = timestamp;
        self
    }

    /// Namespaced key of this object
    #[inline]
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// A persisted object with metadata
pub trait Resource: Clone + Send + Sync + 'static {
    /// Kind name used in logs and events
    const KIND: &'static str;

    /// Object metadata
    fn meta(&self) -> &ObjectMeta;

    /// Mutable object metadata
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// Namespaced key of this object
    fn key(&self) -> ObjectKey {
        self.meta().key()
    }
}

/// A resource whose status reports the last generation its own controller
/// finished reconciling.
pub trait Generational: Resource {
    /// Generation last observed by the owning controller
    fn observed_generation(&self) -> i64;

    /// Check whether the owning controller has caught up with the spec
    fn reconciled(&self) -> bool {
        self.observed_generation() >= self.meta().generation
    }
}
