//! Write-once key/value capture of plan inputs
//!
//! A [`Snapshot`] lives on a migration and records the plan fields the
//! migration was started with. Values are stored JSON-encoded. Keys are
//! never overwritten.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel key: the owning plan uid
pub const PLAN_UID: &str = "plan.uid";
/// Source provider object
pub const SOURCE_PROVIDER: &str = "provider.source";
/// Destination provider object
pub const DESTINATION_PROVIDER: &str = "provider.destination";
/// Plan field map
pub const PLAN_MAP: &str = "plan.map";

/// Snapshot errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Key already captured
    #[error("snapshot key already set: {0}")]
    KeyExists(String),

    /// Value could not be encoded or decoded
    #[error("snapshot value for '{key}': {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Append-only key/value map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, String>,
}

impl Snapshot {
    /// Check if a key has been captured
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Capture a value
    ///
    /// # Errors
    /// - `SnapshotError::KeyExists` if the key was captured before
    /// - `SnapshotError::Codec` if the value cannot be encoded
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), SnapshotError> {
        if self.contains(key) {
            return Err(SnapshotError::KeyExists(key.to_string()));
        }
        let encoded = serde_json::to_string(value).map_err(|source| SnapshotError::Codec {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), encoded);
        Ok(())
    }

    /// Read a captured value
    ///
    /// # Errors
    /// `SnapshotError::Codec` if the stored value does not decode as `T`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SnapshotError> {
        self.entries
            .get(key)
            .map(|raw| {
                serde_json::from_str(raw).map_err(|source| SnapshotError::Codec {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Number of captured keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was captured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut snapshot = Snapshot::default();
        snapshot.set(PLAN_UID, &"abc").unwrap();
        assert!(snapshot.contains(PLAN_UID));
        assert_eq!(snapshot.get::<String>(PLAN_UID).unwrap().as_deref(), Some("abc"));
        assert_eq!(snapshot.get::<String>(PLAN_MAP).unwrap(), None);
    }

    #[test]
    fn keys_are_write_once() {
        let mut snapshot = Snapshot::default();
        snapshot.set(PLAN_UID, &"first").unwrap();

        let err = snapshot.set(PLAN_UID, &"second").unwrap_err();
        assert!(matches!(err, SnapshotError::KeyExists(_)));
        assert_eq!(snapshot.get::<String>(PLAN_UID).unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn decode_mismatch_is_codec_error() {
        let mut snapshot = Snapshot::default();
        snapshot.set(PLAN_MAP, &"not a number").unwrap();
        assert!(matches!(
            snapshot.get::<u32>(PLAN_MAP),
            Err(SnapshotError::Codec { .. })
        ));
    }
}
